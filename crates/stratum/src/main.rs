mod commands;
mod config;
mod project;

use clap::{Args, Parser, Subcommand};
use project::Project;
use std::path::PathBuf;
use std::time::Duration;
use stratum_core::PollConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stratum")]
#[command(about = "Adopt, create and converge cloud resources from a YAML manifest", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalOpts {
    /// Manifest path (default: stratum.local.yaml, stratum.yaml, .stratum/stratum.yaml)
    #[arg(short, long, global = true, env = "STRATUM_MANIFEST")]
    manifest: Option<PathBuf>,

    /// Directory holding .stratum/ state (default: current directory)
    #[arg(long, global = true)]
    project_root: Option<PathBuf>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Operation polls before giving up
    #[arg(long, global = true, env = "STRATUM_POLL_ATTEMPTS", default_value_t = 60)]
    poll_attempts: u32,

    /// Seconds between operation polls
    #[arg(long, global = true, env = "STRATUM_POLL_DELAY_SECS", default_value_t = 5)]
    poll_delay_secs: u64,
}

impl GlobalOpts {
    fn poll(&self) -> PollConfig {
        PollConfig::new(self.poll_attempts, Duration::from_secs(self.poll_delay_secs))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show what apply (or delete) would do
    Plan {
        /// Plan deletion instead
        #[arg(long)]
        delete: bool,
    },
    /// Adopt existing resources and create missing ones
    Apply {
        /// Wait for pending operations to finish
        #[arg(short, long)]
        wait: bool,
        /// Only this resource
        #[arg(long)]
        only: Option<String>,
    },
    /// Check pending operations and resource readiness
    Check {
        #[arg(long)]
        only: Option<String>,
    },
    /// Push updatable fields to existing resources
    Update {
        #[arg(long)]
        only: Option<String>,
    },
    /// Delete resources created by stratum, in reverse manifest order
    Delete {
        #[arg(long)]
        only: Option<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Run a named resource action (e.g. get-info, restore)
    Action {
        /// Resource name, or kind:name when names collide
        resource: String,
        /// Action name
        action: String,
        /// Arguments as key=value
        args: Vec<String>,
    },
    /// Print the persisted state
    State,
    /// Show version information
    Version,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let global = &cli.global;
    let poll = global.poll();

    match cli.command {
        Commands::Version => {
            println!("stratum {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::State => {
            let root = config::project_root(global.project_root.as_deref())?;
            commands::state::handle(&root).await
        }
        Commands::Plan { delete } => {
            let project = Project::open(global.manifest.as_deref(), global.project_root.as_deref())?;
            commands::plan::handle(&project, poll, delete).await
        }
        Commands::Apply { wait, only } => {
            let project = Project::open(global.manifest.as_deref(), global.project_root.as_deref())?;
            commands::apply::handle(&project, poll, only.as_deref(), wait).await
        }
        Commands::Check { only } => {
            let project = Project::open(global.manifest.as_deref(), global.project_root.as_deref())?;
            commands::check::handle(&project, poll, only.as_deref()).await
        }
        Commands::Update { only } => {
            let project = Project::open(global.manifest.as_deref(), global.project_root.as_deref())?;
            commands::update::handle(&project, poll, only.as_deref()).await
        }
        Commands::Delete { only, yes } => {
            let project = Project::open(global.manifest.as_deref(), global.project_root.as_deref())?;
            commands::delete::handle(&project, poll, only.as_deref(), yes).await
        }
        Commands::Action {
            resource,
            action,
            args,
        } => {
            let project = Project::open(global.manifest.as_deref(), global.project_root.as_deref())?;
            commands::action::handle(&project, poll, &resource, &action, &args).await
        }
    }
}
