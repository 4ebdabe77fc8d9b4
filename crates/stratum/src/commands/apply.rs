use super::{print_error, print_heading, print_outcome};
use crate::project::Project;
use colored::Colorize;
use stratum_core::PollConfig;

/// Adopt or create every selected resource; with `wait`, converge.
///
/// State is saved after each resource so a failure keeps what was
/// already committed.
pub async fn handle(
    project: &Project,
    poll: PollConfig,
    only: Option<&str>,
    wait: bool,
) -> anyhow::Result<()> {
    let resources = project.resources(only)?;
    let reconciler = project.reconciler(poll)?;

    println!(
        "{} {} ({} resources)",
        "Applying".blue(),
        project.manifest_path.display().to_string().cyan(),
        resources.len()
    );

    let lock = project.state.acquire_lock().await?;
    let mut state_file = project.load_state().await?;
    let mut not_ready = 0;

    for resource in &resources {
        print_heading(resource.as_ref());
        let mut state = state_file.resource(resource.kind(), resource.name());

        let result = if wait {
            reconciler.converge(resource.as_ref(), &mut state).await
        } else {
            reconciler.create(resource.as_ref(), &mut state).await
        };

        if state.existing() {
            println!("  {} adopted existing resource", "ℹ".blue());
        }
        state_file.set_resource(resource.kind(), resource.name(), state);
        project.state.save(&state_file).await?;

        match result {
            Ok(outcome) => {
                if !outcome.is_ready() {
                    not_ready += 1;
                }
                print_outcome(&outcome);
            }
            Err(e) => {
                print_error(&e);
                lock.release().await?;
                return Err(e.into());
            }
        }
    }

    lock.release().await?;

    println!();
    if not_ready == 0 {
        println!("{}", "✓ All resources ready".green().bold());
    } else {
        println!(
            "{}",
            format!("{} resource(s) pending; run `stratum check` later", not_ready).yellow()
        );
    }
    Ok(())
}
