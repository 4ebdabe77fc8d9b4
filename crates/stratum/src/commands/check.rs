use super::{print_error, print_heading, print_outcome};
use crate::project::Project;
use anyhow::bail;
use colored::Colorize;
use stratum_core::PollConfig;

/// One readiness pass per resource. Fails if any resource is not ready.
pub async fn handle(project: &Project, poll: PollConfig, only: Option<&str>) -> anyhow::Result<()> {
    let resources = project.resources(only)?;
    let reconciler = project.reconciler(poll)?;

    let lock = project.state.acquire_lock().await?;
    let mut state_file = project.load_state().await?;
    let mut not_ready = 0;
    let mut failed = 0;

    for resource in &resources {
        print_heading(resource.as_ref());
        let mut state = state_file.resource(resource.kind(), resource.name());

        match reconciler.check_readiness(resource.as_ref(), &mut state).await {
            Ok(outcome) => {
                if !outcome.is_ready() {
                    not_ready += 1;
                }
                print_outcome(&outcome);
            }
            Err(e) => {
                failed += 1;
                print_error(&e);
            }
        }

        state_file.set_resource(resource.kind(), resource.name(), state);
        project.state.save(&state_file).await?;
    }

    lock.release().await?;

    println!();
    if not_ready + failed > 0 {
        bail!("{} not ready, {} failed", not_ready, failed);
    }
    println!("{}", "✓ All resources ready".green().bold());
    Ok(())
}
