use super::{print_error, print_heading, print_outcome};
use crate::project::Project;
use colored::Colorize;
use stratum_core::{Phase, PollConfig};

pub async fn handle(project: &Project, poll: PollConfig, only: Option<&str>) -> anyhow::Result<()> {
    let resources = project.resources(only)?;
    let reconciler = project.reconciler(poll)?;

    println!("{}", "Updating resources...".blue());

    let lock = project.state.acquire_lock().await?;
    let mut state_file = project.load_state().await?;

    for resource in &resources {
        print_heading(resource.as_ref());
        let mut state = state_file.resource(resource.kind(), resource.name());
        if matches!(state.phase, Phase::Unprobed | Phase::Deleted) {
            println!("  {} not applied yet, skipping", "ℹ".blue());
            continue;
        }
        let result = reconciler.update(resource.as_ref(), &mut state).await;

        state_file.set_resource(resource.kind(), resource.name(), state);
        project.state.save(&state_file).await?;

        match result {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => {
                print_error(&e);
                lock.release().await?;
                return Err(e.into());
            }
        }
    }

    lock.release().await?;
    Ok(())
}
