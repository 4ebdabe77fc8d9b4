use super::{print_error, print_heading};
use crate::project::Project;
use colored::Colorize;
use std::io::Write;
use stratum_core::{ActionType, DeleteOutcome, PollConfig};

/// Delete in reverse manifest order so dependents go first
pub async fn handle(
    project: &Project,
    poll: PollConfig,
    only: Option<&str>,
    yes: bool,
) -> anyhow::Result<()> {
    let mut resources = project.resources(only)?;
    resources.reverse();
    let reconciler = project.reconciler(poll)?;

    let lock = project.state.acquire_lock().await?;
    let mut state_file = project.load_state().await?;

    let planned: Vec<_> = resources
        .iter()
        .map(|r| reconciler.plan_delete(r.as_ref(), &state_file.resource(r.kind(), r.name())))
        .filter(|a| a.action_type == ActionType::Delete)
        .collect();
    if planned.is_empty() {
        println!("{}", "Nothing to delete".green());
        lock.release().await?;
        return Ok(());
    }

    println!("{}", "The following resources will be deleted:".yellow().bold());
    for action in &planned {
        println!("  - {} {}", action.kind, action.name.cyan());
    }

    if !yes && !confirm()? {
        println!("{}", "Cancelled".yellow());
        lock.release().await?;
        return Ok(());
    }

    for resource in &resources {
        print_heading(resource.as_ref());
        let mut state = state_file.resource(resource.kind(), resource.name());
        let result = reconciler.delete(resource.as_ref(), &mut state).await;

        match result {
            Ok(DeleteOutcome::SkippedAdopted) => {
                println!("  {} adopted, left in place", "ℹ".blue());
                state_file.set_resource(resource.kind(), resource.name(), state);
            }
            Ok(DeleteOutcome::NotTracked) => {
                println!("  {} not created by stratum, left in place", "ℹ".blue());
                continue;
            }
            Ok(outcome) => {
                let label = match outcome {
                    DeleteOutcome::AlreadyGone => "already gone",
                    _ => "deleted",
                };
                println!("  {} {}", "✓".green(), label);
                state_file.remove_resource(resource.kind(), resource.name());
            }
            Err(e) => {
                print_error(&e);
                state_file.set_resource(resource.kind(), resource.name(), state);
                project.state.save(&state_file).await?;
                lock.release().await?;
                return Err(e.into());
            }
        }
        project.state.save(&state_file).await?;
    }

    lock.release().await?;
    Ok(())
}

fn confirm() -> anyhow::Result<bool> {
    print!("Proceed? [y/N]: ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}
