use crate::project::Project;
use colored::Colorize;
use stratum_core::{ActionType, Plan, PollConfig};

pub async fn handle(project: &Project, poll: PollConfig, delete: bool) -> anyhow::Result<()> {
    let mut resources = project.resources(None)?;
    let reconciler = project.reconciler(poll)?;
    let state_file = project.load_state().await?;

    let mut actions = Vec::with_capacity(resources.len());
    if delete {
        resources.reverse();
        for resource in &resources {
            let state = state_file.resource(resource.kind(), resource.name());
            actions.push(reconciler.plan_delete(resource.as_ref(), &state));
        }
    } else {
        for resource in &resources {
            let state = state_file.resource(resource.kind(), resource.name());
            actions.push(reconciler.plan(resource.as_ref(), &state).await?);
        }
    }

    let plan = Plan::new(actions);
    println!("{}", "Plan:".bold());
    for action in &plan.actions {
        let marker = match action.action_type {
            ActionType::Create => "+".green(),
            ActionType::Adopt => "=".blue(),
            ActionType::Update => "~".yellow(),
            ActionType::Delete => "-".red(),
            ActionType::NoOp => " ".normal(),
        };
        println!(
            "  {} {} {}: {}",
            marker,
            action.kind,
            action.name.cyan(),
            action.description
        );
    }

    println!();
    if plan.has_changes() {
        println!("{}", plan.summary());
    } else {
        println!("{}", "No changes".green());
    }
    Ok(())
}
