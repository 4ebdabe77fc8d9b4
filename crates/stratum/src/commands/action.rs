use crate::project::Project;
use colored::Colorize;
use stratum_core::{ActionContext, PollConfig, parse_args};

pub async fn handle(
    project: &Project,
    poll: PollConfig,
    selector: &str,
    action: &str,
    args: &[String],
) -> anyhow::Result<()> {
    let args = parse_args(args)?;
    let resources = project.resources(Some(selector))?;
    let resource = resources[0].as_ref();

    if !resource.actions().iter().any(|a| *a == action) {
        anyhow::bail!(
            "{} does not support '{}' (available: {})",
            resource.kind(),
            action,
            resource.actions().join(", ")
        );
    }

    let reconciler = project.reconciler(poll)?;
    let lock = project.state.acquire_lock().await?;
    let mut state_file = project.load_state().await?;
    let mut state = state_file.resource(resource.kind(), resource.name());

    eprintln!(
        "{} {} on {} {}",
        "Running".blue(),
        action.bold(),
        resource.kind(),
        resource.name().cyan()
    );

    let result = {
        let mut ctx = ActionContext::new(reconciler.transport(), poll, &mut state)
            .with_secrets(project.secrets.as_ref());
        resource.run_action(&mut ctx, action, &args).await
    };

    state_file.set_resource(resource.kind(), resource.name(), state);
    project.state.save(&state_file).await?;
    lock.release().await?;

    println!("{}", result?);
    Ok(())
}
