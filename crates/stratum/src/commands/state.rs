use colored::Colorize;
use std::path::Path;
use stratum_core::StateManager;

pub async fn handle(root: &Path) -> anyhow::Result<()> {
    let manager = StateManager::new(root);
    let state_file = manager.load().await?;

    if state_file.resources.is_empty() {
        println!("{}", "No resources tracked".yellow());
        return Ok(());
    }

    println!(
        "{} (updated {})",
        manager.state_dir().display().to_string().cyan(),
        state_file.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    for (key, state) in &state_file.resources {
        println!();
        println!("{}", key.bold());
        println!("  phase:     {}", state.phase);
        println!("  existing:  {}", state.existing());
        if let Some(operation) = state.operation_ref() {
            println!("  operation: {}", operation.yellow());
        }
        if let Some(error) = &state.last_error {
            println!("  error:     {}", error.red());
        }
        for (name, value) in &state.attributes {
            let value = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
            println!("  {:<10} {}", format!("{}:", name), value);
        }
    }
    Ok(())
}
