pub mod action;
pub mod apply;
pub mod check;
pub mod delete;
pub mod plan;
pub mod state;
pub mod update;

use colored::Colorize;
use stratum_core::{ReconciliationOutcome, ResourceKind};

/// `■ kind name` heading for one resource
pub(crate) fn print_heading(resource: &dyn ResourceKind) {
    println!();
    println!(
        "{}",
        format!("■ {} {}", resource.kind(), resource.name()).bold()
    );
}

pub(crate) fn print_outcome(outcome: &ReconciliationOutcome) {
    match outcome {
        ReconciliationOutcome::Ready => println!("  {} ready", "✓".green()),
        ReconciliationOutcome::NotReady { reason } => {
            println!("  {} not ready: {}", "…".yellow(), reason)
        }
    }
}

pub(crate) fn print_error(error: &dyn std::fmt::Display) {
    eprintln!("  {} {}", "✗".red(), error);
}
