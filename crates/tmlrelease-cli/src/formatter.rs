use std::process::ExitCode;

use serde_json::json;
use tmlrelease::{BuildReport, IdentityAction};

use crate::commands::CommandResult;
use crate::error::CliError;

pub enum OutputFormat {
    Text,
    Json,
}

/// Renders a `CommandResult` as human-readable text or a single JSON line and turns
/// the outcome into the process exit code.
pub fn emit_result(result: CommandResult, format: OutputFormat) -> Result<ExitCode, CliError> {
    match format {
        OutputFormat::Text => print_text(&result),
        OutputFormat::Json => print_json(&result)?,
    };
    Ok(ExitCode::from(result.exit_status().code()))
}

fn print_text(result: &CommandResult) {
    match result {
        CommandResult::ReleaseBuilt {
            environment,
            kind,
            release_name,
            release_dir,
            report,
        } => {
            println!(
                "Release '{release_name}' ({kind}) for environment '{environment}' written to {release_dir}"
            );
            print_build_report(report);
        }
        CommandResult::Details { documents } => {
            for doc in documents {
                match &doc.error {
                    Some(error) => println!("{} | error: {error}", doc.file),
                    None => println!(
                        "{} | {} | {} | {}",
                        doc.file,
                        doc.kind.map(|k| k.as_str()).unwrap_or("-"),
                        doc.name.as_deref().unwrap_or("-"),
                        doc.identifier.as_deref().unwrap_or("-"),
                    ),
                }
            }
        }
        CommandResult::MapListing {
            environment,
            path,
            entries,
        } => {
            println!(
                "Identity map for '{environment}' ({} entries, {path}):",
                entries.len()
            );
            for (parent, child) in entries {
                println!("  {parent} -> {child}");
            }
        }
        CommandResult::MapEntry {
            environment,
            parent,
            child,
        } => match child {
            Some(child) => println!("{child}"),
            None => println!("No child identifier for '{parent}' in '{environment}'"),
        },
        CommandResult::MapUpdated {
            environment,
            parent,
            child,
            previous,
        } => match previous {
            Some(previous) if previous != child => {
                println!("Updated '{parent}' in '{environment}': {previous} -> {child}")
            }
            Some(_) => println!("'{parent}' in '{environment}' already maps to {child}"),
            None => println!("Recorded '{parent}' -> {child} in '{environment}'"),
        },
    }
}

fn print_build_report(report: &BuildReport) {
    println!(
        "  {} written ({} updated, {} new), {} skipped",
        report.written.len(),
        report.updated(),
        report.created(),
        report.skipped.len()
    );
    for doc in &report.written {
        let name = doc.name.as_deref().unwrap_or("unnamed");
        match &doc.action {
            IdentityAction::Update { child } => {
                println!("  [UPDATE] {name} -> {} ({child})", doc.destination.display())
            }
            IdentityAction::Create => {
                println!("  [NEW] {name} -> {}", doc.destination.display())
            }
        }
    }
    for doc in &report.skipped {
        println!("  [SKIP] {}: {}", doc.source.display(), doc.reason);
    }
}

fn print_json(result: &CommandResult) -> Result<(), CliError> {
    let payload = json!(result);
    println!("{payload}");
    Ok(())
}
