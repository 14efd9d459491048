//! Workflows command - manages stored workflow definitions

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Subcommand;

use super::{bootstrap, into_inputs, parse_key_val, GlobalArgs};
use crate::infrastructure::services::WorkflowService;

#[derive(Subcommand, Clone, Debug)]
pub enum WorkflowsCommand {
    /// List stored workflows
    List,

    /// Print a workflow definition as JSON
    Show { id: String },

    /// Import a workflow definition from a JSON file
    Import { file: PathBuf },

    /// Delete a workflow
    Delete { id: String },

    /// Validate a workflow and preview its commands for the given inputs
    Check {
        id: String,

        #[arg(short = 'v', long = "var", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        vars: Vec<(String, String)>,
    },
}

pub async fn run(global: &GlobalArgs, command: WorkflowsCommand) -> anyhow::Result<ExitCode> {
    let state = bootstrap(global).await?;
    let service = &state.workflow_service;

    match command {
        WorkflowsCommand::List => {
            for workflow in service.list().await? {
                println!(
                    "{}\t{}\t{} steps\t{}",
                    workflow.id(),
                    workflow.name(),
                    workflow.step_count(),
                    workflow.category()
                );
            }
        }
        WorkflowsCommand::Show { id } => {
            let workflow = service.get(&id).await?;
            println!("{}", serde_json::to_string_pretty(&workflow)?);
        }
        WorkflowsCommand::Import { file } => {
            let json = tokio::fs::read_to_string(&file)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))?;
            let workflow = service.import_json(&json).await?;
            println!("Imported workflow {} ({})", workflow.id(), workflow.name());
        }
        WorkflowsCommand::Delete { id } => {
            service.delete(&id).await?;
            println!("Deleted workflow {}", id);
        }
        WorkflowsCommand::Check { id, vars } => {
            return check(service, &id, vars).await;
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn check(
    service: &WorkflowService,
    id: &str,
    vars: Vec<(String, String)>,
) -> anyhow::Result<ExitCode> {
    let workflow = service.get(id).await?;
    let inputs = into_inputs(vars);

    let issues = service.validate(&workflow).await?;
    for issue in &issues {
        println!("issue: {}", issue);
    }

    for (name, options) in WorkflowService::select_options(&workflow) {
        println!("select {}: {}", name, options.join(" | "));
    }

    let report = service.check_inputs(id, &inputs).await?;
    for name in &report.missing_required {
        println!("missing: {}", name);
    }
    for (name, value) in &report.invalid_values {
        println!("invalid: {}={}", name, value);
    }
    for (step_id, names) in &report.unresolved {
        println!("unresolved in {}: {}", step_id, names.join(", "));
    }

    for (step_id, text) in service.preview(id, &inputs).await? {
        println!("{}: {}", step_id, text);
    }

    if issues.is_empty() && report.is_ok() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
