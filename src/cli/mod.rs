//! CLI module for DevOps Workflow
//!
//! Provides subcommands for:
//! - `run`: execute a workflow and stream its log
//! - `workflows`: manage stored workflow definitions
//! - `vars`: manage global variables

pub mod run;
pub mod vars;
pub mod workflows;

use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging::init_logging;
use crate::AppState;

/// DevOps Workflow - run shell workflows with variables and control flow
#[derive(Parser)]
#[command(name = "devops-workflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand
#[derive(Args, Clone, Debug, Default)]
pub struct GlobalArgs {
    /// Data directory (overrides config)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Storage backend: file or memory (overrides config)
    #[arg(long, global = true)]
    pub storage: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Execute a workflow
    Run(run::RunArgs),

    /// Manage workflow definitions
    #[command(subcommand)]
    Workflows(workflows::WorkflowsCommand),

    /// Manage global variables
    #[command(subcommand)]
    Vars(vars::VarsCommand),
}

/// Load configuration, apply command-line overrides and initialize logging
pub fn load_config(global: &GlobalArgs) -> AppConfig {
    dotenvy::dotenv().ok();

    let mut config = AppConfig::load().unwrap_or_default();
    if let Some(ref dir) = global.data_dir {
        config.storage.data_dir = dir.clone();
    }
    if let Some(ref backend) = global.storage {
        config.storage.backend = backend.clone();
    }

    init_logging(&config.logging);
    config
}

/// Build the application state for a subcommand
pub async fn bootstrap(global: &GlobalArgs) -> anyhow::Result<AppState> {
    let config = load_config(global);
    crate::create_app_state_with_config(&config).await
}

/// Parse a `KEY=VALUE` argument; the value may itself contain `=`
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty variable name in '{}'", s));
    }

    Ok((key.to_string(), value.to_string()))
}

/// Collect parsed pairs into inputs; later pairs win
pub fn into_inputs(pairs: Vec<(String, String)>) -> HashMap<String, String> {
    pairs.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("ENV=prod"),
            Ok(("ENV".to_string(), "prod".to_string()))
        );
        assert_eq!(
            parse_key_val("QUERY=a=b"),
            Ok(("QUERY".to_string(), "a=b".to_string()))
        );
        assert_eq!(
            parse_key_val("EMPTY="),
            Ok(("EMPTY".to_string(), String::new()))
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_into_inputs_last_wins() {
        let inputs = into_inputs(vec![
            ("A".to_string(), "1".to_string()),
            ("A".to_string(), "2".to_string()),
        ]);
        assert_eq!(inputs.get("A").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_cli_parses_run_with_vars() {
        let cli = Cli::try_parse_from([
            "devops-workflow",
            "--storage",
            "memory",
            "run",
            "deploy",
            "-v",
            "ENV=prod",
            "--var",
            "REGION=eu-west-1",
        ])
        .unwrap();

        assert_eq!(cli.global.storage.as_deref(), Some("memory"));
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.id, "deploy");
                assert_eq!(args.vars.len(), 2);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_cli_rejects_malformed_var() {
        let result = Cli::try_parse_from(["devops-workflow", "run", "deploy", "-v", "ENV"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parses_nested_subcommands() {
        let cli = Cli::try_parse_from([
            "devops-workflow",
            "vars",
            "set",
            "TOKEN",
            "abc",
            "--description",
            "API token",
        ])
        .unwrap();

        assert!(matches!(
            cli.command,
            Command::Vars(vars::VarsCommand::Set { ref name, .. }) if name == "TOKEN"
        ));
    }
}
