use std::process::ExitCode;

use clap::Parser;
use devops_workflow::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => cli::run::run(&cli.global, args).await,
        Command::Workflows(command) => cli::workflows::run(&cli.global, command).await,
        Command::Vars(command) => cli::vars::run(&cli.global, command).await,
    }
}
