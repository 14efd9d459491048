//! Vars command - manages global variables

use std::process::ExitCode;

use clap::Subcommand;

use super::{bootstrap, GlobalArgs};
use crate::domain::GlobalVariable;

#[derive(Subcommand, Clone, Debug)]
pub enum VarsCommand {
    /// List global variables
    List,

    /// Print a variable's value
    Get { name: String },

    /// Create or replace a variable
    Set {
        name: String,
        value: String,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Delete a variable
    Delete { name: String },
}

pub async fn run(global: &GlobalArgs, command: VarsCommand) -> anyhow::Result<ExitCode> {
    let state = bootstrap(global).await?;
    let store = &state.variables;

    match command {
        VarsCommand::List => {
            for variable in store.list().await? {
                if variable.description.is_empty() {
                    println!("{}={}", variable.name, variable.value);
                } else {
                    println!("{}={}\t# {}", variable.name, variable.value, variable.description);
                }
            }
        }
        VarsCommand::Get { name } => {
            println!("{}", store.get(&name).await?.value);
        }
        VarsCommand::Set {
            name,
            value,
            description,
        } => {
            let variable = store
                .set(GlobalVariable::new(name, value).with_description(description))
                .await?;
            println!("Set {}", variable.name);
        }
        VarsCommand::Delete { name } => {
            store.delete(&name).await?;
            println!("Deleted {}", name);
        }
    }

    Ok(ExitCode::SUCCESS)
}
