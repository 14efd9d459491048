//! Template resolution for shell command steps

mod resolver;

pub use resolver::{extract_variables, missing_variables, substitute, CommandTemplate};
