//! Shell execution domain

mod runner;

pub use runner::{OutputLine, ShellError, ShellExit, ShellRequest, ShellRunner};
