//! Shell runner implementations

mod process_runner;

pub use process_runner::ProcessShellRunner;
