//! Variable scope resolution
//!
//! An execution's scope is merged from three layers, lowest precedence first:
//! 1. global variables from the variable store
//! 2. workflow-declared defaults, only for names not yet set and only when non-empty
//! 3. caller inputs, which always win
//!
//! The merged map is fixed for the whole run. A step's local remapping
//! (`{LOCAL}` reads global `NAME`) only affects that step's substitution.

use std::collections::HashMap;

use super::entity::WorkflowVariable;
use super::step_types::Step;

/// The merged, read-only variable scope of one execution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableScope {
    values: HashMap<String, String>,
}

impl VariableScope {
    /// Merge globals, declared defaults and inputs
    pub fn merge(
        globals: HashMap<String, String>,
        declared: &[WorkflowVariable],
        inputs: &HashMap<String, String>,
    ) -> Self {
        let mut values = globals;

        for variable in declared {
            if variable.has_default() && !values.contains_key(&variable.name) {
                values.insert(variable.name.clone(), variable.default_value.clone());
            }
        }

        for (name, value) in inputs {
            values.insert(name.clone(), value.clone());
        }

        Self { values }
    }

    pub fn from_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn values(&self) -> &HashMap<String, String> {
        &self.values
    }

    /// Values visible to one step: the scope plus the step's local remaps
    ///
    /// A remap whose source name is not in scope is skipped, leaving the local
    /// placeholder unresolved.
    pub fn for_step(&self, step: &Step) -> HashMap<String, String> {
        let mut values = self.values.clone();
        for (local, source) in step.variables() {
            if let Some(value) = self.values.get(source) {
                values.insert(local.clone(), value.clone());
            }
        }
        values
    }
}
