//! Workflow service - administrative operations on workflow definitions
//!
//! Wraps the repository with definition validation and input pre-flight
//! checks. The executor never calls into this service; pre-flight is advisory.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::template::CommandTemplate;
use crate::domain::variable::VariableStore;
use crate::domain::workflow::{
    StepType, VariableScope, VariableType, Workflow, WorkflowRepository,
};
use crate::domain::DomainError;

/// A problem found in a workflow definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// Two steps share an ID; jumps to it would be ambiguous
    DuplicateStepId(String),
    /// A condition or hook names a step that doesn't exist
    UnknownTarget { step_id: String, target: String },
    /// A `jump_to`/`execute_step` action without a target
    MissingTarget { step_id: String },
    /// A `workflow_ref` step names a workflow that doesn't exist
    UnknownWorkflow { step_id: String, workflow_id: String },
    UnknownStepType { step_id: String },
    EmptyContent { step_id: String },
}

impl ValidationIssue {
    /// Issues that make a definition unsafe to store
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::DuplicateStepId(_))
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateStepId(id) => write!(f, "duplicate step id '{}'", id),
            Self::UnknownTarget { step_id, target } => {
                write!(f, "step '{}' targets unknown step '{}'", step_id, target)
            }
            Self::MissingTarget { step_id } => {
                write!(f, "step '{}' has an action without a target", step_id)
            }
            Self::UnknownWorkflow {
                step_id,
                workflow_id,
            } => write!(
                f,
                "step '{}' references unknown workflow '{}'",
                step_id, workflow_id
            ),
            Self::UnknownStepType { step_id } => write!(f, "step '{}' has an unknown type", step_id),
            Self::EmptyContent { step_id } => write!(f, "step '{}' has no content", step_id),
        }
    }
}

/// Result of checking caller inputs against a workflow before running it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputReport {
    /// Required variables with no value in the merged scope
    pub missing_required: Vec<String>,
    /// `(name, value)` pairs rejected by the variable's type or options
    pub invalid_values: Vec<(String, String)>,
    /// Step ID to the placeholders its command would leave unresolved
    pub unresolved: Vec<(String, Vec<String>)>,
}

impl InputReport {
    pub fn is_ok(&self) -> bool {
        self.missing_required.is_empty() && self.invalid_values.is_empty() && self.unresolved.is_empty()
    }
}

/// Workflow service for administrative operations
#[derive(Debug)]
pub struct WorkflowService {
    workflows: Arc<dyn WorkflowRepository>,
    variables: Arc<dyn VariableStore>,
}

impl WorkflowService {
    pub fn new(workflows: Arc<dyn WorkflowRepository>, variables: Arc<dyn VariableStore>) -> Self {
        Self {
            workflows,
            variables,
        }
    }

    /// Get a workflow by ID
    pub async fn get(&self, id: &str) -> Result<Workflow, DomainError> {
        self.workflows.get(id).await
    }

    /// List all workflows
    pub async fn list(&self) -> Result<Vec<Workflow>, DomainError> {
        self.workflows.list().await
    }

    /// Save a workflow after validating it
    ///
    /// Only blocking issues reject the save; the rest are logged.
    pub async fn save(&self, workflow: Workflow) -> Result<Workflow, DomainError> {
        let issues = self.validate(&workflow).await?;

        if let Some(issue) = issues.iter().find(|i| i.is_blocking()) {
            return Err(DomainError::validation(format!(
                "Invalid workflow '{}': {}",
                workflow.name(),
                issue
            )));
        }

        for issue in &issues {
            warn!("Workflow '{}': {}", workflow.name(), issue);
        }

        self.workflows.save(workflow).await
    }

    /// Parse a workflow from JSON and save it
    pub async fn import_json(&self, json: &str) -> Result<Workflow, DomainError> {
        let workflow: Workflow = serde_json::from_str(json)
            .map_err(|e| DomainError::validation(format!("Invalid workflow JSON: {}", e)))?;
        self.save(workflow).await
    }

    /// Delete a workflow by ID
    pub async fn delete(&self, id: &str) -> Result<(), DomainError> {
        self.workflows.delete(id).await
    }

    /// Check a definition for structural problems
    pub async fn validate(&self, workflow: &Workflow) -> Result<Vec<ValidationIssue>, DomainError> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();

        for step in workflow.steps() {
            if !seen.insert(step.id()) {
                issues.push(ValidationIssue::DuplicateStepId(step.id().to_string()));
            }
        }

        for step in workflow.steps() {
            let step_id = step.id().to_string();

            match step.step_type() {
                StepType::Unknown => {
                    issues.push(ValidationIssue::UnknownStepType { step_id: step_id.clone() })
                }
                _ if step.content().trim().is_empty() => {
                    issues.push(ValidationIssue::EmptyContent { step_id: step_id.clone() })
                }
                StepType::WorkflowRef => {
                    let target = step.content().trim();
                    if target != workflow.id().as_str() && !self.workflows.exists(target).await? {
                        issues.push(ValidationIssue::UnknownWorkflow {
                            step_id: step_id.clone(),
                            workflow_id: target.to_string(),
                        });
                    }
                }
                StepType::Command => {}
            }

            for action in step.actions().filter(|a| a.needs_target()) {
                if action.target.trim().is_empty() {
                    issues.push(ValidationIssue::MissingTarget { step_id: step_id.clone() });
                } else if workflow.get_step(&action.target).is_none() {
                    issues.push(ValidationIssue::UnknownTarget {
                        step_id: step_id.clone(),
                        target: action.target.clone(),
                    });
                }
            }
        }

        debug!("Validated workflow '{}': {} issues", workflow.name(), issues.len());
        Ok(issues)
    }

    /// Merge the scope a run would see and report what it leaves unresolved
    pub async fn check_inputs(
        &self,
        id: &str,
        inputs: &HashMap<String, String>,
    ) -> Result<InputReport, DomainError> {
        let workflow = self.workflows.get(id).await?;
        let scope = self.scope_for(&workflow, inputs).await?;
        let mut report = InputReport::default();

        for variable in workflow.variables() {
            match scope.get(&variable.name) {
                None | Some("") if variable.required => {
                    report.missing_required.push(variable.name.clone());
                }
                Some(value) if !value.is_empty() && !variable.accepts(value) => {
                    report
                        .invalid_values
                        .push((variable.name.clone(), value.to_string()));
                }
                _ => {}
            }
        }

        for step in workflow.steps() {
            if step.step_type() != StepType::Command {
                continue;
            }
            let missing = CommandTemplate::parse(step.content()).missing(&scope.for_step(step));
            if !missing.is_empty() {
                report.unresolved.push((step.id().to_string(), missing));
            }
        }

        Ok(report)
    }

    /// Commands as they would run, with empty values left as placeholders
    pub async fn preview(
        &self,
        id: &str,
        inputs: &HashMap<String, String>,
    ) -> Result<Vec<(String, String)>, DomainError> {
        let workflow = self.workflows.get(id).await?;
        let scope = self.scope_for(&workflow, inputs).await?;

        Ok(workflow
            .steps()
            .iter()
            .map(|step| {
                let text = match step.step_type() {
                    StepType::Command => {
                        CommandTemplate::parse(step.content()).preview(&scope.for_step(step))
                    }
                    _ => format!("[{}] {}", step.step_type(), step.content()),
                };
                (step.id().to_string(), text)
            })
            .collect())
    }

    async fn scope_for(
        &self,
        workflow: &Workflow,
        inputs: &HashMap<String, String>,
    ) -> Result<VariableScope, DomainError> {
        let globals = self.variables.get_all().await?;
        Ok(VariableScope::merge(globals, workflow.variables(), inputs))
    }

    /// Declared select variables and their options, for prompting
    pub fn select_options(workflow: &Workflow) -> Vec<(&str, &[String])> {
        workflow
            .variables()
            .iter()
            .filter(|v| v.var_type == VariableType::Select)
            .map(|v| (v.name.as_str(), v.options.as_slice()))
            .collect()
    }
}
