//! Workflow domain entity

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::WorkflowError;
use super::step_types::Step;
use crate::domain::storage::{StorageEntity, StorageKey};

/// Maximum length for workflow IDs
pub const MAX_ID_LENGTH: usize = 64;

/// Workflow IDs double as file names, so they are restricted to a safe alphabet
static ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_-]*$").unwrap());

/// Workflow identifier
///
/// Deserialization accepts any string (including empty, meaning "not yet
/// assigned"); repositories validate the ID before persisting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(String);

impl WorkflowId {
    /// Create a new validated workflow ID
    pub fn new(id: impl Into<String>) -> Result<Self, WorkflowError> {
        let id = id.into();
        validate_workflow_id(&id)?;
        Ok(Self(id))
    }

    /// Generate a fresh random ID
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when no ID has been assigned yet
    pub fn is_unassigned(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for WorkflowId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl StorageKey for WorkflowId {
    fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validate a workflow ID string
pub fn validate_workflow_id(id: &str) -> Result<(), WorkflowError> {
    if id.is_empty() {
        return Err(WorkflowError::validation("Workflow ID cannot be empty"));
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(WorkflowError::validation(format!(
            "Workflow ID exceeds maximum length of {} characters",
            MAX_ID_LENGTH
        )));
    }

    if !ID_PATTERN.is_match(id) {
        return Err(WorkflowError::validation(format!(
            "Invalid workflow ID '{}': must be alphanumeric with hyphens or underscores and start with alphanumeric",
            id
        )));
    }

    Ok(())
}

/// Kind of value a declared variable holds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    #[default]
    String,
    Number,
    Select,
    Boolean,
}

/// A variable declared by a workflow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct WorkflowVariable {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "type", default)]
    pub var_type: VariableType,

    /// Applied when the name is absent from the global scope; empty means no default
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_value: String,

    /// Allowed values for select variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,

    #[serde(default)]
    pub is_global: bool,

    #[serde(default)]
    pub required: bool,
}

impl WorkflowVariable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = value.into();
        self
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.var_type = VariableType::Select;
        self.options = options;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn has_default(&self) -> bool {
        !self.default_value.is_empty()
    }

    /// Whether `value` is acceptable for this variable's type
    pub fn accepts(&self, value: &str) -> bool {
        match self.var_type {
            VariableType::Select => self.options.is_empty() || self.options.iter().any(|o| o == value),
            VariableType::Number => value.trim().parse::<f64>().is_ok(),
            VariableType::Boolean => matches!(value, "true" | "false"),
            VariableType::String => true,
        }
    }
}

/// A workflow definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    id: WorkflowId,

    name: String,

    #[serde(default)]
    description: String,

    #[serde(default)]
    category: String,

    #[serde(default)]
    variables: Vec<WorkflowVariable>,

    /// Executed in array order
    #[serde(default)]
    steps: Vec<Step>,

    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Create a new workflow
    pub fn new(id: WorkflowId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            description: String::new(),
            category: String::new(),
            variables: Vec::new(),
            steps: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    // Builder methods

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_variable(mut self, variable: WorkflowVariable) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn with_steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    // Getters

    pub fn id(&self) -> &WorkflowId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn variables(&self) -> &[WorkflowVariable] {
        &self.variables
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Get a step by its ID
    pub fn get_step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id() == id)
    }

    /// Step ID to array position. The first occurrence wins on duplicates.
    pub fn step_index(&self) -> HashMap<&str, usize> {
        let mut index = HashMap::with_capacity(self.steps.len());
        for (i, step) in self.steps.iter().enumerate() {
            index.entry(step.id()).or_insert(i);
        }
        index
    }

    // Persistence stamps

    pub(crate) fn assign_id(&mut self, id: WorkflowId) {
        self.id = id;
    }

    /// Stamp timestamps for a write; `created_at` comes from the stored record if any
    pub(crate) fn stamp(&mut self, created_at: Option<DateTime<Utc>>) {
        let now = Utc::now();
        self.created_at = created_at.unwrap_or(now);
        self.updated_at = now;
    }
}

impl StorageEntity for Workflow {
    type Key = WorkflowId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}
