//! Step, condition and action types

use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// What a step runs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    /// `content` is a shell command template
    Command,

    /// `content` is the ID of another workflow
    WorkflowRef,

    /// Any type this engine does not know; running it is a step error
    #[serde(other)]
    Unknown,
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Command => "command",
            Self::WorkflowRef => "workflow_ref",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Control-flow verb applied by a condition or a success/failure hook
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepActionType {
    #[default]
    Continue,
    Stop,
    JumpTo,
    ExecuteStep,

    /// Unrecognized verbs behave like `continue`
    #[serde(other)]
    Unknown,
}

impl fmt::Display for StepActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Continue => "continue",
            Self::Stop => "stop",
            Self::JumpTo => "jump_to",
            Self::ExecuteStep => "execute_step",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// A control-flow action with its optional target step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StepAction {
    #[serde(rename = "type")]
    pub action_type: StepActionType,

    /// Step ID, required for `jump_to` and `execute_step`
    #[serde(default)]
    pub target: String,
}

impl StepAction {
    pub fn new(action_type: StepActionType, target: impl Into<String>) -> Self {
        Self {
            action_type,
            target: target.into(),
        }
    }

    pub fn stop() -> Self {
        Self::new(StepActionType::Stop, "")
    }

    pub fn jump_to(target: impl Into<String>) -> Self {
        Self::new(StepActionType::JumpTo, target)
    }

    pub fn execute_step(target: impl Into<String>) -> Self {
        Self::new(StepActionType::ExecuteStep, target)
    }

    /// Whether this action type names a step to act on
    pub fn needs_target(&self) -> bool {
        matches!(
            self.action_type,
            StepActionType::JumpTo | StepActionType::ExecuteStep
        )
    }
}

/// How a condition compares against step output
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    /// Raw output contains the value
    Contains,
    /// Trimmed output equals the value
    Equals,
    StartsWith,
    EndsWith,
    /// Raw output matches the value as a regular expression
    Regex,
    /// Exit code, rendered as decimal, equals the value
    ExitCode,

    /// Never matches
    #[serde(other)]
    Unknown,
}

/// A predicate over a step's output and exit code
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,

    #[serde(default)]
    pub value: String,

    #[serde(default)]
    pub action: StepAction,
}

impl Condition {
    pub fn new(condition_type: ConditionType, value: impl Into<String>, action: StepAction) -> Self {
        Self {
            condition_type,
            value: value.into(),
            action,
        }
    }

    /// Evaluate against the accumulated output text and exit code
    pub fn matches(&self, output: &str, exit_code: i32) -> bool {
        match self.condition_type {
            ConditionType::Contains => output.contains(&self.value),
            ConditionType::Equals => output.trim() == self.value,
            ConditionType::StartsWith => output.trim().starts_with(&self.value),
            ConditionType::EndsWith => output.trim().ends_with(&self.value),
            ConditionType::Regex => match Regex::new(&self.value) {
                Ok(re) => re.is_match(output),
                Err(e) => {
                    warn!("Ignoring condition with invalid regex '{}': {}", self.value, e);
                    false
                }
            },
            ConditionType::ExitCode => exit_code.to_string() == self.value.trim(),
            ConditionType::Unknown => false,
        }
    }
}

/// First condition whose predicate holds, in declaration order
pub fn first_match<'a>(conditions: &'a [Condition], output: &str, exit_code: i32) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.matches(output, exit_code))
}

/// One unit of work within a workflow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    /// Unique within the workflow; used as jump target
    id: String,

    name: String,

    #[serde(rename = "type")]
    step_type: StepType,

    /// Kept for stored-record compatibility; execution order is array position
    #[serde(default)]
    order: i32,

    /// Shell command template, or referenced workflow ID
    #[serde(default)]
    content: String,

    /// Local placeholder name to global variable name
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    variables: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    on_success: Option<StepAction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    on_failure: Option<StepAction>,
}

impl Step {
    fn new(id: impl Into<String>, name: impl Into<String>, step_type: StepType, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            step_type,
            order: 0,
            content: content.into(),
            variables: HashMap::new(),
            conditions: Vec::new(),
            on_success: None,
            on_failure: None,
        }
    }

    /// A shell command step
    pub fn command(id: impl Into<String>, name: impl Into<String>, command: impl Into<String>) -> Self {
        Self::new(id, name, StepType::Command, command)
    }

    /// A step that runs another workflow
    pub fn workflow_ref(id: impl Into<String>, name: impl Into<String>, workflow_id: impl Into<String>) -> Self {
        Self::new(id, name, StepType::WorkflowRef, workflow_id)
    }

    pub fn with_type(mut self, step_type: StepType) -> Self {
        self.step_type = step_type;
        self
    }

    pub fn with_variable(mut self, local: impl Into<String>, global: impl Into<String>) -> Self {
        self.variables.insert(local.into(), global.into());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_on_success(mut self, action: StepAction) -> Self {
        self.on_success = Some(action);
        self
    }

    pub fn with_on_failure(mut self, action: StepAction) -> Self {
        self.on_failure = Some(action);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step_type(&self) -> StepType {
        self.step_type
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn variables(&self) -> &HashMap<String, String> {
        &self.variables
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn on_success(&self) -> Option<&StepAction> {
        self.on_success.as_ref()
    }

    pub fn on_failure(&self) -> Option<&StepAction> {
        self.on_failure.as_ref()
    }

    /// Every action this step can take, for target validation
    pub fn actions(&self) -> impl Iterator<Item = &StepAction> {
        self.conditions
            .iter()
            .map(|c| &c.action)
            .chain(self.on_success.iter())
            .chain(self.on_failure.iter())
    }
}
