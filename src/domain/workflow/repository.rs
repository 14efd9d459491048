//! Workflow repository trait

use async_trait::async_trait;

use super::entity::Workflow;
use crate::domain::DomainError;

/// Repository trait for workflow persistence
#[async_trait]
pub trait WorkflowRepository: Send + Sync + std::fmt::Debug {
    /// Get a workflow by ID, `NotFound` if absent
    async fn get(&self, id: &str) -> Result<Workflow, DomainError>;

    /// List all readable workflows
    async fn list(&self) -> Result<Vec<Workflow>, DomainError>;

    /// Upsert a workflow, assigning an ID if it has none
    async fn save(&self, workflow: Workflow) -> Result<Workflow, DomainError>;

    /// Delete a workflow by ID, `NotFound` if absent
    async fn delete(&self, id: &str) -> Result<(), DomainError>;

    /// Check if a workflow exists
    async fn exists(&self, id: &str) -> Result<bool, DomainError>;
}
