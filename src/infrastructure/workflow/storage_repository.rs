//! Storage-backed workflow repository implementation

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::storage::Storage;
use crate::domain::workflow::{validate_workflow_id, Workflow, WorkflowId, WorkflowRepository};
use crate::domain::DomainError;

/// Storage-backed implementation of WorkflowRepository
#[derive(Debug)]
pub struct StorageWorkflowRepository {
    storage: Arc<dyn Storage<Workflow>>,
}

impl StorageWorkflowRepository {
    pub fn new(storage: Arc<dyn Storage<Workflow>>) -> Self {
        Self { storage }
    }

    fn key(id: &str) -> Result<WorkflowId, DomainError> {
        WorkflowId::new(id).map_err(|e| DomainError::validation(e.to_string()))
    }
}

#[async_trait]
impl WorkflowRepository for StorageWorkflowRepository {
    async fn get(&self, id: &str) -> Result<Workflow, DomainError> {
        let not_found = || DomainError::not_found(format!("Workflow '{}' not found", id));

        // An ID that can't name a record can't be stored either
        let Ok(key) = WorkflowId::new(id) else {
            return Err(not_found());
        };

        self.storage.get(&key).await?.ok_or_else(not_found)
    }

    async fn list(&self) -> Result<Vec<Workflow>, DomainError> {
        let mut workflows = self.storage.list().await?;
        workflows.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.id().as_str().cmp(b.id().as_str())));
        Ok(workflows)
    }

    async fn save(&self, mut workflow: Workflow) -> Result<Workflow, DomainError> {
        if workflow.id().is_unassigned() {
            workflow.assign_id(WorkflowId::generate());
        } else {
            validate_workflow_id(workflow.id().as_str())
                .map_err(|e| DomainError::validation(e.to_string()))?;
        }

        let existing = self.storage.get(workflow.id()).await?;
        workflow.stamp(existing.map(|w| w.created_at()));

        debug!(workflow_id = %workflow.id(), steps = workflow.step_count(), "Saving workflow");
        self.storage.save(workflow).await
    }

    async fn delete(&self, id: &str) -> Result<(), DomainError> {
        let key = Self::key(id)
            .map_err(|_| DomainError::not_found(format!("Workflow '{}' not found", id)))?;

        if self.storage.delete(&key).await? {
            Ok(())
        } else {
            Err(DomainError::not_found(format!("Workflow '{}' not found", id)))
        }
    }

    async fn exists(&self, id: &str) -> Result<bool, DomainError> {
        match Self::key(id) {
            Ok(key) => self.storage.exists(&key).await,
            Err(_) => Ok(false),
        }
    }
}
