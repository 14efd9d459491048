//! Storage-backed variable store implementation

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::domain::storage::Storage;
use crate::domain::variable::{GlobalVariable, VariableStore};
use crate::domain::DomainError;

/// Storage-backed implementation of VariableStore
///
/// Writes are serialized so that a read-modify-write in `set` sees the
/// previous write's result.
#[derive(Debug)]
pub struct StorageVariableStore {
    storage: Arc<dyn Storage<GlobalVariable>>,
    writer: Mutex<()>,
}

impl StorageVariableStore {
    pub fn new(storage: Arc<dyn Storage<GlobalVariable>>) -> Self {
        Self {
            storage,
            writer: Mutex::new(()),
        }
    }
}

#[async_trait]
impl VariableStore for StorageVariableStore {
    async fn get_all(&self) -> Result<HashMap<String, String>, DomainError> {
        Ok(self
            .storage
            .list()
            .await?
            .into_iter()
            .map(|v| (v.name, v.value))
            .collect())
    }

    async fn get(&self, name: &str) -> Result<GlobalVariable, DomainError> {
        self.storage
            .get(&name.to_string())
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Variable '{}' not found", name)))
    }

    async fn set(&self, mut variable: GlobalVariable) -> Result<GlobalVariable, DomainError> {
        if variable.name.trim().is_empty() {
            return Err(DomainError::validation("Variable name cannot be empty"));
        }

        let _guard = self.writer.lock().await;
        let now = Utc::now();
        variable.created_at = match self.storage.get(&variable.name).await? {
            Some(existing) => existing.created_at,
            None => now,
        };
        variable.updated_at = now;

        self.storage.save(variable).await
    }

    async fn delete(&self, name: &str) -> Result<(), DomainError> {
        let _guard = self.writer.lock().await;
        if self.storage.delete(&name.to_string()).await? {
            Ok(())
        } else {
            Err(DomainError::not_found(format!("Variable '{}' not found", name)))
        }
    }

    async fn list(&self) -> Result<Vec<GlobalVariable>, DomainError> {
        let mut variables = self.storage.list().await?;
        variables.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(variables)
    }
}
