//! Variable store trait

use std::collections::HashMap;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::entity::GlobalVariable;
use crate::domain::DomainError;

/// Durable store of named global string variables
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VariableStore: Send + Sync + std::fmt::Debug {
    /// Name to value snapshot used when merging an execution's scope
    async fn get_all(&self) -> Result<HashMap<String, String>, DomainError>;

    /// Get a variable by name, `NotFound` if absent
    async fn get(&self, name: &str) -> Result<GlobalVariable, DomainError>;

    /// Upsert a variable by name
    async fn set(&self, variable: GlobalVariable) -> Result<GlobalVariable, DomainError>;

    /// Delete a variable by name, `NotFound` if absent
    async fn delete(&self, name: &str) -> Result<(), DomainError>;

    /// List all variables ordered by name
    async fn list(&self) -> Result<Vec<GlobalVariable>, DomainError>;
}
