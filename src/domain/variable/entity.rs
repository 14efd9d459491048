//! Global variable entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::storage::StorageEntity;

/// A reusable named value shared by every workflow execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalVariable {
    pub name: String,

    pub value: String,

    #[serde(default)]
    pub description: String,

    /// Set on the first write and preserved afterwards
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl GlobalVariable {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            value: value.into(),
            description: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl StorageEntity for GlobalVariable {
    type Key = String;

    fn key(&self) -> &Self::Key {
        &self.name
    }
}
