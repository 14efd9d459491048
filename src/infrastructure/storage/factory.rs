//! Storage factory for runtime storage selection

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::storage::{Storage, StorageEntity};
use crate::domain::DomainError;

use super::collection_file::CollectionFileStorage;
use super::file::FileStorage;
use super::in_memory::InMemoryStorage;

/// Supported storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// In-memory storage (for testing/development)
    InMemory,
    /// JSON files under a data directory
    File,
}

impl StorageType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Some(Self::InMemory),
            "file" | "files" | "json" => Some(Self::File),
            _ => None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    InMemory,
    /// Root data directory
    File(PathBuf),
}

impl StorageConfig {
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    pub fn file(data_dir: impl Into<PathBuf>) -> Self {
        Self::File(data_dir.into())
    }

    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::InMemory => StorageType::InMemory,
            Self::File(_) => StorageType::File,
        }
    }

    pub fn data_dir(&self) -> Option<&Path> {
        match self {
            Self::InMemory => None,
            Self::File(dir) => Some(dir),
        }
    }
}

/// Factory for creating storage instances
#[derive(Debug)]
pub struct StorageFactory;

impl StorageFactory {
    /// Create a storage keeping one record per entity, in `<data_dir>/<name>/`
    pub async fn create_records<E>(
        config: &StorageConfig,
        name: &str,
    ) -> Result<Arc<dyn Storage<E>>, DomainError>
    where
        E: StorageEntity + 'static,
    {
        match config {
            StorageConfig::InMemory => Ok(Arc::new(InMemoryStorage::<E>::new())),
            StorageConfig::File(dir) => Ok(Arc::new(FileStorage::<E>::open(dir.join(name)).await?)),
        }
    }

    /// Create a storage keeping the whole collection in `<data_dir>/<name>.json`
    pub async fn create_collection<E>(
        config: &StorageConfig,
        name: &str,
    ) -> Result<Arc<dyn Storage<E>>, DomainError>
    where
        E: StorageEntity + 'static,
    {
        match config {
            StorageConfig::InMemory => Ok(Arc::new(InMemoryStorage::<E>::new())),
            StorageConfig::File(dir) => {
                let path = dir.join(format!("{}.json", name));
                Ok(Arc::new(CollectionFileStorage::<E>::open(path).await?))
            }
        }
    }

    pub fn create_in_memory<E>() -> Arc<InMemoryStorage<E>>
    where
        E: StorageEntity,
    {
        Arc::new(InMemoryStorage::new())
    }
}
