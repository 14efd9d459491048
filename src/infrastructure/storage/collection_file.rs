//! Single-file collection storage
//!
//! The whole collection is one JSON array, rewritten in full on every
//! mutation. Suited to small collections such as global variables.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::file::write_atomic;
use crate::domain::storage::{Storage, StorageEntity, StorageKey};
use crate::domain::DomainError;

/// JSON array file holding every entity of one collection
#[derive(Debug)]
pub struct CollectionFileStorage<E>
where
    E: StorageEntity,
{
    path: PathBuf,
    cache: RwLock<BTreeMap<String, E>>,
}

impl<E> CollectionFileStorage<E>
where
    E: StorageEntity,
{
    /// Open the collection file. A missing file is an empty collection; a
    /// corrupt one is an error.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let cache = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => {
                let entities: Vec<E> = serde_json::from_slice(&bytes).map_err(|e| {
                    DomainError::storage(format!("Failed to parse {}: {}", path.display(), e))
                })?;
                entities
                    .into_iter()
                    .map(|entity| (entity.key().as_str().to_string(), entity))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(DomainError::storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        debug!(path = %path.display(), records = cache.len(), "Opened collection storage");

        Ok(Self {
            path,
            cache: RwLock::new(cache),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, cache: &BTreeMap<String, E>) -> Result<(), DomainError> {
        let entities: Vec<&E> = cache.values().collect();
        let json = serde_json::to_vec_pretty(&entities)?;
        write_atomic(&self.path, &json).await
    }
}

#[async_trait]
impl<E> Storage<E> for CollectionFileStorage<E>
where
    E: StorageEntity + 'static,
{
    async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError> {
        Ok(self.cache.read().await.get(key.as_str()).cloned())
    }

    async fn list(&self) -> Result<Vec<E>, DomainError> {
        Ok(self.cache.read().await.values().cloned().collect())
    }

    async fn create(&self, entity: E) -> Result<E, DomainError> {
        let key = entity.key().as_str().to_string();
        let mut cache = self.cache.write().await;

        if cache.contains_key(&key) {
            return Err(DomainError::conflict(format!(
                "Entity with key '{}' already exists",
                key
            )));
        }

        let mut next = cache.clone();
        next.insert(key, entity.clone());
        self.flush(&next).await?;
        *cache = next;
        Ok(entity)
    }

    async fn update(&self, entity: E) -> Result<E, DomainError> {
        let key = entity.key().as_str().to_string();
        let mut cache = self.cache.write().await;

        if !cache.contains_key(&key) {
            return Err(DomainError::not_found(format!(
                "Entity with key '{}' not found",
                key
            )));
        }

        let mut next = cache.clone();
        next.insert(key, entity.clone());
        self.flush(&next).await?;
        *cache = next;
        Ok(entity)
    }

    async fn save(&self, entity: E) -> Result<E, DomainError> {
        let key = entity.key().as_str().to_string();
        let mut cache = self.cache.write().await;

        let mut next = cache.clone();
        next.insert(key, entity.clone());
        self.flush(&next).await?;
        *cache = next;
        Ok(entity)
    }

    async fn delete(&self, key: &E::Key) -> Result<bool, DomainError> {
        let mut cache = self.cache.write().await;

        if !cache.contains_key(key.as_str()) {
            return Ok(false);
        }

        let mut next = cache.clone();
        next.remove(key.as_str());
        self.flush(&next).await?;
        *cache = next;
        Ok(true)
    }

    async fn exists(&self, key: &E::Key) -> Result<bool, DomainError> {
        Ok(self.cache.read().await.contains_key(key.as_str()))
    }

    async fn count(&self) -> Result<usize, DomainError> {
        Ok(self.cache.read().await.len())
    }
}
