//! File-per-entity JSON storage
//!
//! Each entity lives in `<dir>/<key>.json`. The directory is read once when the
//! storage is opened; afterwards reads are served from an in-memory cache and
//! every mutation writes through to disk while holding the write lock.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::domain::storage::{Storage, StorageEntity, StorageKey};
use crate::domain::DomainError;

const EXTENSION: &str = "json";

/// JSON storage with one file per entity
#[derive(Debug)]
pub struct FileStorage<E>
where
    E: StorageEntity,
{
    dir: PathBuf,
    cache: RwLock<BTreeMap<String, E>>,
}

impl<E> FileStorage<E>
where
    E: StorageEntity,
{
    /// Open the storage directory, creating it if needed, and load every
    /// readable record. Unreadable or corrupt files are skipped.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            DomainError::storage(format!(
                "Failed to create storage directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let cache = load_dir::<E>(&dir).await?;
        debug!(dir = %dir.display(), records = cache.len(), "Opened file storage");

        Ok(Self {
            dir,
            cache: RwLock::new(cache),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, DomainError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(DomainError::validation(format!(
                "Key '{}' cannot be used as a file name",
                key
            )));
        }
        Ok(self.dir.join(format!("{}.{}", key, EXTENSION)))
    }

    async fn write_record(&self, entity: &E) -> Result<(), DomainError> {
        let path = self.path_for(entity.key().as_str())?;
        let json = serde_json::to_vec_pretty(entity)?;
        write_atomic(&path, &json).await
    }
}

async fn load_dir<E>(dir: &Path) -> Result<BTreeMap<String, E>, DomainError>
where
    E: StorageEntity,
{
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut records = BTreeMap::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
            continue;
        }
        if !entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable record");
                continue;
            }
        };

        match serde_json::from_slice::<E>(&bytes) {
            Ok(entity) if !entity.key().as_str().is_empty() => {
                records.insert(entity.key().as_str().to_string(), entity);
            }
            Ok(_) => {
                warn!(path = %path.display(), "Skipping record without a key");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping corrupt record");
            }
        }
    }

    Ok(records)
}

/// Write to a sibling temp file, then rename over the target
pub(super) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DomainError> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await.map_err(|e| {
        DomainError::storage(format!("Failed to write {}: {}", tmp.display(), e))
    })?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| {
        DomainError::storage(format!("Failed to replace {}: {}", path.display(), e))
    })
}

#[async_trait]
impl<E> Storage<E> for FileStorage<E>
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

        self.write_record(&entity).await?;
        cache.insert(key, entity.clone());
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

        self.write_record(&entity).await?;
        cache.insert(key, entity.clone());
        Ok(entity)
    }

    async fn save(&self, entity: E) -> Result<E, DomainError> {
        let key = entity.key().as_str().to_string();
        let mut cache = self.cache.write().await;

        self.write_record(&entity).await?;
        cache.insert(key, entity.clone());
        Ok(entity)
    }

    async fn delete(&self, key: &E::Key) -> Result<bool, DomainError> {
        let mut cache = self.cache.write().await;

        if !cache.contains_key(key.as_str()) {
            return Ok(false);
        }

        let path = self.path_for(key.as_str())?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(DomainError::storage(format!(
                    "Failed to remove {}: {}",
                    path.display(),
                    e
                )));
            }
        }

        cache.remove(key.as_str());
        Ok(true)
    }

    async fn exists(&self, key: &E::Key) -> Result<bool, DomainError> {
        Ok(self.cache.read().await.contains_key(key.as_str()))
    }

    async fn count(&self) -> Result<usize, DomainError> {
        Ok(self.cache.read().await.len())
    }
}
