//! Storage infrastructure - Storage implementations

mod collection_file;
mod factory;
mod file;
mod in_memory;

pub use collection_file::CollectionFileStorage;
pub use factory::{StorageConfig, StorageFactory, StorageType};
pub use file::FileStorage;
pub use in_memory::InMemoryStorage;
