//! Global variable infrastructure implementations

mod storage_repository;

pub use storage_repository::StorageVariableStore;
