//! Global variable domain

mod entity;
mod repository;

pub use entity::GlobalVariable;
pub use repository::VariableStore;

#[cfg(test)]
pub use repository::MockVariableStore;
