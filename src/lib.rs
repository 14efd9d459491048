//! DevOps Workflow
//!
//! Runs user-defined workflows: ordered shell commands and nested workflows
//! with template variables, output conditions and per-step hooks.

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use crate::config::AppConfig;

use std::sync::Arc;

use domain::{GlobalVariable, VariableStore, Workflow, WorkflowExecutor, WorkflowRepository};
use infrastructure::{
    services::WorkflowService,
    shell::ProcessShellRunner,
    storage::StorageFactory,
    variable::StorageVariableStore,
    workflow::{StorageWorkflowRepository, WorkflowExecutorImpl},
};
use tracing::info;

/// Shared services used by every command
#[derive(Debug, Clone)]
pub struct AppState {
    pub workflows: Arc<dyn WorkflowRepository>,
    pub variables: Arc<dyn VariableStore>,
    pub workflow_service: Arc<WorkflowService>,
    pub executor: Arc<dyn WorkflowExecutor>,
}

/// Create the application state with default configuration
pub async fn create_app_state() -> anyhow::Result<AppState> {
    create_app_state_with_config(&AppConfig::default()).await
}

/// Create the application state with custom configuration
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let storage_config = config.storage.storage_config();
    info!("Storage backend: {:?}", storage_config.storage_type());

    let workflow_storage = StorageFactory::create_records::<Workflow>(&storage_config, "workflows")
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open workflow storage: {}", e))?;
    let variable_storage =
        StorageFactory::create_collection::<GlobalVariable>(&storage_config, "global_variables")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open variable storage: {}", e))?;

    let workflows: Arc<dyn WorkflowRepository> =
        Arc::new(StorageWorkflowRepository::new(workflow_storage));
    let variables: Arc<dyn VariableStore> = Arc::new(StorageVariableStore::new(variable_storage));

    let shell = Arc::new(ProcessShellRunner::new(config.executor.shell.clone()));
    let executor: Arc<dyn WorkflowExecutor> = Arc::new(WorkflowExecutorImpl::with_config(
        workflows.clone(),
        variables.clone(),
        shell,
        config.executor.executor_config(),
    ));

    let workflow_service = Arc::new(WorkflowService::new(workflows.clone(), variables.clone()));

    info!("Application state initialized");

    Ok(AppState {
        workflows,
        variables,
        workflow_service,
        executor,
    })
}
