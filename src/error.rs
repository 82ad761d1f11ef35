use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkflowError>;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid workflow definition: {0}")]
    InvalidDefinition(String),
    #[error("workflow `{0}` is not registered")]
    WorkflowNotRegistered(String),
    #[error("state `{state}` not found in workflow `{workflow}`")]
    StateNotFound { workflow: String, state: String },
    #[error("workflow execution exceeded maximum steps ({0})")]
    StepLimitExceeded(u32),
    #[error("template error: {0}")]
    Template(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
