pub mod actions;
pub mod engine;
pub mod error;
pub mod template;
pub mod utils;
pub mod workflow;

pub use actions::{ActionExecutor, DryRunExecutor, InternalOp};
pub use engine::{
    EventRouter, ExecutionScheduler, ExecutionSummary, WorkflowContext, WorkflowEngine,
    WorkflowStatus,
};
pub use error::{Result, WorkflowError};
pub use workflow::{
    load_workflow_dir, load_workflow_file, save_workflow_file, ActionKind, ActionSpec,
    WorkflowDefinition, WorkflowRegistry, WorkflowState,
};
