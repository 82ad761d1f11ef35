mod definition;
mod loader;
mod registry;

pub use definition::{ActionKind, ActionSpec, WorkflowDefinition, WorkflowState};
pub use loader::{load_workflow_dir, load_workflow_file, save_workflow_file};
pub use registry::WorkflowRegistry;
