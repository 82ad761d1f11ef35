use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::definition::WorkflowDefinition;

/// Definition storage. Read-heavy; mutated only at (un)registration, so a
/// single lock around the map is enough.
#[derive(Default)]
pub struct WorkflowRegistry {
    workflows: RwLock<HashMap<String, Arc<WorkflowDefinition>>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a definition, returning the one it replaced, if any. The
    /// caller validates before inserting.
    pub fn insert(&self, definition: WorkflowDefinition) -> Option<Arc<WorkflowDefinition>> {
        self.workflows
            .write()
            .insert(definition.id.clone(), Arc::new(definition))
    }

    pub fn remove(&self, workflow_id: &str) -> Option<Arc<WorkflowDefinition>> {
        self.workflows.write().remove(workflow_id)
    }

    pub fn get(&self, workflow_id: &str) -> Option<Arc<WorkflowDefinition>> {
        self.workflows.read().get(workflow_id).cloned()
    }

    pub fn list(&self) -> Vec<Arc<WorkflowDefinition>> {
        self.workflows.read().values().cloned().collect()
    }
}
