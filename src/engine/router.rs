use std::collections::{BTreeSet, HashMap};

use parking_lot::RwLock;

/// Event-name to workflow-id index, built from each definition's triggers.
/// Mutated only at (un)registration; `trigger` fan-out reads it.
#[derive(Default)]
pub struct EventRouter {
    index: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, event: &str, workflow_id: &str) {
        self.index
            .write()
            .entry(event.to_string())
            .or_default()
            .insert(workflow_id.to_string());
    }

    pub fn unsubscribe(&self, event: &str, workflow_id: &str) {
        let mut index = self.index.write();
        if let Some(subscribers) = index.get_mut(event) {
            subscribers.remove(workflow_id);
            if subscribers.is_empty() {
                index.remove(event);
            }
        }
    }

    pub fn subscribers(&self, event: &str) -> Vec<String> {
        self.index
            .read()
            .get(event)
            .map(|subscribers| subscribers.iter().cloned().collect())
            .unwrap_or_default()
    }
}
