mod context;
mod executor;
mod router;
mod runner;
mod scheduler;

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

use crate::actions::ActionExecutor;
use crate::error::Result;
use crate::workflow::{WorkflowDefinition, WorkflowRegistry};

pub use context::{ExecutionSummary, WorkflowContext, WorkflowStatus};
pub use router::EventRouter;
pub use scheduler::ExecutionScheduler;

/// Step cap guarding against transition cycles.
pub const DEFAULT_MAX_STEPS: u32 = 100;

/// Control surface over the registry, event router, and scheduler. The only
/// piece of the integration layer it consumes is the injected
/// [`ActionExecutor`].
pub struct WorkflowEngine {
    registry: Arc<WorkflowRegistry>,
    router: Arc<EventRouter>,
    scheduler: Arc<ExecutionScheduler>,
}

impl WorkflowEngine {
    pub fn new(actions: Arc<dyn ActionExecutor>) -> Self {
        Self::with_max_steps(actions, DEFAULT_MAX_STEPS)
    }

    pub fn with_max_steps(actions: Arc<dyn ActionExecutor>, max_steps: u32) -> Self {
        let registry = Arc::new(WorkflowRegistry::new());
        let router = Arc::new(EventRouter::new());
        let scheduler = Arc::new(ExecutionScheduler::new(
            Arc::clone(&registry),
            actions,
            max_steps,
        ));
        Self {
            registry,
            router,
            scheduler,
        }
    }

    /// Validates and stores a definition, indexing its triggers. Nothing is
    /// stored when validation fails. Registering an id again replaces the
    /// previous definition and its trigger index entries.
    pub fn register(&self, definition: WorkflowDefinition) -> Result<()> {
        definition.validate()?;

        let workflow_id = definition.id.clone();
        let triggers = definition.triggers.clone();
        if let Some(previous) = self.registry.insert(definition) {
            warn!(workflow = %workflow_id, "replacing already-registered workflow");
            for trigger in &previous.triggers {
                self.router.unsubscribe(trigger, &workflow_id);
            }
        }
        for trigger in &triggers {
            self.router.subscribe(trigger, &workflow_id);
        }
        Ok(())
    }

    /// Removes a definition and its trigger index entries. In-flight
    /// executions keep running against the definition snapshot their runner
    /// task took at spawn.
    pub fn unregister(&self, workflow_id: &str) -> bool {
        match self.registry.remove(workflow_id) {
            Some(previous) => {
                for trigger in &previous.triggers {
                    self.router.unsubscribe(trigger, workflow_id);
                }
                true
            }
            None => false,
        }
    }

    pub fn get(&self, workflow_id: &str) -> Option<Arc<WorkflowDefinition>> {
        self.registry.get(workflow_id)
    }

    pub fn list_workflows(&self) -> Vec<Arc<WorkflowDefinition>> {
        self.registry.list()
    }

    pub async fn start(
        &self,
        workflow_id: &str,
        variables: Map<String, Value>,
        trigger: Option<String>,
    ) -> Result<String> {
        self.scheduler.start(workflow_id, variables, trigger).await
    }

    /// Starts every workflow subscribed to the event, seeding each with the
    /// payload as variables. Starts are independent: a subscriber that fails
    /// to start (say, unregistered after indexing) is skipped with a warning
    /// and never blocks the rest. Returns the execution ids actually started.
    pub async fn trigger(&self, event: &str, payload: Map<String, Value>) -> Vec<String> {
        let subscribers = self.router.subscribers(event);
        let starts = subscribers.iter().map(|workflow_id| {
            self.scheduler
                .start(workflow_id, payload.clone(), Some(event.to_string()))
        });

        let mut started = Vec::new();
        for (workflow_id, result) in subscribers.iter().zip(futures::future::join_all(starts).await)
        {
            match result {
                Ok(execution_id) => started.push(execution_id),
                Err(error) => {
                    warn!(%event, workflow = %workflow_id, %error, "skipping event subscriber");
                }
            }
        }
        started
    }

    pub fn cancel(&self, execution_id: &str) -> bool {
        self.scheduler.cancel(execution_id)
    }

    pub fn pause(&self, execution_id: &str) -> bool {
        self.scheduler.pause(execution_id)
    }

    pub fn resume(&self, execution_id: &str) -> bool {
        self.scheduler.resume(execution_id)
    }

    pub fn status(&self, execution_id: &str) -> Option<WorkflowContext> {
        self.scheduler.status(execution_id)
    }

    pub fn list_executions(
        &self,
        workflow_id: Option<&str>,
        status: Option<WorkflowStatus>,
    ) -> Vec<ExecutionSummary> {
        self.scheduler.list(workflow_id, status)
    }

    /// Awaits the current runner task of an execution.
    pub async fn join(&self, execution_id: &str) -> bool {
        self.scheduler.join(execution_id).await
    }

    /// Cancels every active execution and awaits all runner tasks.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}
