use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::actions::ActionExecutor;
use crate::error::{Result, WorkflowError};
use crate::workflow::WorkflowRegistry;

use super::context::{ExecutionSummary, WorkflowContext, WorkflowStatus};
use super::runner;

/// The retained runner task, cloneable so any number of joiners can await
/// the same completion.
type RunnerTask = Shared<BoxFuture<'static, ()>>;

/// One row of the active-execution table. The context is shared between the
/// runner task and the control surface; the watch channel carries the
/// best-effort cancellation signal into an in-flight state evaluation.
pub(crate) struct ExecutionEntry {
    pub context: RwLock<WorkflowContext>,
    pub cancel_tx: watch::Sender<bool>,
    pub cancel_rx: watch::Receiver<bool>,
    /// Bumped on every runner spawn so a stale task from a rapid
    /// pause/resume cycle steps aside instead of racing the new one.
    pub epoch: AtomicU64,
    task: Mutex<Option<RunnerTask>>,
}

impl ExecutionEntry {
    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::Acquire) == epoch
    }
}

/// Creates, tracks, and drives per-execution runner tasks. Contexts are
/// retained after completion for status queries; callers own retention.
pub struct ExecutionScheduler {
    registry: Arc<WorkflowRegistry>,
    actions: Arc<dyn ActionExecutor>,
    executions: RwLock<HashMap<String, Arc<ExecutionEntry>>>,
    max_steps: u32,
}

impl ExecutionScheduler {
    pub fn new(
        registry: Arc<WorkflowRegistry>,
        actions: Arc<dyn ActionExecutor>,
        max_steps: u32,
    ) -> Self {
        Self {
            registry,
            actions,
            executions: RwLock::new(HashMap::new()),
            max_steps,
        }
    }

    /// Allocates a context and spawns a runner task for it. Returns the new
    /// execution id immediately; callers never block on completion.
    pub async fn start(
        &self,
        workflow_id: &str,
        variables: Map<String, Value>,
        trigger: Option<String>,
    ) -> Result<String> {
        if self.registry.get(workflow_id).is_none() {
            return Err(WorkflowError::WorkflowNotRegistered(workflow_id.to_string()));
        }

        let execution_id = format!("{workflow_id}-{}", Uuid::new_v4());
        let context = WorkflowContext::new(
            workflow_id.to_string(),
            execution_id.clone(),
            trigger,
            variables,
        );
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let entry = Arc::new(ExecutionEntry {
            context: RwLock::new(context),
            cancel_tx,
            cancel_rx,
            epoch: AtomicU64::new(0),
            task: Mutex::new(None),
        });

        self.executions
            .write()
            .insert(execution_id.clone(), Arc::clone(&entry));
        info!(execution = %execution_id, workflow = %workflow_id, "created workflow execution");

        self.spawn_runner(&entry);
        Ok(execution_id)
    }

    fn spawn_runner(&self, entry: &Arc<ExecutionEntry>) {
        let epoch = entry.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let registry = Arc::clone(&self.registry);
        let actions = Arc::clone(&self.actions);
        let task_entry = Arc::clone(entry);
        let max_steps = self.max_steps;
        let execution_id = entry.context.read().execution_id.clone();
        let handle = tokio::spawn(async move {
            runner::run(registry, task_entry, actions, max_steps, epoch).await;
        });
        let task = handle
            .map(move |result| {
                if let Err(error) = result {
                    warn!(execution = %execution_id, %error, "runner task aborted");
                }
            })
            .boxed()
            .shared();
        *entry.task.lock() = Some(task);
    }

    fn entry(&self, execution_id: &str) -> Option<Arc<ExecutionEntry>> {
        self.executions.read().get(execution_id).cloned()
    }

    /// Cancels a Running or Paused execution. Best-effort: the in-flight
    /// action and any pending timeout timer are asked to stop, but an
    /// external side effect already underway is not rolled back.
    pub fn cancel(&self, execution_id: &str) -> bool {
        let Some(entry) = self.entry(execution_id) else {
            return false;
        };
        {
            let mut ctx = entry.context.write();
            if !matches!(ctx.status, WorkflowStatus::Running | WorkflowStatus::Paused) {
                return false;
            }
            ctx.status = WorkflowStatus::Cancelled;
            ctx.end_time = Some(Utc::now());
        }
        let _ = entry.cancel_tx.send(true);
        info!(execution = %execution_id, "workflow execution cancelled");
        true
    }

    /// Pauses a Running execution. The runner finishes its current state
    /// evaluation and exits; no new state begins while paused.
    pub fn pause(&self, execution_id: &str) -> bool {
        let Some(entry) = self.entry(execution_id) else {
            return false;
        };
        {
            let mut ctx = entry.context.write();
            if ctx.status != WorkflowStatus::Running {
                return false;
            }
            ctx.status = WorkflowStatus::Paused;
        }
        info!(execution = %execution_id, "workflow execution paused");
        true
    }

    /// Resumes a Paused execution by spawning a fresh runner task that
    /// continues from `current_state`.
    pub fn resume(&self, execution_id: &str) -> bool {
        let Some(entry) = self.entry(execution_id) else {
            return false;
        };
        {
            let mut ctx = entry.context.write();
            if ctx.status != WorkflowStatus::Paused {
                return false;
            }
            ctx.status = WorkflowStatus::Running;
        }
        self.spawn_runner(&entry);
        info!(execution = %execution_id, "workflow execution resumed");
        true
    }

    pub fn status(&self, execution_id: &str) -> Option<WorkflowContext> {
        self.entry(execution_id)
            .map(|entry| entry.context.read().clone())
    }

    pub fn list(
        &self,
        workflow_id: Option<&str>,
        status: Option<WorkflowStatus>,
    ) -> Vec<ExecutionSummary> {
        self.executions
            .read()
            .values()
            .filter_map(|entry| {
                let ctx = entry.context.read();
                if let Some(workflow_id) = workflow_id {
                    if ctx.workflow_id != workflow_id {
                        return None;
                    }
                }
                if let Some(status) = status {
                    if ctx.status != status {
                        return None;
                    }
                }
                Some(ExecutionSummary::from(&*ctx))
            })
            .collect()
    }

    /// Awaits the current runner task of an execution, if any. Returns false
    /// for an unknown id. Any number of callers may join the same execution;
    /// each one waits for the task to finish. Note a paused execution's task
    /// exits at the pause boundary, so joining it does not imply a terminal
    /// status.
    pub async fn join(&self, execution_id: &str) -> bool {
        let Some(entry) = self.entry(execution_id) else {
            return false;
        };
        let task = entry.task.lock().clone();
        if let Some(task) = task {
            task.await;
        }
        true
    }

    /// Signals cancellation to every non-terminal execution and awaits all
    /// retained runner handles.
    pub async fn shutdown(&self) {
        let entries: Vec<(String, Arc<ExecutionEntry>)> = self
            .executions
            .read()
            .iter()
            .map(|(id, entry)| (id.clone(), Arc::clone(entry)))
            .collect();

        for (execution_id, entry) in &entries {
            let cancelled = {
                let mut ctx = entry.context.write();
                // NotStarted covers an execution whose runner has not been
                // polled yet; the runner sees the terminal status and exits.
                if matches!(
                    ctx.status,
                    WorkflowStatus::NotStarted
                        | WorkflowStatus::Running
                        | WorkflowStatus::Paused
                ) {
                    ctx.status = WorkflowStatus::Cancelled;
                    ctx.end_time = Some(Utc::now());
                    true
                } else {
                    false
                }
            };
            if cancelled {
                let _ = entry.cancel_tx.send(true);
                info!(execution = %execution_id, "cancelled at shutdown");
            }
        }

        for (_, entry) in entries {
            let task = entry.task.lock().clone();
            if let Some(task) = task {
                task.await;
            }
        }
    }
}
