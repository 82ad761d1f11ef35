use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::actions::ActionExecutor;
use crate::error::WorkflowError;
use crate::workflow::{WorkflowRegistry, WorkflowState};

use super::context::WorkflowStatus;
use super::executor::{self, StepOutcome};
use super::scheduler::ExecutionEntry;

/// Drives one execution to a terminal status (or a pause boundary).
///
/// The definition is looked up once when the task starts; an execution whose
/// definition is unregistered mid-flight keeps running against that snapshot.
pub(crate) async fn run(
    registry: Arc<WorkflowRegistry>,
    entry: Arc<ExecutionEntry>,
    actions: Arc<dyn ActionExecutor>,
    max_steps: u32,
    epoch: u64,
) {
    let (execution_id, workflow_id) = {
        let ctx = entry.context.read();
        (ctx.execution_id.clone(), ctx.workflow_id.clone())
    };

    let Some(definition) = registry.get(&workflow_id) else {
        mark_failed(
            &entry,
            format!("workflow `{workflow_id}` is no longer registered"),
        );
        return;
    };

    {
        let mut ctx = entry.context.write();
        // A cancellation can land between spawn and first poll.
        if ctx.status.is_terminal() {
            return;
        }
        if ctx.status == WorkflowStatus::NotStarted {
            ctx.status = WorkflowStatus::Running;
        }
        if ctx.current_state.is_none() {
            ctx.current_state = Some(definition.initial_state.clone());
            ctx.state_history.push(definition.initial_state.clone());
            info!(
                execution = %execution_id,
                state = %definition.initial_state,
                "workflow execution started"
            );
        }
    }

    let mut steps = 0u32;
    loop {
        let current = {
            let ctx = entry.context.read();
            if ctx.status != WorkflowStatus::Running || !entry.is_current(epoch) {
                break;
            }
            match &ctx.current_state {
                Some(state) => state.clone(),
                None => break,
            }
        };

        // State lookup failure is execution-fatal, never retried.
        let Some(state) = definition.state(&current) else {
            mark_failed(
                &entry,
                WorkflowError::StateNotFound {
                    workflow: definition.id.clone(),
                    state: current,
                }
                .to_string(),
            );
            break;
        };

        debug!(execution = %execution_id, state = %current, "executing state");
        let outcome = executor::evaluate(state, &entry, &actions).await;

        if !entry.is_current(epoch) {
            break;
        }

        let next = match apply_ladder(&entry, state, outcome) {
            LadderResult::Next(next) => next,
            LadderResult::Stop => break,
        };

        {
            let mut ctx = entry.context.write();
            ctx.current_state = Some(next.clone());
            ctx.state_history.push(next);
        }

        steps += 1;
        if steps >= max_steps {
            let still_running = entry.context.read().status == WorkflowStatus::Running;
            if still_running {
                mark_failed(&entry, WorkflowError::StepLimitExceeded(max_steps).to_string());
            }
            break;
        }
    }

    let status = entry.context.read().status;
    info!(execution = %execution_id, %status, "workflow execution ended");
}

enum LadderResult {
    Next(String),
    Stop,
}

/// The transition ladder: fixed precedence from outcome classification to
/// the next state. The absence of an applicable transition after SUCCESS or
/// CONDITIONAL is a normal end, not a failure.
fn apply_ladder(
    entry: &Arc<ExecutionEntry>,
    state: &WorkflowState,
    outcome: StepOutcome,
) -> LadderResult {
    match outcome {
        StepOutcome::Cancelled => LadderResult::Stop,
        StepOutcome::Error(message) => match state.transitions.get("error") {
            Some(target) => LadderResult::Next(target.clone()),
            None => {
                mark_failed(entry, message);
                LadderResult::Stop
            }
        },
        StepOutcome::Timeout => match state.timeout_target() {
            Some(target) => {
                warn!(state = %state.name, target, "state timed out, taking timeout transition");
                LadderResult::Next(target.to_string())
            }
            None => {
                mark_failed(entry, format!("state `{}` timed out", state.name));
                LadderResult::Stop
            }
        },
        StepOutcome::Conditional(event) => {
            let target = state
                .transitions
                .get(&event)
                .or_else(|| state.transitions.get("default"))
                .or_else(|| state.transitions.get("success"));
            match target {
                Some(target) => LadderResult::Next(target.clone()),
                None => {
                    mark_completed(entry);
                    LadderResult::Stop
                }
            }
        }
        StepOutcome::Success => match state.transitions.get("success") {
            Some(target) => LadderResult::Next(target.clone()),
            None => {
                mark_completed(entry);
                LadderResult::Stop
            }
        },
    }
}

/// Terminal bookkeeping. A status that is already terminal is never
/// overwritten, so a cancellation landing mid-step wins.
fn mark_failed(entry: &Arc<ExecutionEntry>, message: String) {
    let mut ctx = entry.context.write();
    if ctx.status.is_terminal() {
        return;
    }
    ctx.status = WorkflowStatus::Failed;
    ctx.error = Some(message.clone());
    ctx.end_time = Some(Utc::now());
    error!(execution = %ctx.execution_id, %message, "workflow execution failed");
}

fn mark_completed(entry: &Arc<ExecutionEntry>) {
    let mut ctx = entry.context.write();
    if ctx.status.is_terminal() {
        return;
    }
    ctx.status = WorkflowStatus::Completed;
    ctx.end_time = Some(Utc::now());
    info!(execution = %ctx.execution_id, "workflow execution completed");
}
