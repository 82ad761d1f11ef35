use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time;
use tracing::warn;

use crate::actions::{internal, ActionExecutor};
use crate::template;
use crate::workflow::{ActionKind, WorkflowState};

use super::context::WorkflowStatus;
use super::scheduler::ExecutionEntry;

/// Classification of one state evaluation.
#[derive(Debug)]
pub(crate) enum StepOutcome {
    Success,
    Conditional(String),
    Error(String),
    Timeout,
    Cancelled,
}

/// Evaluates one state: runs its action with retry, racing the timeout
/// deadline (when set) and the cancellation signal. Exactly one branch wins;
/// the losing futures are dropped, which is the best-effort cancellation of
/// an in-flight action or a pending timer.
pub(crate) async fn evaluate(
    state: &WorkflowState,
    entry: &Arc<ExecutionEntry>,
    actions: &Arc<dyn ActionExecutor>,
) -> StepOutcome {
    let mut cancelled = entry.cancel_rx.clone();
    let attempts = run_with_retry(state, entry, actions);
    tokio::pin!(attempts);

    if let Some(seconds) = state.timeout_seconds {
        tokio::select! {
            outcome = &mut attempts => return outcome,
            _ = time::sleep(Duration::from_secs_f64(seconds)) => {
                // The deadline only counts against a running execution. A
                // pause drops the pending timer; the in-flight action is
                // left to finish.
                if entry.context.read().status == WorkflowStatus::Running {
                    warn!(state = %state.name, seconds, "state timed out");
                    return StepOutcome::Timeout;
                }
            }
            _ = cancelled.changed() => return StepOutcome::Cancelled,
        }
    }

    tokio::select! {
        outcome = &mut attempts => outcome,
        _ = cancelled.changed() => StepOutcome::Cancelled,
    }
}

/// Runs the state's action until it succeeds or the retry budget is spent.
/// The attempt counter is local to this one invocation; it never carries
/// across states or re-executions.
async fn run_with_retry(
    state: &WorkflowState,
    entry: &Arc<ExecutionEntry>,
    actions: &Arc<dyn ActionExecutor>,
) -> StepOutcome {
    let kind = match state.action.kind() {
        Ok(kind) => kind,
        Err(error) => return StepOutcome::Error(error.to_string()),
    };

    let mut attempts = 0u32;
    loop {
        match run_once(kind, state, entry, actions).await {
            Ok(value) => {
                {
                    let mut ctx = entry.context.write();
                    ctx.results.insert(state.name.clone(), value.clone());
                }
                if let Some(event) = value.get("event").and_then(Value::as_str) {
                    return StepOutcome::Conditional(event.to_string());
                }
                return StepOutcome::Success;
            }
            Err(message) => {
                attempts += 1;
                if attempts <= state.max_retries {
                    warn!(
                        state = %state.name,
                        attempt = attempts,
                        max_retries = state.max_retries,
                        error = %message,
                        "retrying action"
                    );
                    time::sleep(Duration::from_secs_f64(state.retry_delay_seconds)).await;
                } else {
                    return StepOutcome::Error(format!(
                        "action failed after {attempts} attempts: {message}"
                    ));
                }
            }
        }
    }
}

/// One attempt: resolve parameters against the live context, dispatch, and
/// fold error-shaped results into the retry path.
async fn run_once(
    kind: ActionKind,
    state: &WorkflowState,
    entry: &Arc<ExecutionEntry>,
    actions: &Arc<dyn ActionExecutor>,
) -> Result<Value, String> {
    let (variables, results) = {
        let ctx = entry.context.read();
        (ctx.variables.clone(), ctx.results.clone())
    };
    let params = template::resolve_params(&state.action.params, &variables, &results)
        .map_err(|error| error.to_string())?;

    let result = match kind {
        ActionKind::Internal(op) => internal::execute(op, params, &entry.context).await,
        ActionKind::External => {
            actions
                .execute(&state.action.service, &state.action.method, params)
                .await
        }
    };

    match result {
        Ok(value) => match value.get("error").filter(|error| !error.is_null()) {
            Some(error) => Err(match error.as_str() {
                Some(text) => text.to_string(),
                None => error.to_string(),
            }),
            None => Ok(value),
        },
        Err(error) => Err(error.to_string()),
    }
}
