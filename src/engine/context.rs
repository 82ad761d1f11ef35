use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle of one execution. NotStarted and the three terminal statuses
/// have no further transitions; Running and Paused flip between each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    NotStarted,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "not_started" => Ok(Self::NotStarted),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown workflow status `{other}`")),
        }
    }
}

/// Mutable state of one execution. Owned by its runner task while running;
/// the control surface reads and flips its status through the scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowContext {
    pub execution_id: String,
    pub workflow_id: String,
    pub trigger: Option<String>,
    pub status: WorkflowStatus,
    pub current_state: Option<String>,
    pub state_history: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub variables: Map<String, Value>,
    pub results: Map<String, Value>,
    pub error: Option<String>,
}

impl WorkflowContext {
    pub fn new(
        workflow_id: String,
        execution_id: String,
        trigger: Option<String>,
        variables: Map<String, Value>,
    ) -> Self {
        Self {
            execution_id,
            workflow_id,
            trigger,
            status: WorkflowStatus::NotStarted,
            current_state: None,
            state_history: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
            variables,
            results: Map::new(),
            error: None,
        }
    }
}

/// Condensed listing row for `list_executions`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSummary {
    pub execution_id: String,
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub current_state: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub state_count: usize,
}

impl From<&WorkflowContext> for ExecutionSummary {
    fn from(context: &WorkflowContext) -> Self {
        Self {
            execution_id: context.execution_id.clone(),
            workflow_id: context.workflow_id.clone(),
            status: context.status,
            current_state: context.current_state.clone(),
            start_time: context.start_time,
            end_time: context.end_time,
            state_count: context.state_history.len(),
        }
    }
}
