use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::actions::{InternalOp, INTERNAL_SERVICE};
use crate::error::{Result, WorkflowError};

/// One unit of work a state performs, as written in a definition document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    pub service: String,
    pub method: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// Closed classification of an action: one variant per internal primitive
/// plus a single external variant dispatched through [`ActionExecutor`].
///
/// [`ActionExecutor`]: crate::actions::ActionExecutor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Internal(InternalOp),
    External,
}

impl ActionSpec {
    pub fn kind(&self) -> Result<ActionKind> {
        if self.service == INTERNAL_SERVICE {
            InternalOp::from_method(&self.method)
                .map(ActionKind::Internal)
                .ok_or_else(|| {
                    WorkflowError::InvalidDefinition(format!(
                        "unknown internal method `{}`",
                        self.method
                    ))
                })
        } else {
            Ok(ActionKind::External)
        }
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_retry_delay() -> f64 {
    1.0
}

/// A named step in a workflow: one action plus a map of outcome-event to
/// next-state name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub action: ActionSpec,
    #[serde(default)]
    pub transitions: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_timeout: Option<String>,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: f64,
}

impl WorkflowState {
    /// Timeout target, treating an empty string the same as absent.
    pub fn timeout_target(&self) -> Option<&str> {
        self.on_timeout.as_deref().filter(|target| !target.is_empty())
    }
}

/// Static, validated description of a state machine. Immutable once
/// registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub initial_state: String,
    pub states: Vec<WorkflowState>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub triggers: Vec<String>,
}

impl WorkflowDefinition {
    pub fn state(&self, name: &str) -> Option<&WorkflowState> {
        self.states.iter().find(|state| state.name == name)
    }

    /// Checks the structural invariants a definition must hold before it may
    /// be registered. Registration is atomic: a definition failing any check
    /// is never stored.
    pub fn validate(&self) -> Result<()> {
        if self.states.is_empty() {
            return Err(WorkflowError::InvalidDefinition(format!(
                "workflow `{}` must have at least one state",
                self.id
            )));
        }

        let mut names: HashSet<&str> = HashSet::new();
        for state in &self.states {
            if !names.insert(state.name.as_str()) {
                return Err(WorkflowError::InvalidDefinition(format!(
                    "workflow `{}` declares state `{}` more than once",
                    self.id, state.name
                )));
            }
        }

        if !names.contains(self.initial_state.as_str()) {
            return Err(WorkflowError::InvalidDefinition(format!(
                "initial state `{}` does not exist in workflow `{}`",
                self.initial_state, self.id
            )));
        }

        for state in &self.states {
            for (event, target) in &state.transitions {
                if !target.is_empty() && !names.contains(target.as_str()) {
                    return Err(WorkflowError::InvalidDefinition(format!(
                        "state `{}` transition `{event}` targets non-existent state `{target}`",
                        state.name
                    )));
                }
            }
            if let Some(target) = state.timeout_target() {
                if !names.contains(target) {
                    return Err(WorkflowError::InvalidDefinition(format!(
                        "state `{}` timeout targets non-existent state `{target}`",
                        state.name
                    )));
                }
            }
            if let Some(seconds) = state.timeout_seconds {
                if Duration::try_from_secs_f64(seconds).is_err() {
                    return Err(WorkflowError::InvalidDefinition(format!(
                        "state `{}` has unusable timeout_seconds {seconds}",
                        state.name
                    )));
                }
            }
            if Duration::try_from_secs_f64(state.retry_delay_seconds).is_err() {
                return Err(WorkflowError::InvalidDefinition(format!(
                    "state `{}` has unusable retry_delay_seconds {}",
                    state.name, state.retry_delay_seconds
                )));
            }
            state.action.kind()?;
        }

        Ok(())
    }
}
