//! `${namespace.path}` substitution over action parameters.
//!
//! Substitution is whole-structure: the parameter object is serialized to
//! JSON text, every token is replaced, and the text is re-parsed. Reserved
//! namespaces (`date`, `time`, `timestamp`, `uuid`) compute a fresh value
//! per token; otherwise the path is walked through `variables`, then
//! `results`. An unresolvable token stays verbatim. Substituted text is
//! embedded raw, not escaped, for compatibility with existing workflow
//! documents; text that breaks the surrounding JSON surfaces as an error.

use chrono::Local;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Result, WorkflowError};

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([\w.]+)\}").expect("token pattern compiles"));

/// Resolves every token in `params` against the given variables and results.
pub fn resolve_params(
    params: &Map<String, Value>,
    variables: &Map<String, Value>,
    results: &Map<String, Value>,
) -> Result<Map<String, Value>> {
    if params.is_empty() {
        return Ok(Map::new());
    }

    let text = serde_json::to_string(&Value::Object(params.clone()))
        .map_err(|error| WorkflowError::Template(error.to_string()))?;

    let replaced = TOKEN.replace_all(&text, |caps: &Captures<'_>| {
        resolve_token(&caps[1], variables, results).unwrap_or_else(|| caps[0].to_string())
    });

    let resolved: Value = serde_json::from_str(&replaced).map_err(|error| {
        WorkflowError::Template(format!("substitution broke parameter structure: {error}"))
    })?;
    match resolved {
        Value::Object(map) => Ok(map),
        other => Err(WorkflowError::Template(format!(
            "substitution produced non-object parameters: {other}"
        ))),
    }
}

fn resolve_token(
    path: &str,
    variables: &Map<String, Value>,
    results: &Map<String, Value>,
) -> Option<String> {
    let mut segments = path.split('.');
    let head = segments.next()?;

    match head {
        "date" => return Some(Local::now().format("%Y-%m-%d").to_string()),
        "time" => return Some(Local::now().format("%H:%M:%S").to_string()),
        "timestamp" => return Some(Local::now().to_rfc3339()),
        "uuid" => return Some(Uuid::new_v4().to_string()),
        _ => {}
    }

    let segments: Vec<&str> = segments.collect();
    lookup(variables, head, &segments).or_else(|| lookup(results, head, &segments))
}

fn lookup(source: &Map<String, Value>, head: &str, segments: &[&str]) -> Option<String> {
    let mut value = source.get(head)?;
    for segment in segments {
        value = value.as_object()?.get(*segment)?;
    }
    Some(render(value))
}

/// Scalars embed as their textual form, composites as compact JSON.
fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
