use std::time::Duration;

use anyhow::anyhow;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::engine::WorkflowContext;

/// Reserved parameter keys that `set_variables` never writes into the
/// execution variables.
const RESERVED_KEYS: &[&str] = &["service", "method"];

/// Closed set of internal primitives. Unknown methods are rejected at
/// registration time, so execution only ever sees these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalOp {
    Wait,
    SetVariables,
    Conditional,
    Log,
    MergeVariables,
}

impl InternalOp {
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            "wait" => Some(Self::Wait),
            "set_variables" => Some(Self::SetVariables),
            "conditional" => Some(Self::Conditional),
            "log" => Some(Self::Log),
            "merge_variables" => Some(Self::MergeVariables),
            _ => None,
        }
    }
}

/// Runs one internal primitive against the execution context.
pub(crate) async fn execute(
    op: InternalOp,
    params: Map<String, Value>,
    context: &RwLock<WorkflowContext>,
) -> anyhow::Result<Value> {
    match op {
        InternalOp::Wait => {
            let seconds = params
                .get("seconds")
                .and_then(Value::as_f64)
                .unwrap_or_default();
            if seconds > 0.0 {
                let duration = Duration::try_from_secs_f64(seconds)
                    .map_err(|_| anyhow!("wait cannot represent {seconds} seconds"))?;
                tokio::time::sleep(duration).await;
            }
            Ok(json!({ "waited": seconds }))
        }
        InternalOp::SetVariables => {
            let mut written = Vec::new();
            {
                let mut ctx = context.write();
                for (key, value) in params {
                    if RESERVED_KEYS.contains(&key.as_str()) {
                        continue;
                    }
                    ctx.variables.insert(key.clone(), value);
                    written.push(Value::String(key));
                }
            }
            Ok(json!({ "variables_set": written }))
        }
        InternalOp::Conditional => {
            let result = params.get("condition").map(is_truthy).unwrap_or(false);
            let event = if result {
                params
                    .get("true_event")
                    .and_then(Value::as_str)
                    .unwrap_or("condition_true")
            } else {
                params
                    .get("false_event")
                    .and_then(Value::as_str)
                    .unwrap_or("condition_false")
            };
            Ok(json!({ "event": event, "condition_result": result }))
        }
        InternalOp::Log => {
            let message = params
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let level = params
                .get("level")
                .and_then(Value::as_str)
                .unwrap_or("info")
                .to_lowercase();
            match level.as_str() {
                "debug" => debug!("{message}"),
                "warning" | "warn" => warn!("{message}"),
                "error" => error!("{message}"),
                _ => info!("{message}"),
            }
            Ok(json!({ "logged": message, "level": level }))
        }
        InternalOp::MergeVariables => {
            let target = params
                .get("target")
                .and_then(Value::as_str)
                .unwrap_or("merged_result")
                .to_string();
            let sources = match params.get("sources") {
                Some(Value::Array(sources)) => sources.clone(),
                Some(other) => {
                    return Err(anyhow!("merge_variables sources must be a list, got {other}"))
                }
                None => Vec::new(),
            };

            let mut merged = Map::new();
            let source_count = sources.len();
            {
                let mut ctx = context.write();
                for source in sources {
                    match source {
                        // A string names a map-valued variable to fold in.
                        Value::String(name) => {
                            if let Some(Value::Object(map)) = ctx.variables.get(&name) {
                                merged.extend(map.clone());
                            }
                        }
                        Value::Object(map) => merged.extend(map),
                        _ => {}
                    }
                }
                ctx.variables.insert(target.clone(), Value::Object(merged));
            }
            Ok(json!({ "merged_to": target, "source_count": source_count }))
        }
    }
}

/// JSON truthiness for `conditional`. Template substitution renders booleans
/// into strings, so the string forms "false" and "0" also count as false.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty() && text != "false" && text != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_of_json_values() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!("false")));
        assert!(!is_truthy(&json!("0")));
        assert!(!is_truthy(&json!([])));
        assert!(!is_truthy(&json!({})));

        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!(-0.5)));
        assert!(is_truthy(&json!("live")));
        assert!(is_truthy(&json!([0])));
        assert!(is_truthy(&json!({"scene": "intro"})));
    }

    #[test]
    fn internal_methods_form_a_closed_set() {
        assert_eq!(InternalOp::from_method("wait"), Some(InternalOp::Wait));
        assert_eq!(
            InternalOp::from_method("merge_variables"),
            Some(InternalOp::MergeVariables)
        );
        assert_eq!(InternalOp::from_method("eval"), None);
    }
}
