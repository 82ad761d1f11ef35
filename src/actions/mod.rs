use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::info;

pub mod internal;

pub use internal::InternalOp;

/// Service name that routes an action to the internal primitives instead of
/// the external action boundary.
pub const INTERNAL_SERVICE: &str = "internal";

/// External action boundary.
///
/// The engine treats every external action as an opaque request/response
/// exchange: a result carrying an `error` key is a failed action, anything
/// else is success. Implementations translate `(service, method, params)`
/// into calls against a streaming-control endpoint or a platform API.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(
        &self,
        service: &str,
        method: &str,
        params: Map<String, Value>,
    ) -> anyhow::Result<Value>;
}

/// Executor that performs no side effects, only logs the call and echoes it
/// back. Used by the CLI to exercise workflows without live integrations.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunExecutor;

#[async_trait]
impl ActionExecutor for DryRunExecutor {
    async fn execute(
        &self,
        service: &str,
        method: &str,
        params: Map<String, Value>,
    ) -> anyhow::Result<Value> {
        info!(service, method, "dry-run action");
        Ok(json!({
            "service": service,
            "method": method,
            "params": Value::Object(params),
            "dry_run": true,
        }))
    }
}
