use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing::{info, warn};

use crate::engine::WorkflowEngine;
use crate::error::{Result, WorkflowError};
use crate::workflow::WorkflowDefinition;

/// Loads one workflow definition document and registers it, returning the
/// workflow id.
pub fn load_workflow_file(engine: &WorkflowEngine, path: &Path) -> Result<String> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read workflow file {}", path.display()))?;
    let definition: WorkflowDefinition = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse workflow file {}", path.display()))?;
    let workflow_id = definition.id.clone();
    engine.register(definition)?;
    Ok(workflow_id)
}

/// Scans a directory for `.json` workflow documents and registers every one
/// that parses and validates. A document that fails is skipped with a
/// warning; it never aborts the batch. Returns the registered ids.
pub fn load_workflow_dir(engine: &WorkflowEngine, dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read workflow directory {}", dir.display()))?;

    let mut loaded = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to scan {}", dir.display()))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        match load_workflow_file(engine, &path) {
            Ok(workflow_id) => loaded.push(workflow_id),
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping workflow document");
            }
        }
    }

    info!(count = loaded.len(), dir = %dir.display(), "loaded workflows");
    Ok(loaded)
}

/// Writes a registered workflow definition back out as a pretty-printed
/// document, so an edited or programmatically built workflow can be kept on
/// disk in the same form the loader reads.
pub fn save_workflow_file(engine: &WorkflowEngine, workflow_id: &str, path: &Path) -> Result<()> {
    let definition = engine
        .get(workflow_id)
        .ok_or_else(|| WorkflowError::WorkflowNotRegistered(workflow_id.to_string()))?;
    let text = serde_json::to_string_pretty(&*definition)
        .with_context(|| format!("failed to serialize workflow `{workflow_id}`"))?;
    fs::write(path, text)
        .with_context(|| format!("failed to write workflow file {}", path.display()))?;
    info!(workflow = %workflow_id, path = %path.display(), "saved workflow");
    Ok(())
}
