use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};

use streamflow::utils::LoggingConfig;
use streamflow::{
    load_workflow_dir, load_workflow_file, DryRunExecutor, WorkflowEngine,
};

#[derive(Parser)]
#[command(name = "streamflow", version, about = "Streaming automation workflow engine", author)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and validate one workflow definition document.
    Validate { file: PathBuf },
    /// Load a directory of workflow documents and list what registered.
    List {
        #[arg(long, default_value = "workflows")]
        dir: PathBuf,
    },
    /// Run one workflow against the dry-run action executor.
    Run {
        file: PathBuf,
        /// Initial variables as a JSON object.
        #[arg(long)]
        variables: Option<String>,
        #[arg(long, default_value_t = streamflow::engine::DEFAULT_MAX_STEPS)]
        max_steps: u32,
    },
    /// Raise a named event against a directory of workflows (dry-run).
    Trigger {
        event: String,
        #[arg(long, default_value = "workflows")]
        dir: PathBuf,
        /// Event payload as a JSON object.
        #[arg(long)]
        payload: Option<String>,
    },
}

fn parse_object(text: Option<String>, what: &str) -> anyhow::Result<Map<String, Value>> {
    match text {
        None => Ok(Map::new()),
        Some(text) => {
            let value: Value =
                serde_json::from_str(&text).with_context(|| format!("invalid {what} JSON"))?;
            match value {
                Value::Object(map) => Ok(map),
                _ => bail!("{what} must be a JSON object"),
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    LoggingConfig::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Validate { file } => {
            let engine = WorkflowEngine::new(Arc::new(DryRunExecutor));
            let workflow_id = load_workflow_file(&engine, &file)?;
            println!("workflow `{workflow_id}` is valid");
        }
        Command::List { dir } => {
            let engine = WorkflowEngine::new(Arc::new(DryRunExecutor));
            load_workflow_dir(&engine, &dir)?;
            for workflow in engine.list_workflows() {
                println!(
                    "{}\t{}\tv{}\tstates={}\ttriggers={}",
                    workflow.id,
                    workflow.name,
                    workflow.version,
                    workflow.states.len(),
                    workflow.triggers.join(",")
                );
            }
        }
        Command::Run {
            file,
            variables,
            max_steps,
        } => {
            let variables = parse_object(variables, "variables")?;
            let engine = WorkflowEngine::with_max_steps(Arc::new(DryRunExecutor), max_steps);
            let workflow_id = load_workflow_file(&engine, &file)?;
            let execution_id = engine.start(&workflow_id, variables, None).await?;
            engine.join(&execution_id).await;
            let context = engine
                .status(&execution_id)
                .context("execution vanished from the active table")?;
            println!("{}", serde_json::to_string_pretty(&context)?);
        }
        Command::Trigger {
            event,
            dir,
            payload,
        } => {
            let payload = parse_object(payload, "payload")?;
            let engine = WorkflowEngine::new(Arc::new(DryRunExecutor));
            load_workflow_dir(&engine, &dir)?;
            let started = engine.trigger(&event, payload).await;
            if started.is_empty() {
                println!("no workflows subscribed to `{event}`");
            }
            for execution_id in started {
                engine.join(&execution_id).await;
                if let Some(context) = engine.status(&execution_id) {
                    println!(
                        "{}\t{}\t{}",
                        context.execution_id,
                        context.status,
                        context.state_history.join(" -> ")
                    );
                }
            }
        }
    }
    Ok(())
}
