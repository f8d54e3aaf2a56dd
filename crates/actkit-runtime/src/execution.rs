use actkit_core::{Action, Context, Output};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Instant;

use crate::error::RuntimeResult;

/// Options for action execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Context to run under; the runtime's default context when absent
    pub context: Option<Context>,
    /// Dry run mode - validate input and check security, but don't invoke the handler
    pub dry_run: bool,
}

impl ExecutionOptions {
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

/// Result of action execution
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Handler output; `None` for dry runs
    pub output: Option<Output>,
    pub metadata: ExecutionMetadata,
}

impl ExecutionResult {
    /// The output as a plain value, if it is one
    pub fn value(&self) -> Option<&JsonValue> {
        self.output.as_ref().and_then(Output::as_value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    /// Id of the action that ran
    pub action_id: String,
    pub execution_id: String,
    /// Execution duration in milliseconds
    pub duration_ms: u64,
    pub dry_run: bool,
    /// Timestamp of execution start
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Run an already-resolved action and time it.
pub async fn execute_action(
    action: &Action,
    input: Option<JsonValue>,
    context: Context,
    dry_run: bool,
) -> RuntimeResult<ExecutionResult> {
    let start_time = Instant::now();
    let timestamp = chrono::Utc::now();
    let execution_id = context.execution_id.clone();

    tracing::info!(
        action_id = %action.id(),
        execution_id = %execution_id,
        dry_run,
        "Starting action execution"
    );

    let result = if dry_run {
        action.preflight(input, Some(&context)).map(|_| None)
    } else {
        action.run(input, Some(context)).await.map(Some)
    };

    let metadata = ExecutionMetadata {
        action_id: action.id().to_string(),
        execution_id,
        duration_ms: start_time.elapsed().as_millis() as u64,
        dry_run,
        timestamp,
    };

    match result {
        Ok(output) => {
            tracing::info!(
                action_id = %metadata.action_id,
                duration_ms = metadata.duration_ms,
                "Action execution completed successfully"
            );
            Ok(ExecutionResult { output, metadata })
        }
        Err(e) => {
            tracing::error!(
                action_id = %metadata.action_id,
                duration_ms = metadata.duration_ms,
                error = %e,
                "Action execution failed"
            );
            Err(e.into())
        }
    }
}
