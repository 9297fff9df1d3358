//! FlowRunner – convenience wrapper that loads a session, executes exactly
//! **one** pipeline step, and persists the updated session back to storage.
//!
//! Interactive services usually want to run one step per HTTP request, send
//! the result back to the client, and have the session saved for the next
//! roundtrip. `FlowRunner` makes that a one-liner; callers that need custom
//! persistence can still drive `Pipeline::execute_session` directly.

use std::sync::Arc;

use crate::{
    error::{FlowError, Result},
    pipeline::{ExecutionResult, Pipeline},
    storage::SessionStorage,
};

/// High-level helper that orchestrates the common _load → execute → save_ pattern.
#[derive(Clone)]
pub struct FlowRunner {
    pipeline: Arc<Pipeline>,
    storage: Arc<dyn SessionStorage>,
}

impl FlowRunner {
    pub fn new(pipeline: Arc<Pipeline>, storage: Arc<dyn SessionStorage>) -> Self {
        Self { pipeline, storage }
    }

    /// Execute **exactly one** step for the given `session_id` and persist
    /// the updated session.
    pub async fn run(&self, session_id: &str) -> Result<ExecutionResult> {
        let mut session = self
            .storage
            .get(session_id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))?;

        let result = self.pipeline.execute_session(&mut session).await?;

        self.storage.save(session).await?;

        Ok(result)
    }
}
