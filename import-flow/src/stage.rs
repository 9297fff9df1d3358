use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{context::Context, error::Result};

/// Result of a stage execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// Response to surface to the caller, if any
    pub response: Option<String>,
    /// What the pipeline should do next
    pub advance: Advance,
    /// Human-readable progress message stored on the session
    pub status_message: Option<String>,
    /// Filled in by the pipeline with the id of the stage that produced this result
    #[serde(default)]
    pub stage_id: String,
}

impl StageResult {
    pub fn new(response: Option<String>, advance: Advance) -> Self {
        Self {
            response,
            advance,
            status_message: None,
            stage_id: String::new(),
        }
    }

    pub fn with_status(
        response: Option<String>,
        advance: Advance,
        status_message: impl Into<String>,
    ) -> Self {
        Self {
            response,
            advance,
            status_message: Some(status_message.into()),
            stage_id: String::new(),
        }
    }
}

/// What happens after a stage completes.
///
/// Pipelines are strictly forward: a stage can move on, keep running, hold
/// for input, or finish. There is no jumping back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Advance {
    /// Move to the next stage and yield to the caller
    Next,
    /// Move to the next stage and execute it immediately
    NextAndRun,
    /// Stay at this stage until the caller resumes the session
    WaitForInput,
    /// Pipeline is complete
    Finish,
}

/// Core trait every pipeline stage implements
#[async_trait]
pub trait Stage: Send + Sync {
    /// Unique identifier for this stage
    fn id(&self) -> &str;

    /// Execute the stage with the given context
    async fn run(&self, context: Context) -> Result<StageResult>;
}
