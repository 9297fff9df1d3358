use std::sync::Arc;

use crate::{
    context::Context,
    error::{FlowError, Result},
    stage::{Advance, Stage, StageResult},
    storage::Session,
};

/// An ordered, forward-only sequence of stages.
pub struct Pipeline {
    pub id: String,
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stages: Vec::new(),
        }
    }

    /// Append a stage. Order of insertion is execution order.
    pub fn add_stage(&mut self, stage: Arc<dyn Stage>) -> &mut Self {
        self.stages.push(stage);
        self
    }

    /// Execute the session's current stage and apply its `Advance`.
    ///
    /// At most one stage runs per call unless the stage asks for
    /// `NextAndRun`, in which case execution continues forward on the same
    /// shared context until a stage yields.
    pub async fn execute_session(&self, session: &mut Session) -> Result<ExecutionResult> {
        let result = self
            .execute_single_stage(&session.current_stage_id, session.context.clone())
            .await?;

        session.status_message = result.status_message.clone();

        match &result.advance {
            Advance::Next => {
                if let Some(next_stage_id) = self.next_stage_id(&result.stage_id) {
                    session.current_stage_id = next_stage_id;
                } else {
                    session.current_stage_id = result.stage_id.clone();
                }
                Ok(ExecutionResult {
                    response: result.response,
                    status: ExecutionStatus::WaitingForInput,
                })
            }
            Advance::NextAndRun => {
                if let Some(next_stage_id) = self.next_stage_id(&result.stage_id) {
                    session.current_stage_id = next_stage_id;
                    // Recurse on the same session so context updates carry forward
                    return Box::pin(self.execute_session(session)).await;
                }
                session.current_stage_id = result.stage_id.clone();
                Ok(ExecutionResult {
                    response: result.response,
                    status: ExecutionStatus::WaitingForInput,
                })
            }
            Advance::WaitForInput => {
                session.current_stage_id = result.stage_id.clone();
                Ok(ExecutionResult {
                    response: result.response,
                    status: ExecutionStatus::WaitingForInput,
                })
            }
            Advance::Finish => {
                session.current_stage_id = result.stage_id.clone();
                Ok(ExecutionResult {
                    response: result.response,
                    status: ExecutionStatus::Completed,
                })
            }
        }
    }

    async fn execute_single_stage(&self, stage_id: &str, context: Context) -> Result<StageResult> {
        let stage = self
            .get_stage(stage_id)
            .ok_or_else(|| FlowError::StageNotFound(stage_id.to_string()))?;

        let mut result = stage.run(context).await?;
        result.stage_id = stage_id.to_string();
        Ok(result)
    }

    /// Id of the stage that follows `current_stage_id`, if any.
    pub fn next_stage_id(&self, current_stage_id: &str) -> Option<String> {
        let position = self
            .stages
            .iter()
            .position(|s| s.id() == current_stage_id)?;
        self.stages
            .get(position + 1)
            .map(|s| s.id().to_string())
    }

    pub fn get_stage(&self, stage_id: &str) -> Option<Arc<dyn Stage>> {
        self.stages.iter().find(|s| s.id() == stage_id).cloned()
    }

    /// Id of the first stage, if the pipeline is non-empty.
    pub fn start_stage_id(&self) -> Option<String> {
        self.stages.first().map(|s| s.id().to_string())
    }
}

/// Builder for assembling pipelines
pub struct PipelineBuilder {
    pipeline: Pipeline,
}

impl PipelineBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            pipeline: Pipeline::new(id),
        }
    }

    pub fn add_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.pipeline.add_stage(stage);
        self
    }

    pub fn build(self) -> Pipeline {
        self.pipeline
    }
}

/// Outcome of one `execute_session` call
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub response: Option<String>,
    pub status: ExecutionStatus,
}

#[derive(Debug, Clone)]
pub enum ExecutionStatus {
    /// Waiting for the caller to resume the session
    WaitingForInput,
    /// Pipeline completed successfully
    Completed,
    /// Error occurred during execution
    Error(String),
}
