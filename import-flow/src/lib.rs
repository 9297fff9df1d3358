pub mod context;
pub mod error;
pub mod pipeline;
pub mod runner;
pub mod stage;
pub mod storage;

// Re-export commonly used types
pub use context::Context;
pub use error::{FlowError, Result};
pub use pipeline::{ExecutionResult, ExecutionStatus, Pipeline, PipelineBuilder};
pub use runner::FlowRunner;
pub use stage::{Advance, Stage, StageResult};
pub use storage::{InMemorySessionStorage, PostgresSessionStorage, Session, SessionStorage};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct EchoStage {
        id: String,
        advance: Advance,
    }

    #[async_trait]
    impl Stage for EchoStage {
        fn id(&self) -> &str {
            &self.id
        }

        async fn run(&self, context: Context) -> Result<StageResult> {
            let input: String = context.get("input").await.unwrap_or_default();
            context.set(format!("seen_by_{}", self.id), input).await;

            Ok(StageResult::new(
                Some(format!("{} done", self.id)),
                self.advance.clone(),
            ))
        }
    }

    fn two_stage_pipeline() -> Pipeline {
        PipelineBuilder::new("test_pipeline")
            .add_stage(Arc::new(EchoStage {
                id: "first".to_string(),
                advance: Advance::NextAndRun,
            }))
            .add_stage(Arc::new(EchoStage {
                id: "second".to_string(),
                advance: Advance::Finish,
            }))
            .build()
    }

    #[tokio::test]
    async fn test_pipeline_runs_forward_to_completion() {
        let pipeline = two_stage_pipeline();
        let mut session = Session::new_from_stage(
            "s1".to_string(),
            "test_pipeline",
            &pipeline.start_stage_id().unwrap(),
        );
        session.context.set("input", "hello").await;

        let result = pipeline.execute_session(&mut session).await.unwrap();

        assert!(matches!(result.status, ExecutionStatus::Completed));
        assert_eq!(session.current_stage_id, "second");

        let first: String = session.context.get("seen_by_first").await.unwrap();
        let second: String = session.context.get("seen_by_second").await.unwrap();
        assert_eq!(first, "hello");
        assert_eq!(second, "hello");
    }

    #[tokio::test]
    async fn test_wait_for_input_holds_position() {
        let pipeline = PipelineBuilder::new("hold")
            .add_stage(Arc::new(EchoStage {
                id: "gate".to_string(),
                advance: Advance::WaitForInput,
            }))
            .add_stage(Arc::new(EchoStage {
                id: "after".to_string(),
                advance: Advance::Finish,
            }))
            .build();

        let mut session = Session::new_from_stage("s2".to_string(), "hold", "gate");
        let result = pipeline.execute_session(&mut session).await.unwrap();

        assert!(matches!(result.status, ExecutionStatus::WaitingForInput));
        assert_eq!(session.current_stage_id, "gate");
    }

    #[tokio::test]
    async fn test_runner_persists_session() {
        let pipeline = Arc::new(two_stage_pipeline());
        let storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());

        let session = Session::new_from_stage("s3".to_string(), "test_pipeline", "first");
        session.context.set("input", "persisted").await;
        storage.save(session).await.unwrap();

        let runner = FlowRunner::new(pipeline, storage.clone());
        let result = runner.run("s3").await.unwrap();
        assert!(matches!(result.status, ExecutionStatus::Completed));

        let reloaded = storage.get("s3").await.unwrap().unwrap();
        assert_eq!(reloaded.current_stage_id, "second");
    }

    #[tokio::test]
    async fn test_runner_missing_session() {
        let pipeline = Arc::new(two_stage_pipeline());
        let storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());
        let runner = FlowRunner::new(pipeline, storage);

        let err = runner.run("nope").await.unwrap_err();
        assert!(matches!(err, FlowError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_context_snapshot_roundtrip() {
        let context = Context::new();
        context.set("a", 1).await;
        context.set("b", "two").await;

        let restored = Context::restore(context.snapshot());
        let a: i64 = restored.get("a").await.unwrap();
        let b: String = restored.get("b").await.unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, "two");
    }
}
