use import_flow::{FlowRunner, Pipeline, PipelineBuilder, Session, SessionStorage};
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::{DocumentOcr, DocumentStore, PolicyExtractor};
use crate::models::{FileStatus, ImportFile, ImportFileUpload, session_keys};
use crate::repo::ImportRepo;
use crate::stages::{CommitStage, IntakeStage, ProcessingStage, ReviewStage, stage_ids};

/// Everything the pipeline stages need, wired once at startup.
pub struct ImportDeps {
    pub repo: Arc<dyn ImportRepo>,
    pub ocr: Arc<dyn DocumentOcr>,
    pub extractor: Arc<dyn PolicyExtractor>,
    pub store: Option<Arc<dyn DocumentStore>>,
}

pub fn build_import_pipeline(deps: &ImportDeps) -> Pipeline {
    PipelineBuilder::new("policy_import")
        .add_stage(Arc::new(IntakeStage))
        .add_stage(Arc::new(ProcessingStage::new(
            deps.ocr.clone(),
            deps.extractor.clone(),
            deps.repo.clone(),
        )))
        .add_stage(Arc::new(ReviewStage))
        .add_stage(Arc::new(CommitStage::new(
            deps.repo.clone(),
            deps.store.clone(),
        )))
        .build()
}

pub async fn create_import_session(tenant_id: Uuid, uploads: Vec<ImportFileUpload>) -> Session {
    let files: Vec<ImportFile> = uploads
        .into_iter()
        .map(|u| ImportFile {
            name: u.name,
            content_base64: u.content_base64,
            status: FileStatus::Pending,
        })
        .collect();

    let session = Session::new_from_stage(
        Uuid::new_v4().to_string(),
        "policy_import",
        stage_ids::INTAKE,
    );
    session.context.set(session_keys::TENANT_ID, tenant_id).await;
    session.context.set(session_keys::FILES, files).await;
    session.context.set(session_keys::REVIEW_CONFIRMED, false).await;

    session
}

pub fn create_flow_runner(deps: &ImportDeps, storage: Arc<dyn SessionStorage>) -> FlowRunner {
    let pipeline = Arc::new(build_import_pipeline(deps));
    FlowRunner::new(pipeline, storage)
}
