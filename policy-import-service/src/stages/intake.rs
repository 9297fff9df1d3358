use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use import_flow::{Advance, Context, FlowError, Result, Stage, StageResult};
use tracing::info;

use super::stage_ids;
use crate::models::{FileStatus, ImportFile, session_keys};

/// First stage: checks the uploaded file set and seeds per-file statuses.
/// No extraction happens here; this is the "upload" state of the flow.
pub struct IntakeStage;

#[async_trait]
impl Stage for IntakeStage {
    fn id(&self) -> &str {
        stage_ids::INTAKE
    }

    async fn run(&self, context: Context) -> Result<StageResult> {
        let mut files: Vec<ImportFile> = context.get_required(session_keys::FILES).await?;

        if files.is_empty() {
            return Err(FlowError::StageFailed(
                "no files provided for import".to_string(),
            ));
        }

        for file in &mut files {
            if file.name.trim().is_empty() {
                file.status = FileStatus::Error("arquivo sem nome".to_string());
            } else if STANDARD.decode(&file.content_base64).is_err() {
                file.status = FileStatus::Error("conteúdo base64 inválido".to_string());
            } else {
                file.status = FileStatus::Pending;
            }
        }

        let accepted = files
            .iter()
            .filter(|f| f.status == FileStatus::Pending)
            .count();
        info!(total = files.len(), accepted, "Import intake complete");

        context.set(session_keys::FILES, &files).await;
        context.set(session_keys::REVIEW_CONFIRMED, false).await;

        Ok(StageResult::with_status(
            None,
            Advance::NextAndRun,
            format!("{accepted} arquivo(s) aceitos para processamento"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, content_base64: &str) -> ImportFile {
        ImportFile {
            name: name.to_string(),
            content_base64: content_base64.to_string(),
            status: FileStatus::Pending,
        }
    }

    #[tokio::test]
    async fn rejects_empty_file_set() {
        let context = Context::new();
        context.set(session_keys::FILES, Vec::<ImportFile>::new()).await;

        let err = IntakeStage.run(context).await.unwrap_err();
        assert!(matches!(err, FlowError::StageFailed(_)));
    }

    #[tokio::test]
    async fn flags_bad_files_and_accepts_the_rest() {
        let context = Context::new();
        let encoded = STANDARD.encode(b"pdf bytes");
        context
            .set(
                session_keys::FILES,
                vec![
                    file("ok.pdf", &encoded),
                    file("", &encoded),
                    file("bad.pdf", "%%%not-base64%%%"),
                ],
            )
            .await;

        let result = IntakeStage.run(context.clone()).await.unwrap();
        assert!(matches!(result.advance, Advance::NextAndRun));

        let files: Vec<ImportFile> = context.get(session_keys::FILES).await.unwrap();
        assert_eq!(files[0].status, FileStatus::Pending);
        assert!(matches!(files[1].status, FileStatus::Error(_)));
        assert!(matches!(files[2].status, FileStatus::Error(_)));
    }
}
