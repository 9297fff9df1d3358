use async_trait::async_trait;
use import_flow::{Advance, Context, Result, Stage, StageResult};
use tracing::info;

use super::stage_ids;
use crate::models::{PolicyImportItem, session_keys};

/// Third stage: the human checkpoint. Holds the session until the user
/// confirms the review; edits and removals happen through the HTTP layer
/// while this stage is waiting.
pub struct ReviewStage;

#[async_trait]
impl Stage for ReviewStage {
    fn id(&self) -> &str {
        stage_ids::REVIEW
    }

    async fn run(&self, context: Context) -> Result<StageResult> {
        let confirmed: bool = context
            .get(session_keys::REVIEW_CONFIRMED)
            .await
            .unwrap_or(false);

        if confirmed {
            info!("Review confirmed, proceeding to commit");
            context.set(session_keys::WAITING_FOR_REVIEW, false).await;
            return Ok(StageResult::with_status(
                None,
                Advance::NextAndRun,
                "Revisão confirmada, gravando registros",
            ));
        }

        let items: Vec<PolicyImportItem> = context
            .get(session_keys::ITEMS)
            .await
            .unwrap_or_default();
        let ready = items.iter().filter(|i| i.validation_errors.is_empty()).count();

        info!(total = items.len(), ready, "Waiting for human review");
        context.set(session_keys::WAITING_FOR_REVIEW, true).await;

        Ok(StageResult::with_status(
            Some(format!(
                "{} apólice(s) aguardando revisão, {ready} prontas para importação",
                items.len()
            )),
            Advance::WaitForInput,
            "Aguardando revisão do usuário",
        ))
    }
}
