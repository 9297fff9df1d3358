use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use import_flow::{Advance, Context, Result, Stage, StageResult};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::stage_ids;
use crate::adapters::{DocumentOcr, PolicyExtractor};
use crate::matching::match_reference;
use crate::models::{
    ExtractedPolicyData, FileStatus, ImportFile, PolicyImportItem, ReferenceEntry, session_keys,
};
use crate::reconcile::reconcile_client;
use crate::repo::ImportRepo;
use crate::validation::validate_item;

/// Second stage: OCR each accepted file, extract structured policies from
/// the aggregated text, then resolve references and client identity for
/// each record. Failures are recorded per file and never abort the batch.
pub struct ProcessingStage {
    ocr: Arc<dyn DocumentOcr>,
    extractor: Arc<dyn PolicyExtractor>,
    repo: Arc<dyn ImportRepo>,
}

impl ProcessingStage {
    pub fn new(
        ocr: Arc<dyn DocumentOcr>,
        extractor: Arc<dyn PolicyExtractor>,
        repo: Arc<dyn ImportRepo>,
    ) -> Self {
        Self { ocr, extractor, repo }
    }

    async fn run_ocr(&self, files: &mut [ImportFile], context: &Context) -> Vec<(String, String)> {
        let mut texts = Vec::new();

        for index in 0..files.len() {
            if files[index].status != FileStatus::Pending {
                continue;
            }
            files[index].status = FileStatus::Processing;
            // interim snapshot so status polls see per-file progress
            context.set(session_keys::FILES, &*files).await;

            let name = files[index].name.clone();
            let bytes = match STANDARD.decode(&files[index].content_base64) {
                Ok(bytes) => bytes,
                Err(e) => {
                    files[index].status = FileStatus::Error(format!("conteúdo inválido: {e}"));
                    continue;
                }
            };

            match self.ocr.extract_text(&name, &bytes).await {
                Ok(text) => {
                    files[index].status = FileStatus::Success;
                    texts.push((name, text));
                }
                Err(e) => {
                    warn!(file = %name, "OCR failed: {e}");
                    files[index].status = FileStatus::Error(e.to_string());
                }
            }
        }

        texts
    }

    async fn load_references(
        &self,
        tenant_id: Uuid,
    ) -> (Vec<ReferenceEntry>, Vec<ReferenceEntry>, Vec<ReferenceEntry>) {
        // A failed lookup degrades to "no match"; the user resolves it in review.
        let companies = self.repo.list_companies(tenant_id).await.unwrap_or_else(|e| {
            warn!("company lookup failed: {e}");
            Vec::new()
        });
        let ramos = self.repo.list_ramos(tenant_id).await.unwrap_or_else(|e| {
            warn!("ramo lookup failed: {e}");
            Vec::new()
        });
        let producers = self.repo.list_producers(tenant_id).await.unwrap_or_else(|e| {
            warn!("producer lookup failed: {e}");
            Vec::new()
        });
        (companies, ramos, producers)
    }

    async fn build_item(
        &self,
        tenant_id: Uuid,
        extracted: ExtractedPolicyData,
        companies: &[ReferenceEntry],
        ramos: &[ReferenceEntry],
        producers: &[ReferenceEntry],
    ) -> PolicyImportItem {
        let insurer_id = match_reference(&extracted.insurer_name, companies).map(|r| r.id);
        let ramo_id = match_reference(&extracted.ramo_name, ramos).map(|r| r.id);
        // With a single registered producer there is nothing to choose
        let producer_id = match producers {
            [only] => Some(only.id),
            _ => None,
        };

        let reconcile_status = reconcile_client(
            tenant_id,
            extracted.cpf_cnpj.as_deref(),
            extracted.email.as_deref(),
            self.repo.as_ref(),
        )
        .await;

        let mut item = PolicyImportItem {
            id: Uuid::new_v4(),
            source_file: extracted.source_file.clone(),
            extracted,
            reconcile_status,
            insurer_id,
            ramo_id,
            producer_id,
            commission_rate: None,
            validation_errors: Vec::new(),
        };
        item.validation_errors = validate_item(&item);
        item
    }
}

fn aggregate_texts(texts: &[(String, String)]) -> String {
    texts
        .iter()
        .map(|(name, text)| format!("=== {name} ===\n{text}"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl Stage for ProcessingStage {
    fn id(&self) -> &str {
        stage_ids::PROCESSING
    }

    async fn run(&self, context: Context) -> Result<StageResult> {
        let tenant_id: Uuid = context.get_required(session_keys::TENANT_ID).await?;
        let mut files: Vec<ImportFile> = context.get_required(session_keys::FILES).await?;
        let mut errors: Vec<String> = Vec::new();

        let texts = self.run_ocr(&mut files, &context).await;

        if texts.is_empty() {
            errors.push("nenhum arquivo pôde ser lido".to_string());
            context.set(session_keys::FILES, &files).await;
            context.set(session_keys::ITEMS, Vec::<PolicyImportItem>::new()).await;
            context.set(session_keys::PROCESSING_ERRORS, &errors).await;
            return Ok(StageResult::with_status(
                None,
                Advance::NextAndRun,
                "Nenhum arquivo processado com sucesso",
            ));
        }

        let aggregated = aggregate_texts(&texts);
        let records = match self.extractor.extract_policies(&aggregated).await {
            Ok(records) => records,
            Err(e) => {
                warn!("extraction failed for the whole batch: {e}");
                let message = format!("extração falhou: {e}");
                for file in files.iter_mut() {
                    if file.status == FileStatus::Success {
                        file.status = FileStatus::Error(message.clone());
                    }
                }
                errors.push(message);
                Vec::new()
            }
        };

        let (companies, ramos, producers) = self.load_references(tenant_id).await;

        let mut items = Vec::with_capacity(records.len());
        for record in records {
            items.push(
                self.build_item(tenant_id, record, &companies, &ramos, &producers)
                    .await,
            );
        }

        info!(
            files = files.len(),
            items = items.len(),
            errors = errors.len(),
            "Processing stage complete"
        );

        let status = format!("{} apólice(s) extraída(s), aguardando revisão", items.len());
        context.set(session_keys::FILES, &files).await;
        context.set(session_keys::ITEMS, &items).await;
        context.set(session_keys::PROCESSING_ERRORS, &errors).await;

        Ok(StageResult::with_status(None, Advance::NextAndRun, status))
    }
}
