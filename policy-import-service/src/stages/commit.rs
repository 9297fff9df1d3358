use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use import_flow::{Advance, Context, Result, Stage, StageResult};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::stage_ids;
use crate::adapters::DocumentStore;
use crate::models::{
    ClientReconcileStatus, CommitReport, ImportFile, PolicyImportItem, session_keys,
};
use crate::repo::{ImportRepo, NewClient, NewPolicy};
use crate::validation::{parse_date, validate_item};

/// Final stage: persists reviewed items. Each item commits independently;
/// one failure never blocks the rest, and there is no rollback.
pub struct CommitStage {
    repo: Arc<dyn ImportRepo>,
    store: Option<Arc<dyn DocumentStore>>,
}

impl CommitStage {
    pub fn new(repo: Arc<dyn ImportRepo>, store: Option<Arc<dyn DocumentStore>>) -> Self {
        Self { repo, store }
    }

    async fn resolve_client(
        &self,
        tenant_id: Uuid,
        item: &PolicyImportItem,
    ) -> anyhow::Result<Uuid> {
        match &item.reconcile_status {
            ClientReconcileStatus::Matched { client_id, .. } => Ok(*client_id),
            ClientReconcileStatus::New => {
                self.repo
                    .create_client(
                        tenant_id,
                        NewClient {
                            name: item.extracted.client_name.clone(),
                            cpf_cnpj: item.extracted.cpf_cnpj.clone(),
                            email: item.extracted.email.clone(),
                            phone: item.extracted.phone.clone(),
                            address: item.extracted.address.clone(),
                        },
                    )
                    .await
            }
        }
    }

    async fn upload_source_file(
        &self,
        tenant_id: Uuid,
        item: &PolicyImportItem,
        files: &[ImportFile],
    ) -> Option<String> {
        let store = self.store.as_ref()?;
        let file = files.iter().find(|f| f.name == item.source_file)?;
        let bytes = STANDARD.decode(&file.content_base64).ok()?;

        match store.upload_document(tenant_id, &file.name, bytes).await {
            Ok(url) => Some(url),
            Err(e) => {
                // attachment is best-effort, the policy still commits
                warn!(file = %file.name, "document upload failed: {e}");
                None
            }
        }
    }
}

/// Build the insert payload from a validated item. Returns `None` when a
/// field that validation should have caught is missing.
fn policy_from_item(
    item: &PolicyImportItem,
    client_id: Uuid,
    document_url: Option<String>,
) -> Option<NewPolicy> {
    Some(NewPolicy {
        client_id,
        company_id: item.insurer_id?,
        ramo_id: item.ramo_id?,
        producer_id: item.producer_id?,
        policy_number: item.extracted.policy_number.clone(),
        start_date: parse_date(item.extracted.start_date.as_deref()?)?,
        end_date: parse_date(item.extracted.end_date.as_deref()?)?,
        commission_rate: item.commission_rate?,
        premio_liquido: item.extracted.premio_liquido?,
        premio_total: item.extracted.premio_total,
        insured_asset: item.extracted.insured_asset.clone(),
        document_url,
    })
}

#[async_trait]
impl Stage for CommitStage {
    fn id(&self) -> &str {
        stage_ids::COMMIT
    }

    async fn run(&self, context: Context) -> Result<StageResult> {
        let tenant_id: Uuid = context.get_required(session_keys::TENANT_ID).await?;
        let items: Vec<PolicyImportItem> =
            context.get(session_keys::ITEMS).await.unwrap_or_default();
        let files: Vec<ImportFile> = context.get(session_keys::FILES).await.unwrap_or_default();

        let mut report = CommitReport::default();

        for item in &items {
            if !validate_item(item).is_empty() {
                report.skipped += 1;
                continue;
            }

            let client_id = match self.resolve_client(tenant_id, item).await {
                Ok(id) => id,
                Err(e) => {
                    warn!(item = %item.id, "client creation failed: {e}");
                    report.failed += 1;
                    report
                        .errors
                        .push(format!("{}: falha ao criar cliente: {e}", item.source_file));
                    continue;
                }
            };

            let document_url = self.upload_source_file(tenant_id, item, &files).await;

            let Some(policy) = policy_from_item(item, client_id, document_url) else {
                report.failed += 1;
                report
                    .errors
                    .push(format!("{}: item incompleto", item.source_file));
                continue;
            };

            match self.repo.create_policy(tenant_id, policy).await {
                Ok(_) => report.imported += 1,
                Err(e) => {
                    warn!(item = %item.id, "policy insert failed: {e}");
                    report.failed += 1;
                    report
                        .errors
                        .push(format!("{}: falha ao gravar apólice: {e}", item.source_file));
                }
            }
        }

        info!(
            imported = report.imported,
            skipped = report.skipped,
            failed = report.failed,
            "Commit complete"
        );

        let summary = format!(
            "{} importada(s), {} ignorada(s), {} erro(s)",
            report.imported, report.skipped, report.failed
        );
        context.set(session_keys::COMMIT_REPORT, &report).await;

        Ok(StageResult::with_status(
            Some(summary.clone()),
            Advance::Finish,
            summary,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractedPolicyData, MatchedBy, ReferenceEntry};
    use crate::repo::InMemoryImportRepo;

    fn valid_item(policy_number: &str, refs: (&ReferenceEntry, &ReferenceEntry, &ReferenceEntry)) -> PolicyImportItem {
        let (company, ramo, producer) = refs;
        let mut item = PolicyImportItem {
            id: Uuid::new_v4(),
            source_file: format!("{policy_number}.pdf"),
            extracted: ExtractedPolicyData {
                client_name: format!("Cliente {policy_number}"),
                cpf_cnpj: None,
                email: None,
                phone: None,
                address: None,
                policy_number: policy_number.to_string(),
                insurer_name: company.name.clone(),
                ramo_name: ramo.name.clone(),
                start_date: Some("2026-01-01".to_string()),
                end_date: Some("2027-01-01".to_string()),
                insured_asset: None,
                premio_liquido: Some(500.0),
                premio_total: Some(550.0),
                source_file: format!("{policy_number}.pdf"),
            },
            reconcile_status: ClientReconcileStatus::New,
            insurer_id: Some(company.id),
            ramo_id: Some(ramo.id),
            producer_id: Some(producer.id),
            commission_rate: Some(15.0),
            validation_errors: Vec::new(),
        };
        item.validation_errors = validate_item(&item);
        item
    }

    fn reference(name: &str) -> ReferenceEntry {
        ReferenceEntry { id: Uuid::new_v4(), name: name.to_string() }
    }

    async fn run_commit(
        repo: Arc<InMemoryImportRepo>,
        tenant_id: Uuid,
        items: Vec<PolicyImportItem>,
    ) -> CommitReport {
        let context = Context::new();
        context.set(session_keys::TENANT_ID, tenant_id).await;
        context.set(session_keys::ITEMS, items).await;
        context.set(session_keys::FILES, Vec::<ImportFile>::new()).await;

        let stage = CommitStage::new(repo, None);
        let result = stage.run(context.clone()).await.unwrap();
        assert!(matches!(result.advance, Advance::Finish));

        context.get(session_keys::COMMIT_REPORT).await.unwrap()
    }

    #[tokio::test]
    async fn one_failing_item_does_not_block_the_others() {
        let tenant_id = Uuid::new_v4();
        let repo = Arc::new(InMemoryImportRepo::new(tenant_id));
        let company = reference("Porto Seguro");
        let ramo = reference("Auto");
        let producer = reference("Produtor");

        let items = vec![
            valid_item("AP-1", (&company, &ramo, &producer)),
            valid_item("AP-2", (&company, &ramo, &producer)),
            valid_item("AP-3", (&company, &ramo, &producer)),
        ];
        repo.fail_policy_number("AP-2");

        let report = run_commit(repo.clone(), tenant_id, items).await;

        assert_eq!(report.imported, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.errors.len(), 1);

        let numbers: Vec<String> = repo
            .policies()
            .iter()
            .map(|p| p.policy_number.clone())
            .collect();
        assert_eq!(numbers, vec!["AP-1".to_string(), "AP-3".to_string()]);
    }

    #[tokio::test]
    async fn new_clients_are_created_and_matched_clients_are_not() {
        let tenant_id = Uuid::new_v4();
        let repo = Arc::new(InMemoryImportRepo::new(tenant_id));
        let company = reference("Porto Seguro");
        let ramo = reference("Auto");
        let producer = reference("Produtor");

        let existing = crate::models::ClientRecord {
            id: Uuid::new_v4(),
            name: "Já Existe".to_string(),
            cpf_cnpj: Some("11111111111".to_string()),
            email: None,
        };
        repo.add_client(existing.clone());

        let mut matched = valid_item("AP-1", (&company, &ramo, &producer));
        matched.reconcile_status = ClientReconcileStatus::Matched {
            client_id: existing.id,
            matched_by: MatchedBy::CpfCnpj,
        };
        let brand_new = valid_item("AP-2", (&company, &ramo, &producer));

        let report = run_commit(repo.clone(), tenant_id, vec![matched, brand_new]).await;

        assert_eq!(report.imported, 2);
        // one pre-existing client plus the one created for AP-2
        assert_eq!(repo.clients().len(), 2);
        let policies = repo.policies();
        assert_eq!(policies[0].client_id, existing.id);
    }

    #[tokio::test]
    async fn invalid_items_are_skipped() {
        let tenant_id = Uuid::new_v4();
        let repo = Arc::new(InMemoryImportRepo::new(tenant_id));
        let company = reference("Porto Seguro");
        let ramo = reference("Auto");
        let producer = reference("Produtor");

        let mut invalid = valid_item("AP-1", (&company, &ramo, &producer));
        invalid.commission_rate = Some(150.0);
        let valid = valid_item("AP-2", (&company, &ramo, &producer));

        let report = run_commit(repo.clone(), tenant_id, vec![invalid, valid]).await;

        assert_eq!(report.imported, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(repo.policies().len(), 1);
    }
}
