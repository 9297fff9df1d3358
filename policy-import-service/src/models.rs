use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw structured output of document extraction. Produced once per source
/// document and staged in the session context until commit; never written
/// to the database as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedPolicyData {
    pub client_name: String,
    pub cpf_cnpj: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub policy_number: String,
    pub insurer_name: String,
    pub ramo_name: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub insured_asset: Option<String>,
    pub premio_liquido: Option<f64>,
    pub premio_total: Option<f64>,
    pub source_file: String,
}

/// Which identifier resolved the client during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedBy {
    CpfCnpj,
    Email,
}

/// Outcome of client identity resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClientReconcileStatus {
    Matched { client_id: Uuid, matched_by: MatchedBy },
    New,
}

/// Per-file processing state shown during the processing stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum FileStatus {
    Pending,
    Processing,
    Success,
    Error(String),
}

/// One uploaded source document, carried through the session context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportFile {
    pub name: String,
    pub content_base64: String,
    pub status: FileStatus,
}

/// The working unit of the review stage: one extracted policy plus
/// everything the user can correct before commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyImportItem {
    pub id: Uuid,
    pub source_file: String,
    pub extracted: ExtractedPolicyData,
    pub reconcile_status: ClientReconcileStatus,
    pub insurer_id: Option<Uuid>,
    pub ramo_id: Option<Uuid>,
    pub producer_id: Option<Uuid>,
    pub commission_rate: Option<f64>,
    pub validation_errors: Vec<String>,
}

/// Tenant-scoped reference row (company, ramo or producer)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub id: Uuid,
    pub name: String,
}

/// Existing client row, as seen by reconciliation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: Uuid,
    pub name: String,
    pub cpf_cnpj: Option<String>,
    pub email: Option<String>,
}

/// Summary produced by the commit stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitReport {
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

// ---- HTTP DTOs ----

#[derive(Debug, Deserialize)]
pub struct ImportFileUpload {
    pub name: String,
    pub content_base64: String,
}

#[derive(Debug, Deserialize)]
pub struct StartImportRequest {
    pub tenant_id: Uuid,
    pub files: Vec<ImportFileUpload>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateItemRequest {
    pub insurer_id: Option<Uuid>,
    pub ramo_id: Option<Uuid>,
    pub producer_id: Option<Uuid>,
    pub commission_rate: Option<f64>,
    pub client_name: Option<String>,
    pub policy_number: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub premio_liquido: Option<f64>,
    pub premio_total: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ImportSessionResponse {
    pub session_id: String,
    pub status: String,
    pub current_stage: String,
    pub status_message: Option<String>,
    pub files: Vec<ImportFile>,
    pub items: Vec<PolicyImportItem>,
}

// Context keys shared between stages and the HTTP layer
pub mod session_keys {
    pub const TENANT_ID: &str = "tenant_id";
    pub const FILES: &str = "files";
    pub const ITEMS: &str = "items";
    pub const REVIEW_CONFIRMED: &str = "review_confirmed";
    pub const WAITING_FOR_REVIEW: &str = "waiting_for_review";
    pub const COMMIT_REPORT: &str = "commit_report";
    pub const PROCESSING_ERRORS: &str = "processing_errors";
}
