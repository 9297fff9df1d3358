use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
};
use import_flow::{FlowRunner, Session, SessionStorage};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{
    CommitReport, ImportFile, ImportSessionResponse, PolicyImportItem, StartImportRequest,
    UpdateItemRequest, session_keys,
};
use crate::stages::stage_ids;
use crate::validation::validate_item;
use crate::workflow::{ImportDeps, create_flow_runner, create_import_session};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "id": id
        })),
    )
}

fn conflict_error(message: &str) -> ApiError {
    (StatusCode::CONFLICT, Json(json!({ "error": message })))
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub session_storage: Arc<dyn SessionStorage>,
    pub flow_runner: FlowRunner,
}

pub fn create_app(deps: ImportDeps, session_storage: Arc<dyn SessionStorage>) -> Router {
    let flow_runner = create_flow_runner(&deps, session_storage.clone());
    let app_state = AppState {
        session_storage,
        flow_runner,
    };
    build_router(app_state)
}

fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/imports", post(start_import))
        .route("/imports/{session_id}", get(get_import))
        .route("/imports/{session_id}/items/{item_id}", put(update_item))
        .route("/imports/{session_id}/items/{item_id}", delete(remove_item))
        .route("/imports/{session_id}/commit", post(commit_import))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "SGC Pro Policy Import Service",
        "version": "1.0.0",
        "description": "Bulk policy import with OCR, AI extraction and human review",
        "endpoints": {
            "POST /imports": "Start a new import session",
            "GET /imports/{session_id}": "Session status, file statuses and review items",
            "PUT /imports/{session_id}/items/{item_id}": "Edit a review item",
            "DELETE /imports/{session_id}/items/{item_id}": "Discard a review item",
            "POST /imports/{session_id}/commit": "Confirm the review and commit",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn start_import(
    State(state): State<AppState>,
    Json(request): Json<StartImportRequest>,
) -> ApiResult<ImportSessionResponse> {
    if request.files.is_empty() {
        return Err(bad_request_error("at least one file is required"));
    }
    if request.files.iter().any(|f| f.name.trim().is_empty()) {
        return Err(bad_request_error("every file needs a name"));
    }

    info!(
        tenant_id = %request.tenant_id,
        files = request.files.len(),
        "Starting policy import session"
    );

    let session = create_import_session(request.tenant_id, request.files).await;
    let session_id = session.id.clone();

    save_session(&state, session).await?;

    if let Err(e) = state.flow_runner.run(&session_id).await {
        error!("Failed to run import pipeline for {session_id}: {e}");
        return Err(internal_error("Failed to process import", &e.to_string()));
    }

    let session = load_session(&state, &session_id).await?;
    Ok(Json(session_response(&session).await))
}

async fn get_import(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<ImportSessionResponse> {
    let session = load_session(&state, &session_id).await?;
    Ok(Json(session_response(&session).await))
}

async fn update_item(
    State(state): State<AppState>,
    Path((session_id, item_id)): Path<(String, Uuid)>,
    Json(request): Json<UpdateItemRequest>,
) -> ApiResult<PolicyImportItem> {
    let session = load_session(&state, &session_id).await?;
    ensure_in_review(&session).await?;

    let mut items: Vec<PolicyImportItem> = session
        .context
        .get(session_keys::ITEMS)
        .await
        .unwrap_or_default();

    let Some(item) = items.iter_mut().find(|i| i.id == item_id) else {
        return Err(not_found_error("Item not found", &item_id.to_string()));
    };

    apply_update(item, request);
    item.validation_errors = validate_item(item);
    let updated = item.clone();

    session.context.set(session_keys::ITEMS, &items).await;
    save_session(&state, session).await?;

    Ok(Json(updated))
}

async fn remove_item(
    State(state): State<AppState>,
    Path((session_id, item_id)): Path<(String, Uuid)>,
) -> ApiResult<Value> {
    let session = load_session(&state, &session_id).await?;
    ensure_in_review(&session).await?;

    let mut items: Vec<PolicyImportItem> = session
        .context
        .get(session_keys::ITEMS)
        .await
        .unwrap_or_default();

    let before = items.len();
    items.retain(|i| i.id != item_id);
    if items.len() == before {
        return Err(not_found_error("Item not found", &item_id.to_string()));
    }

    session.context.set(session_keys::ITEMS, &items).await;
    save_session(&state, session).await?;

    Ok(Json(json!({ "removed": item_id, "remaining": items.len() })))
}

async fn commit_import(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Value> {
    let session = load_session(&state, &session_id).await?;
    ensure_in_review(&session).await?;

    session.context.set(session_keys::REVIEW_CONFIRMED, true).await;
    save_session(&state, session).await?;

    if let Err(e) = state.flow_runner.run(&session_id).await {
        error!("Commit failed for session {session_id}: {e}");
        return Err(internal_error("Failed to commit import", &e.to_string()));
    }

    let session = load_session(&state, &session_id).await?;
    let report: CommitReport = session
        .context
        .get(session_keys::COMMIT_REPORT)
        .await
        .unwrap_or_default();

    Ok(Json(json!({
        "session_id": session_id,
        "status": "complete",
        "report": report
    })))
}

fn map_status(session: &Session, waiting: bool, completed: bool) -> String {
    if completed {
        return "complete".to_string();
    }
    if waiting {
        return "review".to_string();
    }
    match session.current_stage_id.as_str() {
        stage_ids::INTAKE => "upload".to_string(),
        stage_ids::REVIEW => "review".to_string(),
        _ => "processing".to_string(),
    }
}

async fn session_response(session: &Session) -> ImportSessionResponse {
    let files: Vec<ImportFile> = session
        .context
        .get(session_keys::FILES)
        .await
        .unwrap_or_default();
    let items: Vec<PolicyImportItem> = session
        .context
        .get(session_keys::ITEMS)
        .await
        .unwrap_or_default();
    let waiting: bool = session
        .context
        .get(session_keys::WAITING_FOR_REVIEW)
        .await
        .unwrap_or(false);
    let completed = session
        .context
        .get::<CommitReport>(session_keys::COMMIT_REPORT)
        .await
        .is_some();

    ImportSessionResponse {
        session_id: session.id.clone(),
        status: map_status(session, waiting, completed),
        current_stage: session.current_stage_id.clone(),
        status_message: session.status_message.clone(),
        files,
        items,
    }
}

fn apply_update(item: &mut PolicyImportItem, request: UpdateItemRequest) {
    if let Some(insurer_id) = request.insurer_id {
        item.insurer_id = Some(insurer_id);
    }
    if let Some(ramo_id) = request.ramo_id {
        item.ramo_id = Some(ramo_id);
    }
    if let Some(producer_id) = request.producer_id {
        item.producer_id = Some(producer_id);
    }
    if let Some(rate) = request.commission_rate {
        item.commission_rate = Some(rate);
    }
    if let Some(client_name) = request.client_name {
        item.extracted.client_name = client_name;
    }
    if let Some(policy_number) = request.policy_number {
        item.extracted.policy_number = policy_number;
    }
    if let Some(start_date) = request.start_date {
        item.extracted.start_date = Some(start_date);
    }
    if let Some(end_date) = request.end_date {
        item.extracted.end_date = Some(end_date);
    }
    if let Some(premio_liquido) = request.premio_liquido {
        item.extracted.premio_liquido = Some(premio_liquido);
    }
    if let Some(premio_total) = request.premio_total {
        item.extracted.premio_total = Some(premio_total);
    }
}

async fn ensure_in_review(session: &Session) -> Result<(), ApiError> {
    let waiting: bool = session
        .context
        .get(session_keys::WAITING_FOR_REVIEW)
        .await
        .unwrap_or(false);
    if !waiting || session.current_stage_id != stage_ids::REVIEW {
        return Err(conflict_error("session is not in the review stage"));
    }
    Ok(())
}

async fn load_session(state: &AppState, session_id: &str) -> Result<Session, ApiError> {
    match state.session_storage.get(session_id).await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(not_found_error("Session not found", session_id)),
        Err(e) => {
            error!("Failed to load session {session_id}: {e}");
            Err(internal_error("Failed to load session", &e.to_string()))
        }
    }
}

async fn save_session(state: &AppState, session: Session) -> Result<(), ApiError> {
    state.session_storage.save(session).await.map_err(|e| {
        error!("Failed to save session: {e}");
        internal_error("Failed to save session", &e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AdapterError, DocumentOcr, PolicyExtractor};
    use crate::models::{ExtractedPolicyData, ImportFileUpload, ReferenceEntry};
    use crate::repo::InMemoryImportRepo;
    use async_trait::async_trait;
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use import_flow::InMemorySessionStorage;

    struct StaticOcr;

    #[async_trait]
    impl DocumentOcr for StaticOcr {
        async fn extract_text(
            &self,
            _file_name: &str,
            _bytes: &[u8],
        ) -> Result<String, AdapterError> {
            Ok("texto da apólice".to_string())
        }
    }

    struct StaticExtractor {
        record: ExtractedPolicyData,
    }

    #[async_trait]
    impl PolicyExtractor for StaticExtractor {
        async fn extract_policies(
            &self,
            _aggregated_text: &str,
        ) -> Result<Vec<ExtractedPolicyData>, AdapterError> {
            Ok(vec![self.record.clone()])
        }
    }

    fn extracted() -> ExtractedPolicyData {
        ExtractedPolicyData {
            client_name: "Maria Souza".to_string(),
            cpf_cnpj: None,
            email: None,
            phone: None,
            address: None,
            policy_number: "AP-1".to_string(),
            insurer_name: "Porto Seguro".to_string(),
            ramo_name: "Auto".to_string(),
            start_date: Some("2026-01-01".to_string()),
            end_date: Some("2027-01-01".to_string()),
            insured_asset: None,
            premio_liquido: Some(1200.0),
            premio_total: None,
            source_file: "apolice.pdf".to_string(),
        }
    }

    struct Harness {
        state: AppState,
        repo: Arc<InMemoryImportRepo>,
        tenant_id: Uuid,
    }

    fn harness() -> Harness {
        let tenant_id = Uuid::new_v4();
        let repo = Arc::new(InMemoryImportRepo::new(tenant_id));
        repo.add_company(ReferenceEntry { id: Uuid::new_v4(), name: "Porto Seguro".to_string() });
        repo.add_ramo(ReferenceEntry { id: Uuid::new_v4(), name: "Auto".to_string() });
        repo.add_producer(ReferenceEntry { id: Uuid::new_v4(), name: "Produtor".to_string() });

        let deps = ImportDeps {
            repo: repo.clone(),
            ocr: Arc::new(StaticOcr),
            extractor: Arc::new(StaticExtractor { record: extracted() }),
            store: None,
        };
        let session_storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());
        let flow_runner = create_flow_runner(&deps, session_storage.clone());

        Harness {
            state: AppState { session_storage, flow_runner },
            repo,
            tenant_id,
        }
    }

    async fn started_session(h: &Harness) -> ImportSessionResponse {
        let request = StartImportRequest {
            tenant_id: h.tenant_id,
            files: vec![ImportFileUpload {
                name: "apolice.pdf".to_string(),
                content_base64: STANDARD.encode(b"conteudo"),
            }],
        };
        start_import(State(h.state.clone()), Json(request))
            .await
            .unwrap()
            .0
    }

    #[tokio::test]
    async fn full_flow_reaches_review_then_commits() {
        let h = harness();
        let response = started_session(&h).await;

        assert_eq!(response.status, "review");
        assert_eq!(response.items.len(), 1);
        let item = &response.items[0];
        assert!(item.insurer_id.is_some());
        // commission is still missing, item not yet valid
        assert!(!item.validation_errors.is_empty());

        // fix the item
        let update = UpdateItemRequest {
            commission_rate: Some(20.0),
            ..Default::default()
        };
        let updated = update_item(
            State(h.state.clone()),
            Path((response.session_id.clone(), item.id)),
            Json(update),
        )
        .await
        .unwrap()
        .0;
        assert!(updated.validation_errors.is_empty());

        let commit = commit_import(State(h.state.clone()), Path(response.session_id.clone()))
            .await
            .unwrap()
            .0;
        assert_eq!(commit["report"]["imported"], 1);
        assert_eq!(h.repo.policies().len(), 1);
        // New client was created with default flow
        assert_eq!(h.repo.clients().len(), 1);

        // commits are one-shot: the session is no longer reviewable
        let err = commit_import(State(h.state.clone()), Path(response.session_id.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn start_requires_files() {
        let h = harness();
        let request = StartImportRequest {
            tenant_id: h.tenant_id,
            files: Vec::new(),
        };
        let err = start_import(State(h.state.clone()), Json(request))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn removing_an_item_excludes_it_from_commit() {
        let h = harness();
        let response = started_session(&h).await;
        let item_id = response.items[0].id;

        remove_item(
            State(h.state.clone()),
            Path((response.session_id.clone(), item_id)),
        )
        .await
        .unwrap();

        let commit = commit_import(State(h.state.clone()), Path(response.session_id.clone()))
            .await
            .unwrap()
            .0;
        assert_eq!(commit["report"]["imported"], 0);
        assert_eq!(h.repo.policies().len(), 0);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let h = harness();
        let err = get_import(State(h.state.clone()), Path("missing".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }
}
