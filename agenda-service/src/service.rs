use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{AdvanceRequest, AdvanceResponse, Appointment, status};
use crate::recurrence::{Recurrence, next_occurrence, parse_fixed_rule, parse_rrule};
use crate::repo::AgendaRepo;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": message, "id": id })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message, "details": details })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn AgendaRepo>,
}

pub fn create_app(repo: Arc<dyn AgendaRepo>) -> Router {
    build_router(AppState { repo })
}

fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/appointments/complete", post(complete_appointment))
        .route("/appointments/skip", post(skip_appointment))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "SGC Pro Agenda Service",
        "version": "1.0.0",
        "description": "Recurring appointment rollover",
        "endpoints": {
            "POST /appointments/complete": "Complete an appointment and schedule its next occurrence",
            "POST /appointments/skip": "Skip an appointment and schedule its next occurrence",
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

/// Outcome of closing an appointment (complete or skip).
pub enum AdvanceOutcome {
    NotFound,
    /// Closed; the appointment was not recurring.
    Closed,
    /// Closed and a successor was scheduled.
    Rescheduled { new_appointment_id: Uuid },
}

/// Mark the appointment with `new_status` and, when its rule parses as
/// recurring, insert the successor occurrence.
pub async fn advance_appointment(
    repo: &dyn AgendaRepo,
    appointment_id: Uuid,
    new_status: &str,
    parse_rule: fn(&str) -> Option<Recurrence>,
) -> anyhow::Result<AdvanceOutcome> {
    let Some(appointment) = repo.get_appointment(appointment_id).await? else {
        return Ok(AdvanceOutcome::NotFound);
    };

    repo.set_status(appointment_id, new_status).await?;

    let recurrence = appointment
        .recurrence_rule
        .as_deref()
        .and_then(parse_rule);

    let Some(recurrence) = recurrence else {
        return Ok(AdvanceOutcome::Closed);
    };

    let Some(next_start) = next_occurrence(&recurrence, appointment.start_time) else {
        return Ok(AdvanceOutcome::Closed);
    };
    let shift = next_start - appointment.start_time;

    let successor = Appointment {
        id: Uuid::new_v4(),
        tenant_id: appointment.tenant_id,
        title: appointment.title.clone(),
        description: appointment.description.clone(),
        start_time: next_start,
        end_time: appointment.end_time.map(|end| end + shift),
        recurrence_rule: appointment.recurrence_rule.clone(),
        status: status::PENDING.to_string(),
    };

    let new_appointment_id = repo.insert_appointment(successor).await?;
    info!(
        appointment_id = %appointment_id,
        new_appointment_id = %new_appointment_id,
        "Scheduled next occurrence"
    );
    Ok(AdvanceOutcome::Rescheduled { new_appointment_id })
}

async fn handle_advance(
    state: &AppState,
    request: AdvanceRequest,
    new_status: &str,
    parse_rule: fn(&str) -> Option<Recurrence>,
) -> ApiResult<AdvanceResponse> {
    let Some(appointment_id) = request.appointment_id else {
        return Err(bad_request_error("appointmentId is required"));
    };

    match advance_appointment(state.repo.as_ref(), appointment_id, new_status, parse_rule).await {
        Ok(AdvanceOutcome::NotFound) => Err(not_found_error(
            "Appointment not found",
            &appointment_id.to_string(),
        )),
        Ok(AdvanceOutcome::Closed) => Ok(Json(AdvanceResponse {
            message: "Appointment closed, no recurrence".to_string(),
            new_appointment_id: None,
        })),
        Ok(AdvanceOutcome::Rescheduled { new_appointment_id }) => Ok(Json(AdvanceResponse {
            message: "Appointment closed, next occurrence scheduled".to_string(),
            new_appointment_id: Some(new_appointment_id),
        })),
        Err(e) => {
            error!("Failed to advance appointment {appointment_id}: {e}");
            Err(internal_error("Failed to update appointment", &e.to_string()))
        }
    }
}

/// Completion endpoint: recurrence is an RRULE string.
async fn complete_appointment(
    State(state): State<AppState>,
    Json(request): Json<AdvanceRequest>,
) -> ApiResult<AdvanceResponse> {
    handle_advance(&state, request, status::COMPLETED, parse_rrule).await
}

/// Skip endpoint: recurrence is a fixed rule keyword.
async fn skip_appointment(
    State(state): State<AppState>,
    Json(request): Json<AdvanceRequest>,
) -> ApiResult<AdvanceResponse> {
    handle_advance(&state, request, status::SKIPPED, parse_fixed_rule).await
}
