use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod status {
    pub const PENDING: &str = "pendente";
    pub const COMPLETED: &str = "concluido";
    pub const SKIPPED: &str = "ignorado";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Either an RRULE string or a fixed rule keyword, depending on which
    /// endpoint family created the appointment.
    pub recurrence_rule: Option<String>,
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceRequest {
    pub appointment_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_appointment_id: Option<Uuid>,
}
