use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::Appointment;

#[async_trait]
pub trait AgendaRepo: Send + Sync {
    async fn get_appointment(&self, id: Uuid) -> anyhow::Result<Option<Appointment>>;
    async fn set_status(&self, id: Uuid, status: &str) -> anyhow::Result<()>;
    async fn insert_appointment(&self, appointment: Appointment) -> anyhow::Result<Uuid>;
}

pub struct PostgresAgendaRepo {
    pool: PgPool,
}

impl PostgresAgendaRepo {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgendaRepo for PostgresAgendaRepo {
    async fn get_appointment(&self, id: Uuid) -> anyhow::Result<Option<Appointment>> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, title, description, start_time, end_time,
                   recurrence_rule, status
            FROM appointments WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(Appointment {
                id: row.try_get("id")?,
                tenant_id: row.try_get("tenant_id")?,
                title: row.try_get("title")?,
                description: row.try_get("description")?,
                start_time: row.try_get("start_time")?,
                end_time: row.try_get("end_time")?,
                recurrence_rule: row.try_get("recurrence_rule")?,
                status: row.try_get("status")?,
            })
        })
        .transpose()
    }

    async fn set_status(&self, id: Uuid, status: &str) -> anyhow::Result<()> {
        let result = sqlx::query("UPDATE appointments SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("appointment {id} not found");
        }
        Ok(())
    }

    async fn insert_appointment(&self, appointment: Appointment) -> anyhow::Result<Uuid> {
        sqlx::query(
            r#"
            INSERT INTO appointments (
                id, tenant_id, title, description, start_time, end_time,
                recurrence_rule, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(appointment.id)
        .bind(appointment.tenant_id)
        .bind(&appointment.title)
        .bind(&appointment.description)
        .bind(appointment.start_time)
        .bind(appointment.end_time)
        .bind(&appointment.recurrence_rule)
        .bind(&appointment.status)
        .execute(&self.pool)
        .await?;

        Ok(appointment.id)
    }
}

/// In-memory repository for tests.
pub struct InMemoryAgendaRepo {
    appointments: Mutex<Vec<Appointment>>,
}

impl InMemoryAgendaRepo {
    pub fn new() -> Self {
        Self {
            appointments: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&self, appointment: Appointment) {
        self.appointments.lock().unwrap().push(appointment);
    }

    pub fn all(&self) -> Vec<Appointment> {
        self.appointments.lock().unwrap().clone()
    }
}

impl Default for InMemoryAgendaRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgendaRepo for InMemoryAgendaRepo {
    async fn get_appointment(&self, id: Uuid) -> anyhow::Result<Option<Appointment>> {
        Ok(self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn set_status(&self, id: Uuid, status: &str) -> anyhow::Result<()> {
        let mut appointments = self.appointments.lock().unwrap();
        let appointment = appointments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| anyhow::anyhow!("appointment {id} not found"))?;
        appointment.status = status.to_string();
        Ok(())
    }

    async fn insert_appointment(&self, appointment: Appointment) -> anyhow::Result<Uuid> {
        let id = appointment.id;
        self.appointments.lock().unwrap().push(appointment);
        Ok(id)
    }
}
