use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;

use crate::{Context, error::Result};

/// A persistent pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub pipeline_id: String,
    pub current_stage_id: String,
    pub status_message: Option<String>,
    #[serde(skip)]
    pub context: Context,
}

impl Session {
    pub fn new_from_stage(id: String, pipeline_id: &str, stage_id: &str) -> Self {
        Self {
            id,
            pipeline_id: pipeline_id.to_string(),
            current_stage_id: stage_id.to_string(),
            status_message: None,
            context: Context::new(),
        }
    }
}

/// Trait for storing and retrieving sessions
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, session: Session) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Session>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory implementation of SessionStorage
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, Session>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemorySessionStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: Session) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}

/// Postgres-backed implementation of SessionStorage.
///
/// The context is stored as JSONB, so everything a stage puts in the
/// context must be JSON-serializable (which `Context::set` already
/// requires).
pub struct PostgresSessionStorage {
    pool: PgPool,
}

impl PostgresSessionStorage {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS flow_sessions (
                id TEXT PRIMARY KEY,
                pipeline_id TEXT NOT NULL,
                current_stage_id TEXT NOT NULL,
                status_message TEXT,
                context JSONB NOT NULL DEFAULT '{}'::jsonb,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStorage for PostgresSessionStorage {
    async fn save(&self, session: Session) -> Result<()> {
        let context = serde_json::to_value(session.context.snapshot())?;

        sqlx::query(
            r#"
            INSERT INTO flow_sessions (id, pipeline_id, current_stage_id, status_message, context, updated_at)
            VALUES ($1, $2, $3, $4, $5, now())
            ON CONFLICT (id) DO UPDATE SET
                current_stage_id = EXCLUDED.current_stage_id,
                status_message = EXCLUDED.status_message,
                context = EXCLUDED.context,
                updated_at = now()
            "#,
        )
        .bind(&session.id)
        .bind(&session.pipeline_id)
        .bind(&session.current_stage_id)
        .bind(&session.status_message)
        .bind(context)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        let row = sqlx::query(
            "SELECT id, pipeline_id, current_stage_id, status_message, context FROM flow_sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let context_value: serde_json::Value = row.try_get("context")?;
        let snapshot: HashMap<String, serde_json::Value> = serde_json::from_value(context_value)?;

        Ok(Some(Session {
            id: row.try_get("id")?,
            pipeline_id: row.try_get("pipeline_id")?,
            current_stage_id: row.try_get("current_stage_id")?,
            status_message: row.try_get("status_message")?,
            context: Context::restore(snapshot),
        }))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM flow_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
