//! Tenant-scoped persistence for the import workflow. Every query carries
//! an explicit tenant id filter; the repository owns no invariants beyond
//! that (the database schema does).

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::{ClientRecord, ReferenceEntry};
use crate::reconcile::ClientDirectory;

#[derive(Debug, Clone)]
pub struct NewClient {
    pub name: String,
    pub cpf_cnpj: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPolicy {
    pub client_id: Uuid,
    pub company_id: Uuid,
    pub ramo_id: Uuid,
    pub producer_id: Uuid,
    pub policy_number: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub commission_rate: f64,
    pub premio_liquido: f64,
    pub premio_total: Option<f64>,
    pub insured_asset: Option<String>,
    pub document_url: Option<String>,
}

/// Reads and writes used by the import pipeline.
#[async_trait]
pub trait ImportRepo: ClientDirectory {
    async fn list_companies(&self, tenant_id: Uuid) -> anyhow::Result<Vec<ReferenceEntry>>;
    async fn list_ramos(&self, tenant_id: Uuid) -> anyhow::Result<Vec<ReferenceEntry>>;
    async fn list_producers(&self, tenant_id: Uuid) -> anyhow::Result<Vec<ReferenceEntry>>;

    /// Insert a client with default status "Ativo"; returns the new id.
    async fn create_client(&self, tenant_id: Uuid, client: NewClient) -> anyhow::Result<Uuid>;

    async fn create_policy(&self, tenant_id: Uuid, policy: NewPolicy) -> anyhow::Result<Uuid>;
}

pub struct PostgresImportRepo {
    pool: PgPool,
}

impl PostgresImportRepo {
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

    async fn list_named(
        &self,
        table: &str,
        tenant_id: Uuid,
    ) -> anyhow::Result<Vec<ReferenceEntry>> {
        // `table` only ever comes from the fixed calls below
        let query = format!("SELECT id, name FROM {table} WHERE tenant_id = $1 ORDER BY name");
        let rows = sqlx::query(&query).bind(tenant_id).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                Ok(ReferenceEntry {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ClientDirectory for PostgresImportRepo {
    async fn find_by_cpf_cnpj_fragment(
        &self,
        tenant_id: Uuid,
        digits: &str,
    ) -> anyhow::Result<Option<ClientRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, cpf_cnpj, email FROM clients
            WHERE tenant_id = $1 AND cpf_cnpj ILIKE '%' || $2 || '%'
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(digits)
        .fetch_optional(&self.pool)
        .await?;

        row.map(client_from_row).transpose()
    }

    async fn find_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> anyhow::Result<Option<ClientRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, cpf_cnpj, email FROM clients
            WHERE tenant_id = $1 AND lower(email) = lower($2)
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(client_from_row).transpose()
    }
}

fn client_from_row(row: sqlx::postgres::PgRow) -> anyhow::Result<ClientRecord> {
    Ok(ClientRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        cpf_cnpj: row.try_get("cpf_cnpj")?,
        email: row.try_get("email")?,
    })
}

#[async_trait]
impl ImportRepo for PostgresImportRepo {
    async fn list_companies(&self, tenant_id: Uuid) -> anyhow::Result<Vec<ReferenceEntry>> {
        self.list_named("companies", tenant_id).await
    }

    async fn list_ramos(&self, tenant_id: Uuid) -> anyhow::Result<Vec<ReferenceEntry>> {
        self.list_named("ramos", tenant_id).await
    }

    async fn list_producers(&self, tenant_id: Uuid) -> anyhow::Result<Vec<ReferenceEntry>> {
        self.list_named("producers", tenant_id).await
    }

    async fn create_client(&self, tenant_id: Uuid, client: NewClient) -> anyhow::Result<Uuid> {
        let row = sqlx::query(
            r#"
            INSERT INTO clients (id, tenant_id, name, cpf_cnpj, email, phone, address, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'Ativo')
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(&client.name)
        .bind(&client.cpf_cnpj)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.address)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("id")?)
    }

    async fn create_policy(&self, tenant_id: Uuid, policy: NewPolicy) -> anyhow::Result<Uuid> {
        let row = sqlx::query(
            r#"
            INSERT INTO policies (
                id, tenant_id, client_id, company_id, ramo_id, producer_id,
                policy_number, start_date, end_date, commission_rate,
                premio_liquido, premio_total, insured_asset, document_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(policy.client_id)
        .bind(policy.company_id)
        .bind(policy.ramo_id)
        .bind(policy.producer_id)
        .bind(&policy.policy_number)
        .bind(policy.start_date)
        .bind(policy.end_date)
        .bind(policy.commission_rate)
        .bind(policy.premio_liquido)
        .bind(policy.premio_total)
        .bind(&policy.insured_asset)
        .bind(&policy.document_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("id")?)
    }
}

/// In-memory repository for tests and local runs. Writes for policy
/// numbers listed via `fail_policy_number` return errors, which is how the
/// partial-commit behavior is exercised.
pub struct InMemoryImportRepo {
    tenant_id: Uuid,
    companies: Mutex<Vec<ReferenceEntry>>,
    ramos: Mutex<Vec<ReferenceEntry>>,
    producers: Mutex<Vec<ReferenceEntry>>,
    clients: Mutex<Vec<ClientRecord>>,
    policies: Mutex<Vec<NewPolicy>>,
    failing_policy_numbers: Mutex<Vec<String>>,
}

impl InMemoryImportRepo {
    pub fn new(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            companies: Mutex::new(Vec::new()),
            ramos: Mutex::new(Vec::new()),
            producers: Mutex::new(Vec::new()),
            clients: Mutex::new(Vec::new()),
            policies: Mutex::new(Vec::new()),
            failing_policy_numbers: Mutex::new(Vec::new()),
        }
    }

    pub fn add_company(&self, entry: ReferenceEntry) {
        self.companies.lock().unwrap().push(entry);
    }

    pub fn add_ramo(&self, entry: ReferenceEntry) {
        self.ramos.lock().unwrap().push(entry);
    }

    pub fn add_producer(&self, entry: ReferenceEntry) {
        self.producers.lock().unwrap().push(entry);
    }

    pub fn add_client(&self, client: ClientRecord) {
        self.clients.lock().unwrap().push(client);
    }

    /// Make `create_policy` fail for this policy number.
    pub fn fail_policy_number(&self, policy_number: impl Into<String>) {
        self.failing_policy_numbers
            .lock()
            .unwrap()
            .push(policy_number.into());
    }

    pub fn clients(&self) -> Vec<ClientRecord> {
        self.clients.lock().unwrap().clone()
    }

    pub fn policies(&self) -> Vec<NewPolicy> {
        self.policies.lock().unwrap().clone()
    }

    fn check_tenant(&self, tenant_id: Uuid) -> anyhow::Result<()> {
        if tenant_id != self.tenant_id {
            anyhow::bail!("unknown tenant {tenant_id}");
        }
        Ok(())
    }
}

#[async_trait]
impl ClientDirectory for InMemoryImportRepo {
    async fn find_by_cpf_cnpj_fragment(
        &self,
        tenant_id: Uuid,
        digits: &str,
    ) -> anyhow::Result<Option<ClientRecord>> {
        self.check_tenant(tenant_id)?;
        Ok(self
            .clients
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.cpf_cnpj.as_deref().is_some_and(|t| t.contains(digits)))
            .cloned())
    }

    async fn find_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> anyhow::Result<Option<ClientRecord>> {
        self.check_tenant(tenant_id)?;
        Ok(self
            .clients
            .lock()
            .unwrap()
            .iter()
            .find(|c| {
                c.email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .cloned())
    }
}

#[async_trait]
impl ImportRepo for InMemoryImportRepo {
    async fn list_companies(&self, tenant_id: Uuid) -> anyhow::Result<Vec<ReferenceEntry>> {
        self.check_tenant(tenant_id)?;
        Ok(self.companies.lock().unwrap().clone())
    }

    async fn list_ramos(&self, tenant_id: Uuid) -> anyhow::Result<Vec<ReferenceEntry>> {
        self.check_tenant(tenant_id)?;
        Ok(self.ramos.lock().unwrap().clone())
    }

    async fn list_producers(&self, tenant_id: Uuid) -> anyhow::Result<Vec<ReferenceEntry>> {
        self.check_tenant(tenant_id)?;
        Ok(self.producers.lock().unwrap().clone())
    }

    async fn create_client(&self, tenant_id: Uuid, client: NewClient) -> anyhow::Result<Uuid> {
        self.check_tenant(tenant_id)?;
        let record = ClientRecord {
            id: Uuid::new_v4(),
            name: client.name,
            cpf_cnpj: client.cpf_cnpj,
            email: client.email,
        };
        let id = record.id;
        self.clients.lock().unwrap().push(record);
        Ok(id)
    }

    async fn create_policy(&self, tenant_id: Uuid, policy: NewPolicy) -> anyhow::Result<Uuid> {
        self.check_tenant(tenant_id)?;
        if self
            .failing_policy_numbers
            .lock()
            .unwrap()
            .contains(&policy.policy_number)
        {
            anyhow::bail!("simulated insert failure for {}", policy.policy_number);
        }
        self.policies.lock().unwrap().push(policy);
        Ok(Uuid::new_v4())
    }
}
