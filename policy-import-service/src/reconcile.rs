//! Client reconciliation: decide whether an extracted client identity
//! refers to an existing tenant client or a new one.
//!
//! Strictly sequential and short-circuiting: tax id first (a government
//! identifier is a stronger uniqueness signal than an email that may be
//! shared or stale), then email, then `New`. Lookup errors only ever
//! degrade toward `New` — reconciliation never fails.

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use crate::models::{ClientRecord, ClientReconcileStatus, MatchedBy};

/// Strip every non-digit character from a CPF/CNPJ. Idempotent.
pub fn normalize_cpf_cnpj(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Read-only client lookups, scoped by tenant.
#[async_trait]
pub trait ClientDirectory: Send + Sync {
    /// Clients whose stored tax id contains the given digit string.
    async fn find_by_cpf_cnpj_fragment(
        &self,
        tenant_id: Uuid,
        digits: &str,
    ) -> anyhow::Result<Option<ClientRecord>>;

    /// Client with an exactly-equal email, case-insensitive.
    async fn find_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> anyhow::Result<Option<ClientRecord>>;
}

/// Resolve an extracted identity against the tenant's client base.
pub async fn reconcile_client(
    tenant_id: Uuid,
    cpf_cnpj: Option<&str>,
    email: Option<&str>,
    directory: &dyn ClientDirectory,
) -> ClientReconcileStatus {
    if let Some(raw) = cpf_cnpj {
        let digits = normalize_cpf_cnpj(raw);
        if !digits.is_empty() {
            match directory.find_by_cpf_cnpj_fragment(tenant_id, &digits).await {
                Ok(Some(client)) => {
                    return ClientReconcileStatus::Matched {
                        client_id: client.id,
                        matched_by: MatchedBy::CpfCnpj,
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(tenant_id = %tenant_id, "CPF/CNPJ lookup failed, falling through: {e}");
                }
            }
        }
    }

    if let Some(email) = email {
        let email = email.trim();
        if !email.is_empty() {
            match directory.find_by_email(tenant_id, email).await {
                Ok(Some(client)) => {
                    return ClientReconcileStatus::Matched {
                        client_id: client.id,
                        matched_by: MatchedBy::Email,
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(tenant_id = %tenant_id, "email lookup failed, treating as no match: {e}");
                }
            }
        }
    }

    ClientReconcileStatus::New
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::InMemoryImportRepo;

    fn client(name: &str, cpf_cnpj: Option<&str>, email: Option<&str>) -> ClientRecord {
        ClientRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            cpf_cnpj: cpf_cnpj.map(str::to_string),
            email: email.map(str::to_string),
        }
    }

    #[test]
    fn normalize_strips_non_digits_and_is_idempotent() {
        assert_eq!(normalize_cpf_cnpj("123.456.789-09"), "12345678909");
        assert_eq!(normalize_cpf_cnpj("12.345.678/0001-95"), "12345678000195");
        assert_eq!(normalize_cpf_cnpj("abc"), "");

        let once = normalize_cpf_cnpj("123.456.789-09");
        assert_eq!(normalize_cpf_cnpj(&once), once);
    }

    #[tokio::test]
    async fn tax_id_takes_precedence_over_email() {
        let tenant_id = Uuid::new_v4();
        let by_cpf = client("Ana", Some("12345678909"), None);
        let by_email = client("Bruno", None, Some("shared@corretora.com"));
        let expected = by_cpf.id;

        let repo = InMemoryImportRepo::new(tenant_id);
        repo.add_client(by_cpf);
        repo.add_client(by_email);

        let status = reconcile_client(
            tenant_id,
            Some("123.456.789-09"),
            Some("shared@corretora.com"),
            &repo,
        )
        .await;

        assert_eq!(
            status,
            ClientReconcileStatus::Matched {
                client_id: expected,
                matched_by: MatchedBy::CpfCnpj,
            }
        );
    }

    #[tokio::test]
    async fn falls_back_to_email_without_tax_id() {
        let tenant_id = Uuid::new_v4();
        let existing = client("Carla", None, Some("carla@exemplo.com"));
        let expected = existing.id;

        let repo = InMemoryImportRepo::new(tenant_id);
        repo.add_client(existing);

        let status = reconcile_client(tenant_id, None, Some("CARLA@exemplo.com"), &repo).await;

        assert_eq!(
            status,
            ClientReconcileStatus::Matched {
                client_id: expected,
                matched_by: MatchedBy::Email,
            }
        );
    }

    #[tokio::test]
    async fn unknown_identity_is_new() {
        let tenant_id = Uuid::new_v4();
        let repo = InMemoryImportRepo::new(tenant_id);
        repo.add_client(client("Diego", Some("99999999999"), Some("diego@exemplo.com")));

        let status = reconcile_client(
            tenant_id,
            Some("111.111.111-11"),
            Some("outra@exemplo.com"),
            &repo,
        )
        .await;

        assert_eq!(status, ClientReconcileStatus::New);
    }

    #[tokio::test]
    async fn no_identifiers_is_new() {
        let tenant_id = Uuid::new_v4();
        let repo = InMemoryImportRepo::new(tenant_id);

        let status = reconcile_client(tenant_id, None, None, &repo).await;
        assert_eq!(status, ClientReconcileStatus::New);

        let status = reconcile_client(tenant_id, Some("---"), Some("  "), &repo).await;
        assert_eq!(status, ClientReconcileStatus::New);
    }
}
