//! Tenant-scoped object storage for source documents. Upload is
//! best-effort: a failed upload costs the policy its attachment, never the
//! import.

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;
use uuid::Uuid;

use super::AdapterError;

const BUCKET: &str = "policy-documents";

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store the document under a tenant-scoped path; returns its public URL.
    async fn upload_document(
        &self,
        tenant_id: Uuid,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, AdapterError>;
}

pub struct StorageClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl StorageClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn object_path(tenant_id: Uuid, file_name: &str) -> String {
        // sanitize the client-supplied name before it becomes a path segment
        let safe_name: String = file_name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        format!("{tenant_id}/{}_{safe_name}", Uuid::new_v4())
    }
}

#[async_trait]
impl DocumentStore for StorageClient {
    async fn upload_document(
        &self,
        tenant_id: Uuid,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, AdapterError> {
        let path = Self::object_path(tenant_id, file_name);
        let upload_url = format!("{}/object/{BUCKET}/{path}", self.base_url);

        let response = self
            .http
            .post(&upload_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/octet-stream")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Gateway {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let public_url = format!("{}/object/public/{BUCKET}/{path}", self.base_url);
        info!(file = %file_name, url = %public_url, "Document uploaded");
        Ok(public_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_path_is_tenant_scoped_and_sanitized() {
        let tenant_id = Uuid::new_v4();
        let path = StorageClient::object_path(tenant_id, "ap 01/2026.pdf");

        assert!(path.starts_with(&format!("{tenant_id}/")));
        assert!(path.ends_with("ap_01_2026.pdf"));
        assert!(!path[37..].contains('/'), "{path}");
    }
}
