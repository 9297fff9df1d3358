//! OCR over an external HTTP API. The provider rate-limits aggressively,
//! so calls go through a fixed-delay gate owned by the client; the
//! pipeline stays unaware of the pacing policy.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::info;

use super::{AdapterError, DocumentOcr};

/// Spaces calls by a minimum gap. Swap the gap without touching callers.
pub struct RateGate {
    min_gap: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            last_call: Mutex::new(None),
        }
    }

    /// Wait until at least `min_gap` has passed since the previous call.
    pub async fn wait(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_gap {
                tokio::time::sleep(self.min_gap - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub api_url: String,
    pub api_key: String,
    pub language: String,
    pub extract_tables: bool,
    pub request_gap: Duration,
}

impl OcrConfig {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            language: "por".to_string(),
            extract_tables: true,
            request_gap: Duration::from_millis(1200),
        }
    }
}

pub struct OcrClient {
    http: Client,
    config: OcrConfig,
    gate: RateGate,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(rename = "ParsedResults", default)]
    parsed_results: Vec<OcrParsedResult>,
    #[serde(rename = "IsErroredOnProcessing", default)]
    is_errored: bool,
    #[serde(rename = "ErrorMessage", default)]
    error_message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OcrParsedResult {
    #[serde(rename = "ParsedText", default)]
    parsed_text: String,
}

impl OcrClient {
    pub fn new(config: OcrConfig) -> Self {
        let gate = RateGate::new(config.request_gap);
        Self {
            http: Client::new(),
            config,
            gate,
        }
    }

    fn mime_for(file_name: &str) -> &'static str {
        if file_name.to_lowercase().ends_with(".pdf") {
            "application/pdf"
        } else {
            "image/png"
        }
    }
}

#[async_trait]
impl DocumentOcr for OcrClient {
    async fn extract_text(&self, file_name: &str, bytes: &[u8]) -> Result<String, AdapterError> {
        self.gate.wait().await;

        info!(file = %file_name, size = bytes.len(), "Sending document to OCR API");

        let encoded = STANDARD.encode(bytes);
        let payload = json!({
            "base64Image": format!("data:{};base64,{}", Self::mime_for(file_name), encoded),
            "language": self.config.language,
            "isTable": self.config.extract_tables,
            "OCREngine": 2,
        });

        let response = self
            .http
            .post(&self.config.api_url)
            .header("apikey", &self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AdapterError::RateLimited);
        }
        if !status.is_success() {
            return Err(AdapterError::Gateway {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: OcrResponse = response.json().await?;

        if parsed.is_errored {
            let message = parsed
                .error_message
                .map(|m| m.to_string())
                .unwrap_or_else(|| "unknown OCR error".to_string());
            return Err(AdapterError::Ocr(message));
        }

        let text: String = parsed
            .parsed_results
            .iter()
            .map(|r| r.parsed_text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(AdapterError::Ocr(format!(
                "no text recognized in {file_name}"
            )));
        }

        info!(file = %file_name, chars = text.len(), "OCR completed");
        Ok(text)
    }
}
