pub mod extraction;
pub mod ocr;
pub mod storage_upload;

pub use extraction::{ExtractionClient, PolicyExtractor};
pub use ocr::{OcrClient, OcrConfig, RateGate};
pub use storage_upload::{DocumentStore, StorageClient};

use thiserror::Error;

/// Errors surfaced by the external-service adapters. These are always
/// converted into per-file or per-item entries by the pipeline; they never
/// abort a batch.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("rate limited by the gateway, try again later")]
    RateLimited,

    #[error("insufficient credits on the gateway account")]
    OutOfCredits,

    #[error("gateway returned {status}: {message}")]
    Gateway { status: u16, message: String },

    #[error("OCR processing failed: {0}")]
    Ocr(String),

    #[error("response failed schema validation: {0}")]
    Schema(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Converts one uploaded document into raw text.
#[async_trait::async_trait]
pub trait DocumentOcr: Send + Sync {
    async fn extract_text(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, AdapterError>;
}
