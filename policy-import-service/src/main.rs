use std::sync::Arc;
use std::time::Duration;

use import_flow::{PostgresSessionStorage, SessionStorage};
use policy_import_service::adapters::{ExtractionClient, OcrClient, OcrConfig, StorageClient};
use policy_import_service::repo::PostgresImportRepo;
use policy_import_service::{ImportDeps, create_app};
use tokio::net::TcpListener;
use tracing::{Level, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn required_env(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| {
        eprintln!("Error: {name} environment variable is required");
        std::process::exit(1);
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let database_url = required_env("DATABASE_URL");
    let ocr_api_key = required_env("OCR_API_KEY");
    let llm_api_key = required_env("LLM_GATEWAY_API_KEY");

    let ocr_api_url = std::env::var("OCR_API_URL")
        .unwrap_or_else(|_| "https://api.ocr.space/parse/image".to_string());
    let llm_api_url = std::env::var("LLM_GATEWAY_URL")
        .unwrap_or_else(|_| "https://openrouter.ai/api/v1/chat/completions".to_string());
    let llm_model =
        std::env::var("LLM_MODEL").unwrap_or_else(|_| "openai/gpt-4o-mini".to_string());

    let mut ocr_config = OcrConfig::new(ocr_api_url, ocr_api_key);
    if let Ok(gap_ms) = std::env::var("OCR_REQUEST_GAP_MS") {
        if let Ok(gap_ms) = gap_ms.parse::<u64>() {
            ocr_config.request_gap = Duration::from_millis(gap_ms);
        }
    }

    // Document storage is optional: without it policies commit with no attachment
    let store: Option<Arc<dyn policy_import_service::adapters::DocumentStore>> = match (
        std::env::var("STORAGE_BASE_URL"),
        std::env::var("STORAGE_API_KEY"),
    ) {
        (Ok(base_url), Ok(api_key)) => Some(Arc::new(StorageClient::new(base_url, api_key))),
        _ => {
            info!("STORAGE_BASE_URL not set, source documents will not be archived");
            None
        }
    };

    let repo = PostgresImportRepo::connect(&database_url)
        .await
        .unwrap_or_else(|e| {
            error!("Failed to connect to PostgreSQL: {e}");
            std::process::exit(1);
        });

    let session_storage: Arc<dyn SessionStorage> =
        Arc::new(PostgresSessionStorage::connect(&database_url).await.unwrap_or_else(|e| {
            error!("Failed to initialize session storage: {e}");
            std::process::exit(1);
        }));

    let deps = ImportDeps {
        repo: Arc::new(repo),
        ocr: Arc::new(OcrClient::new(ocr_config)),
        extractor: Arc::new(ExtractionClient::new(llm_api_url, llm_api_key, llm_model)),
        store,
    };

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3001".to_string())
        .parse::<u16>()
        .unwrap_or(3001);

    let app = create_app(deps, session_storage);
    let listener = TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    let addr = listener.local_addr()?;

    info!("Policy Import Service starting on {addr}");
    info!("Health check endpoint: http://{addr}/health");
    info!("Import endpoint: POST http://{addr}/imports");

    axum::serve(listener, app).await?;

    Ok(())
}
