use agenda_service::create_app;
use agenda_service::repo::PostgresAgendaRepo;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{Level, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
        eprintln!("Error: DATABASE_URL environment variable is required");
        std::process::exit(1);
    });

    let repo = PostgresAgendaRepo::connect(&database_url)
        .await
        .unwrap_or_else(|e| {
            error!("Failed to connect to PostgreSQL: {e}");
            std::process::exit(1);
        });

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3002".to_string())
        .parse::<u16>()
        .unwrap_or(3002);

    let app = create_app(Arc::new(repo));
    let listener = TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    let addr = listener.local_addr()?;

    info!("Agenda Service starting on {addr}");
    info!("Completion endpoint: POST http://{addr}/appointments/complete");
    info!("Skip endpoint: POST http://{addr}/appointments/skip");

    axum::serve(listener, app).await?;

    Ok(())
}
