use folio_api::config::AppConfig;
use folio_api::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, FOLIO_API_PORT, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env();
    tracing::info!("starting folio-api in {:?} mode", config.environment);

    server::run(config).await
}
