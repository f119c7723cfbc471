use crate::config::AppConfig;
use crate::server;

pub async fn handle() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    tracing::info!("starting folio-api in {:?} mode", config.environment);
    server::run(config).await
}
