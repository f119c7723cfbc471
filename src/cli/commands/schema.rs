use clap::Subcommand;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::db::{PoolManager, SchemaManager};

#[derive(Subcommand)]
pub enum SchemaCommands {
    #[command(about = "Create or migrate the schema, recording each step in the ledger")]
    Init,

    #[command(about = "Show the applied migration ledger")]
    Status,
}

pub async fn handle(cmd: SchemaCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    let db = PoolManager::connect(&config.database)?;

    match cmd {
        SchemaCommands::Init => {
            let manager = SchemaManager::new(config.environment);
            let state = manager.ensure_ready(&db.pool()).await?;

            match output_format {
                OutputFormat::Json => {
                    println!("{}", json!({ "state": format!("{:?}", state) }));
                }
                OutputFormat::Text => println!("schema: {:?}", state),
            }
        }
        SchemaCommands::Status => {
            let applied = SchemaManager::status(&db.pool()).await?;

            match output_format {
                OutputFormat::Json => {
                    let rows: Vec<_> = applied
                        .iter()
                        .map(|m| {
                            json!({
                                "version": m.version,
                                "name": m.name,
                                "applied_at": m.applied_at,
                            })
                        })
                        .collect();
                    println!("{}", json!(rows));
                }
                OutputFormat::Text => {
                    if applied.is_empty() {
                        println!("no migrations applied");
                    }
                    for m in applied {
                        println!("{:>3}  {:<40} {}", m.version, m.name, m.applied_at);
                    }
                }
            }
        }
    }

    db.close().await;
    Ok(())
}
