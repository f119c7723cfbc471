use chrono::NaiveDate;
use clap::Subcommand;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::db::{Identity, PoolManager, SchemaManager, Store};
use crate::domain::snapshots;

#[derive(Subcommand)]
pub enum SnapshotCommands {
    #[command(about = "Compute snapshots for every portfolio owned by a user")]
    Run {
        #[arg(long, help = "User to run snapshots for")]
        user_id: i64,

        #[arg(long, help = "Snapshot date (YYYY-MM-DD), defaults to today")]
        date: Option<NaiveDate>,
    },
}

pub async fn handle(cmd: SnapshotCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    let db = PoolManager::connect(&config.database)?;

    match cmd {
        SnapshotCommands::Run { user_id, date } => {
            let manager = SchemaManager::new(config.environment);
            manager.ensure_ready(&db.pool()).await?;

            let store = Store::new(db.pool()).scoped(Identity(user_id));
            let date = date.unwrap_or_else(|| chrono::Utc::now().date_naive());
            let run = snapshots::run_for_date(&store, date).await?;

            match output_format {
                OutputFormat::Json => println!(
                    "{}",
                    json!({
                        "snapshot_date": run.snapshot_date,
                        "portfolios": run.portfolios,
                        "investments": run.investments,
                    })
                ),
                OutputFormat::Text => println!(
                    "snapshots for {}: {} portfolios, {} investments",
                    run.snapshot_date, run.portfolios, run.investments
                ),
            }
        }
    }

    db.close().await;
    Ok(())
}
