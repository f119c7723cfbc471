use clap::Subcommand;
use serde_json::json;

use crate::auth;
use crate::cli::OutputFormat;
use crate::config::AppConfig;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Issue a signed bearer token for a user")]
    Token {
        #[arg(long, help = "User id to embed in the token")]
        user_id: i64,

        #[arg(long, default_value_t = 24, help = "Token lifetime in hours")]
        ttl_hours: i64,
    },
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = AppConfig::from_env();

    match cmd {
        AuthCommands::Token { user_id, ttl_hours } => {
            let secret = config
                .identity
                .jwt_secret
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("FOLIO_JWT_SECRET is not set"))?;

            let token = auth::issue_token(user_id, secret, ttl_hours)?;

            match output_format {
                OutputFormat::Json => println!("{}", json!({ "token": token })),
                OutputFormat::Text => println!("{}", token),
            }
        }
    }

    Ok(())
}
