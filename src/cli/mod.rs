//! `taxwise` operator CLI.

pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "taxwise")]
#[command(about = "TaxWise CLI - operator commands for the TaxWise API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply database migrations to DATABASE_URL")]
    Migrate,

    #[command(about = "Mint a bearer token for a user with the configured secret")]
    Token {
        #[arg(help = "User id (UUID)")]
        user_id: String,
        #[arg(long, help = "Token lifetime in hours (defaults to the configured expiry)")]
        hours: Option<u64>,
    },

    #[command(about = "Check the /health endpoint of a running server")]
    Health {
        #[arg(long, help = "Server base URL (defaults to http://localhost:<PORT>)")]
        url: Option<String>,
    },

    #[command(about = "Check the analysis backend health endpoint directly")]
    Agents {
        #[arg(long, help = "Analysis backend URL (defaults to AI_BACKEND_URL)")]
        url: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let config = crate::config::AppConfig::from_env();

    match cli.command {
        Commands::Migrate => commands::database::migrate(&config, output_format).await,
        Commands::Token { user_id, hours } => {
            commands::token::mint(&config, &user_id, hours, output_format)
        }
        Commands::Health { url } => commands::remote::health(&config, url, output_format).await,
        Commands::Agents { url } => commands::remote::agents(&config, url, output_format).await,
    }
}
