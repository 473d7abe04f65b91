use anyhow::Context;

use crate::cli::{utils::output_success, OutputFormat};
use crate::config::AppConfig;
use crate::database::DatabaseManager;

pub async fn migrate(config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let manager = DatabaseManager::connect(&config.database)
        .await
        .context("connecting to DATABASE_URL")?;
    let result = manager.run_migrations().await;
    manager.close().await;
    result.context("applying migrations")?;
    output_success(output_format, "Database migrations applied", None)
}
