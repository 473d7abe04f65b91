use anyhow::Context;
use serde_json::json;
use uuid::Uuid;

use crate::auth::generate_jwt;
use crate::cli::{utils::output_success, OutputFormat};
use crate::config::AppConfig;

pub fn mint(
    config: &AppConfig,
    user_id: &str,
    hours: Option<u64>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let user_id = Uuid::parse_str(user_id).context("user id must be a UUID")?;
    let mut security = config.security.clone();
    if let Some(hours) = hours {
        security.jwt_expiry_hours = hours;
    }
    let token = generate_jwt(user_id, &security)?;
    output_success(
        output_format,
        &format!("Token for {user_id} valid for {} hours", security.jwt_expiry_hours),
        Some(json!({ "token": token })),
    )
}
