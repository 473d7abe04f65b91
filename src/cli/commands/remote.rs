use anyhow::Context;
use serde_json::Value;

use crate::cli::{
    utils::{output_error, output_success},
    OutputFormat,
};
use crate::config::AppConfig;
use crate::gateway::{AnalysisGateway, HttpGateway};

/// Calls `/health` on a running API server.
pub async fn health(
    config: &AppConfig,
    url: Option<String>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let base = url.unwrap_or_else(|| format!("http://localhost:{}", config.server.port));
    let endpoint = url::Url::parse(&base)
        .and_then(|u| u.join("/health"))
        .with_context(|| format!("invalid server URL '{base}'"))?;

    let response = reqwest::get(endpoint.clone())
        .await
        .with_context(|| format!("requesting {endpoint}"))?;
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    if status.is_success() {
        output_success(output_format, &format!("{endpoint} is healthy"), Some(body))
    } else {
        output_error(output_format, &format!("{endpoint} returned {status}"))?;
        anyhow::bail!("server unhealthy")
    }
}

/// Calls the analysis backend health endpoint without going through the API.
pub async fn agents(
    config: &AppConfig,
    url: Option<String>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let base = url.unwrap_or_else(|| config.gateway.base_url.clone());
    let gateway = HttpGateway::new(reqwest::Client::new(), &base)
        .with_context(|| format!("invalid analysis backend URL '{base}'"))?;

    match gateway.health().await {
        Ok(health) => output_success(
            output_format,
            &format!("Analysis backend at {base} is {}", health.status),
            Some(serde_json::to_value(&health)?),
        ),
        Err(e) => {
            output_error(output_format, &e.to_string())?;
            Err(e.into())
        }
    }
}
