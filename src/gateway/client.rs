use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::types::*;
use super::{AnalysisGateway, GatewayError, GatewayResult};
use crate::config::GatewayConfig;

/// `AnalysisGateway` over HTTP. Cheap to clone; the inner client pools connections.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(client: Client, base_url: &str) -> Result<Self, url::ParseError> {
        let mut base_url = Url::parse(base_url)?;
        // Relative joins below must keep any path prefix on the base.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, url::ParseError> {
        Self::new(Client::new(), &config.base_url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> GatewayResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| GatewayError::Unreachable(format!("invalid endpoint {path}: {e}")))
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> GatewayResult<Value> {
        debug!(endpoint = path, "Forwarding to analysis backend");

        let response = request.send().await.map_err(|e| {
            warn!(endpoint = path, error = %e, "Analysis backend unreachable");
            GatewayError::Unreachable(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            let detail = error_detail(status, &body);
            warn!(endpoint = path, status = status.as_u16(), %detail, "Analysis backend error");
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                detail,
            });
        }

        serde_json::from_str(&body).map_err(|e| GatewayError::Decode(format!("{path}: {e}")))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> GatewayResult<T> {
        let url = self.endpoint(path)?;
        let value = self.send(path, self.client.get(url)).await?;
        decode(path, value)
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(&self, path: &str, body: &B) -> GatewayResult<T> {
        let url = self.endpoint(path)?;
        let value = self.send(path, self.client.post(url).json(body)).await?;
        decode(path, value)
    }
}

fn decode<T: DeserializeOwned>(path: &str, value: Value) -> GatewayResult<T> {
    serde_json::from_value(value).map_err(|e| GatewayError::Decode(format!("{path}: {e}")))
}

/// Fails with `Rejected` unless the body carries `status: "success"`.
fn require_success(path: &str, value: &Value) -> GatewayResult<()> {
    let envelope: StatusEnvelope = decode(path, value.clone())?;
    if envelope.status == "success" {
        return Ok(());
    }
    Err(GatewayError::Rejected(
        envelope
            .message
            .unwrap_or_else(|| format!("status '{}'", envelope.status)),
    ))
}

/// Best human-readable reason from an error body: FastAPI's `detail`, then
/// `error` or `message`, then the raw text.
pub(crate) fn error_detail(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["detail", "error", "message"] {
            match map.get(key) {
                Some(Value::String(s)) => return s.clone(),
                Some(Value::Null) | None => continue,
                Some(other) => return other.to_string(),
            }
        }
    }
    let text = body.trim();
    if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown upstream error")
            .to_string()
    } else {
        text.to_string()
    }
}

#[async_trait]
impl AnalysisGateway for HttpGateway {
    async fn calculate_tax(&self, figures: &UpstreamTaxFigures) -> GatewayResult<TaxCalculationResult> {
        const PATH: &str = "/api/calculate-tax";
        let url = self.endpoint(PATH)?;
        let value = self.send(PATH, self.client.post(url).json(figures)).await?;
        require_success(PATH, &value)?;
        decode(PATH, value)
    }

    async fn optimize_tax(&self, request: &TaxOptimizationRequest) -> GatewayResult<TaxStrategy> {
        const PATH: &str = "/api/optimize-tax";
        let url = self.endpoint(PATH)?;
        let value = self.send(PATH, self.client.post(url).json(request)).await?;
        require_success(PATH, &value)?;
        decode(PATH, value)
    }

    async fn tax_query(&self, request: &TaxQueryRequest) -> GatewayResult<TaxQueryAnswer> {
        const PATH: &str = "/api/tax-query";
        let url = self.endpoint(PATH)?;
        let value = self.send(PATH, self.client.post(url).json(request)).await?;
        require_success(PATH, &value)?;
        decode(PATH, value)
    }

    async fn analyze_cibil(&self, figures: &CreditFigures) -> GatewayResult<CibilResult> {
        const PATH: &str = "/api/analyze-cibil";
        let url = self.endpoint(PATH)?;
        let value = self.send(PATH, self.client.post(url).json(figures)).await?;
        require_success(PATH, &value)?;
        decode(PATH, value)
    }

    async fn cibil_scenarios(&self, request: &ScenarioRequest) -> GatewayResult<Value> {
        self.post("/api/cibil-scenarios", request).await
    }

    async fn cibil_report(&self, request: &CibilReportRequest) -> GatewayResult<CibilReport> {
        const PATH: &str = "/api/cibil-report";
        let url = self.endpoint(PATH)?;
        let value = self.send(PATH, self.client.post(url).json(request)).await?;
        require_success(PATH, &value)?;
        decode(PATH, value)
    }

    async fn analyze_document(&self, upload: DocumentUpload) -> GatewayResult<DocumentAnalysisResult> {
        const PATH: &str = "/api/analyze-financial-data";
        let url = self.endpoint(PATH)?;
        let part = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.mime_type)
            .map_err(|e| GatewayError::Unreachable(format!("invalid MIME type: {e}")))?;
        let form = Form::new().part("file", part);

        let raw = self.send(PATH, self.client.post(url).multipart(form)).await?;
        let extraction = decode(PATH, raw.clone())?;
        Ok(DocumentAnalysisResult { extraction, raw })
    }

    async fn chat(&self, request: &ChatRequest) -> GatewayResult<ChatReply> {
        self.post("/api/chatbot/chat", request).await
    }

    async fn chat_insights(&self, request: &InsightsRequest) -> GatewayResult<ChatInsights> {
        self.post("/api/chatbot/insights", request).await
    }

    async fn health(&self) -> GatewayResult<GatewayHealth> {
        self.get("/api/health").await
    }
}
