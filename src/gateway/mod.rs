//! Client side of the external analysis backend.

pub mod client;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use client::HttpGateway;
pub use types::*;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The backend could not be reached at all.
    #[error("Analysis backend unreachable: {0}")]
    Unreachable(String),

    /// The backend answered with a non-2xx status.
    #[error("Analysis backend returned {status}: {detail}")]
    Upstream { status: u16, detail: String },

    /// The backend answered 2xx with a body that does not match the contract.
    #[error("Unexpected response from analysis backend: {0}")]
    Decode(String),

    /// The backend answered 2xx but reported `status != "success"`.
    #[error("Analysis backend rejected the request: {0}")]
    Rejected(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Operations the API forwards to the analysis backend. One call, one
/// upstream request; no retries.
#[async_trait]
pub trait AnalysisGateway: Send + Sync {
    async fn calculate_tax(&self, figures: &UpstreamTaxFigures) -> GatewayResult<TaxCalculationResult>;
    async fn optimize_tax(&self, request: &TaxOptimizationRequest) -> GatewayResult<TaxStrategy>;
    async fn tax_query(&self, request: &TaxQueryRequest) -> GatewayResult<TaxQueryAnswer>;
    async fn analyze_cibil(&self, figures: &CreditFigures) -> GatewayResult<CibilResult>;
    async fn cibil_scenarios(&self, request: &ScenarioRequest) -> GatewayResult<Value>;
    async fn cibil_report(&self, request: &CibilReportRequest) -> GatewayResult<CibilReport>;
    async fn analyze_document(&self, upload: DocumentUpload) -> GatewayResult<DocumentAnalysisResult>;
    async fn chat(&self, request: &ChatRequest) -> GatewayResult<ChatReply>;
    async fn chat_insights(&self, request: &InsightsRequest) -> GatewayResult<ChatInsights>;
    async fn health(&self) -> GatewayResult<GatewayHealth>;
}
