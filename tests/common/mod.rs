#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use tower::ServiceExt;

use taxwise_api::config::AppConfig;
use taxwise_api::database::manager::DatabaseError;
use taxwise_api::database::models::*;
use taxwise_api::database::repository::*;
use taxwise_api::database::{MemoryStore, Page, Pagination};
use taxwise_api::gateway::*;
use taxwise_api::state::AppState;
use uuid::Uuid;

pub fn extraction_json(annual_income: f64, confidence: f64) -> Value {
    json!({
        "tax_agent_format": {
            "annual_income": annual_income,
            "investments_80c": 200000,
            "health_insurance": 12000,
            "home_loan_interest": 0,
            "hra_claimed": 0,
            "other_deductions": {}
        },
        "cibil_agent_format": {
            "current_score": 0,
            "payment_history": "unknown",
            "credit_cards": 1,
            "total_credit_limit": 100000,
            "current_utilization": 20,
            "loans": 0,
            "missed_payments": 0,
            "account_age_months": 0,
            "recent_inquiries": 0,
            "age": 30,
            "income": annual_income
        },
        "financial_summary": {
            "document_type": "bank_statement",
            "confidence_level": confidence,
            "processing_notes": "parsed 12 rows",
            "ready_for_tax_analysis": true,
            "ready_for_cibil_analysis": false
        },
        "ai_insights": "Salary credits are regular.",
        "enhanced_analysis": {
            "tax_analysis": {"calculations": {"tax_planning_tips": ["Top up ELSS before March"]}},
            "analysis_ready": {"tax_ready": true, "cibil_ready": false}
        }
    })
}

pub fn tax_result_json() -> Value {
    json!({
        "status": "success",
        "calculations": {
            "old_regime": {"taxable_income": 700000, "total_tax": 54600, "effectiveRate": 6.1, "recommended": false},
            "new_regime": {"taxable_income": 825000, "total_tax": 44200, "effectiveRate": 4.9, "recommended": true},
            "comparison": {
                "optimal_regime": "new",
                "tax_savings": 10400,
                "savings_percentage": 19.0,
                "recommendation_reason": "Lower tax under the new regime"
            },
            "tax_planning_tips": ["Claim NPS under 80CCD(1B)"]
        },
        "response_source": "stub"
    })
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> GatewayResult<T> {
    serde_json::from_value(value).map_err(|e| GatewayError::Decode(e.to_string()))
}

/// Scripted analysis backend that records what it was sent.
pub struct StubGateway {
    pub extraction: Mutex<Value>,
    pub fail_documents: AtomicBool,
    pub fail_health: AtomicBool,
    pub tax_requests: Mutex<Vec<UpstreamTaxFigures>>,
    pub optimize_requests: Mutex<Vec<TaxOptimizationRequest>>,
    pub tax_queries: Mutex<Vec<TaxQueryRequest>>,
    pub cibil_requests: Mutex<Vec<CreditFigures>>,
    pub report_requests: Mutex<Vec<CibilReportRequest>>,
    pub uploads: Mutex<Vec<DocumentUpload>>,
    pub chat_requests: Mutex<Vec<ChatRequest>>,
    pub insight_requests: Mutex<Vec<InsightsRequest>>,
}

impl Default for StubGateway {
    fn default() -> Self {
        Self {
            extraction: Mutex::new(extraction_json(850_000.0, 82.0)),
            fail_documents: AtomicBool::new(false),
            fail_health: AtomicBool::new(false),
            tax_requests: Mutex::default(),
            optimize_requests: Mutex::default(),
            tax_queries: Mutex::default(),
            cibil_requests: Mutex::default(),
            report_requests: Mutex::default(),
            uploads: Mutex::default(),
            chat_requests: Mutex::default(),
            insight_requests: Mutex::default(),
        }
    }
}

#[async_trait]
impl AnalysisGateway for StubGateway {
    async fn calculate_tax(&self, figures: &UpstreamTaxFigures) -> GatewayResult<TaxCalculationResult> {
        self.tax_requests.lock().unwrap().push(figures.clone());
        decode(tax_result_json())
    }

    async fn optimize_tax(&self, request: &TaxOptimizationRequest) -> GatewayResult<TaxStrategy> {
        self.optimize_requests.lock().unwrap().push(request.clone());
        decode(json!({"strategy": {"recommended": ["ELSS", "NPS"]}, "timestamp": "2024-06-01T00:00:00"}))
    }

    async fn tax_query(&self, request: &TaxQueryRequest) -> GatewayResult<TaxQueryAnswer> {
        self.tax_queries.lock().unwrap().push(request.clone());
        decode(json!({
            "status": "success",
            "question": request.question,
            "response": {"new_regime": {"total_tax": 44200}},
            "note": "This is a basic calculation.",
            "timestamp": "2024-06-01T00:00:00"
        }))
    }

    async fn analyze_cibil(&self, figures: &CreditFigures) -> GatewayResult<CibilResult> {
        self.cibil_requests.lock().unwrap().push(figures.clone());
        decode(json!({
            "status": "success",
            "response_source": "stub",
            "session_id": "s-1",
            "cibil_analysis": {"summary": "Keep utilisation under 30%"}
        }))
    }

    async fn cibil_scenarios(&self, request: &ScenarioRequest) -> GatewayResult<Value> {
        Ok(json!({"projections": request.scenarios.len()}))
    }

    async fn cibil_report(&self, request: &CibilReportRequest) -> GatewayResult<CibilReport> {
        self.report_requests.lock().unwrap().push(request.clone());
        decode(json!({
            "status": "success",
            "timestamp": "2024-06-01T00:00:00",
            "response_source": "stub",
            "session_id": "r-1",
            "cibil_report": "Week 1: pay every card in full."
        }))
    }

    async fn analyze_document(&self, upload: DocumentUpload) -> GatewayResult<DocumentAnalysisResult> {
        self.uploads.lock().unwrap().push(upload);
        if self.fail_documents.load(Ordering::SeqCst) {
            return Err(GatewayError::Upstream {
                status: 502,
                detail: "OCR engine crashed".to_string(),
            });
        }
        let raw = self.extraction.lock().unwrap().clone();
        let extraction = decode(raw.clone())?;
        Ok(DocumentAnalysisResult { extraction, raw })
    }

    async fn chat(&self, request: &ChatRequest) -> GatewayResult<ChatReply> {
        self.chat_requests.lock().unwrap().push(request.clone());
        decode(json!({
            "success": true,
            "response": format!("You asked: {}", request.message),
            "query_type": "tax",
            "agents_used": ["tax_agent"],
            "timestamp": "2024-06-01T00:00:00"
        }))
    }

    async fn chat_insights(&self, request: &InsightsRequest) -> GatewayResult<ChatInsights> {
        self.insight_requests.lock().unwrap().push(request.clone());
        decode(json!({
            "success": true,
            "insights": {"headline": "On track"},
            "timestamp": "2024-06-01T00:00:00",
            "focus_areas": request.focus_areas.clone().unwrap_or_default()
        }))
    }

    async fn health(&self) -> GatewayResult<GatewayHealth> {
        if self.fail_health.load(Ordering::SeqCst) {
            return Err(GatewayError::Unreachable("connection refused".to_string()));
        }
        decode(json!({
            "status": "healthy",
            "agents": {"tax_agent_ready": true, "cibil_agent_ready": true, "data_ingestion_agent_ready": true},
            "configuration": {}
        }))
    }
}

/// `MemoryStore` whose `record_analysis` always fails, as a lost database
/// connection would after the document was marked `processing`.
pub struct FailingAnalysisStore {
    pub inner: Arc<MemoryStore>,
}

#[async_trait]
impl UserRepository for FailingAnalysisStore {
    async fn insert_user(&self, user: User) -> DbResult<User> {
        self.inner.insert_user(user).await
    }
    async fn find_user(&self, id: Uuid) -> DbResult<Option<User>> {
        self.inner.find_user(id).await
    }
    async fn find_user_by_email(&self, email: &str) -> DbResult<Option<User>> {
        self.inner.find_user_by_email(email).await
    }
    async fn update_user(&self, user: User) -> DbResult<User> {
        self.inner.update_user(user).await
    }
}

#[async_trait]
impl OnboardingRepository for FailingAnalysisStore {
    async fn find_onboarding(&self, user_id: Uuid) -> DbResult<Option<OnboardingData>> {
        self.inner.find_onboarding(user_id).await
    }
    async fn save_onboarding(&self, data: OnboardingData) -> DbResult<OnboardingData> {
        self.inner.save_onboarding(data).await
    }
}

#[async_trait]
impl DocumentRepository for FailingAnalysisStore {
    async fn insert_documents(
        &self,
        documents: Vec<FinancialDocument>,
    ) -> DbResult<Vec<FinancialDocument>> {
        self.inner.insert_documents(documents).await
    }
    async fn list_documents(
        &self,
        user_id: Uuid,
        filter: DocumentFilter,
        page: Pagination,
    ) -> DbResult<Page<FinancialDocument>> {
        self.inner.list_documents(user_id, filter, page).await
    }
    async fn all_documents(&self, user_id: Uuid) -> DbResult<Vec<FinancialDocument>> {
        self.inner.all_documents(user_id).await
    }
    async fn find_document(
        &self,
        user_id: Uuid,
        id: Uuid,
        include_content: bool,
    ) -> DbResult<Option<FinancialDocument>> {
        self.inner.find_document(user_id, id, include_content).await
    }
    async fn list_analyses(&self, user_id: Uuid, document_id: Uuid) -> DbResult<Vec<DocumentAnalysis>> {
        self.inner.list_analyses(user_id, document_id).await
    }
    async fn latest_analysis(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> DbResult<Option<DocumentAnalysis>> {
        self.inner.latest_analysis(user_id, document_id).await
    }
    async fn delete_document(&self, user_id: Uuid, id: Uuid) -> DbResult<bool> {
        self.inner.delete_document(user_id, id).await
    }
    async fn mark_processing(&self, user_id: Uuid, id: Uuid) -> DbResult<FinancialDocument> {
        self.inner.mark_processing(user_id, id).await
    }
    async fn mark_error(&self, user_id: Uuid, id: Uuid, error: &str) -> DbResult<()> {
        self.inner.mark_error(user_id, id, error).await
    }
    async fn record_analysis(
        &self,
        _user_id: Uuid,
        _document_id: Uuid,
        _analysis: NewDocumentAnalysis,
    ) -> DbResult<(FinancialDocument, DocumentAnalysis)> {
        Err(DatabaseError::Sqlx(sqlx::Error::Protocol(
            "connection reset while writing analysis".to_string(),
        )))
    }
}

#[async_trait]
impl TaxInputRepository for FailingAnalysisStore {
    async fn find_active_tax_input(&self, user_id: Uuid) -> DbResult<Option<TaxInput>> {
        self.inner.find_active_tax_input(user_id).await
    }
    async fn replace_active_tax_input(&self, input: TaxInput, overwrite: bool) -> DbResult<TaxInput> {
        self.inner.replace_active_tax_input(input, overwrite).await
    }
    async fn update_active_tax_input(&self, user_id: Uuid, update: &TaxInputUpdate) -> DbResult<TaxInput> {
        self.inner.update_active_tax_input(user_id, update).await
    }
    async fn deactivate_tax_input(&self, user_id: Uuid) -> DbResult<bool> {
        self.inner.deactivate_tax_input(user_id).await
    }
}

#[async_trait]
impl CibilRepository for FailingAnalysisStore {
    async fn insert_cibil_analysis(&self, analysis: CibilAnalysis) -> DbResult<CibilAnalysis> {
        self.inner.insert_cibil_analysis(analysis).await
    }
    async fn list_cibil_analyses(&self, user_id: Uuid, page: Pagination) -> DbResult<Page<CibilAnalysis>> {
        self.inner.list_cibil_analyses(user_id, page).await
    }
    async fn latest_cibil_analysis(&self, user_id: Uuid) -> DbResult<Option<CibilAnalysis>> {
        self.inner.latest_cibil_analysis(user_id).await
    }
}

#[async_trait]
impl SnapshotRepository for FailingAnalysisStore {
    async fn replace_active_snapshot(&self, snapshot: DashboardSnapshot) -> DbResult<DashboardSnapshot> {
        self.inner.replace_active_snapshot(snapshot).await
    }
    async fn find_active_snapshot(&self, user_id: Uuid) -> DbResult<Option<DashboardSnapshot>> {
        self.inner.find_active_snapshot(user_id).await
    }
    async fn list_snapshots(&self, user_id: Uuid, page: Pagination) -> DbResult<Page<DashboardSnapshot>> {
        self.inner.list_snapshots(user_id, page).await
    }
}

#[async_trait]
impl ChatRepository for FailingAnalysisStore {
    async fn append_chat_turns(&self, turns: Vec<ChatTurn>) -> DbResult<()> {
        self.inner.append_chat_turns(turns).await
    }
    async fn list_chat_turns(&self, user_id: Uuid, limit: u32) -> DbResult<Vec<ChatTurn>> {
        self.inner.list_chat_turns(user_id, limit).await
    }
    async fn clear_chat_turns(&self, user_id: Uuid) -> DbResult<u64> {
        self.inner.clear_chat_turns(user_id).await
    }
}

#[async_trait]
impl Store for FailingAnalysisStore {
    async fn health_check(&self) -> DbResult<()> {
        self.inner.health_check().await
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<StubGateway>,
    pub config: AppConfig,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::over(store.clone(), store)
    }

    /// An app whose analysis writes fail; `store` still exposes the rows.
    pub fn with_failing_analysis_store() -> Self {
        let store = Arc::new(MemoryStore::new());
        let failing = Arc::new(FailingAnalysisStore {
            inner: store.clone(),
        });
        Self::over(store, failing)
    }

    fn over(store: Arc<MemoryStore>, backend: Arc<dyn Store>) -> Self {
        let mut config = AppConfig::development();
        config.security.bcrypt_cost = 4;
        let gateway = Arc::new(StubGateway::default());
        let state = AppState::new(config.clone(), backend, gateway.clone());
        Self {
            router: taxwise_api::app(state),
            store,
            gateway,
            config,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, path, Some(token), None).await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, path, Some(token), Some(body)).await
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, path, Some(token), Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, path, Some(token), None).await
    }

    /// Registers a fresh account and returns its bearer token.
    pub async fn register(&self, email: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({"email": email, "password": "correct-horse", "name": "Test User"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }

    /// Uploads one small CSV and returns its id.
    pub async fn upload_csv(&self, token: &str, file_name: &str) -> String {
        let bytes = b"date,amount\n2024-04-01,85000\n";
        let (status, body) = self
            .post(
                "/api/documents/upload",
                token,
                json!({"files": [csv_file(file_name, bytes)]}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "upload failed: {body}");
        body["data"][0]["id"].as_str().unwrap().to_string()
    }
}

pub fn csv_file(file_name: &str, bytes: &[u8]) -> Value {
    json!({
        "fileName": file_name,
        "fileType": "text/csv",
        "fileSize": bytes.len(),
        "content": STANDARD.encode(bytes)
    })
}
