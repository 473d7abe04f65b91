use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::database::models::{CibilAnalysis, CreditProfile, NewCibilAnalysis};
use crate::database::repository::CibilRepository;
use crate::database::{Page, Pagination, Store};
use crate::error::ApiError;
use crate::gateway::{
    AnalysisGateway, CibilReport, CibilReportRequest, CreditFigures, ScenarioRequest,
};
use crate::state::AppState;
use crate::types::PaymentHistory;

fn default_age() -> i32 {
    30
}

fn default_income() -> f64 {
    500_000.0
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CibilRequest {
    /// 0 means "no score yet"; anything else must be a real CIBIL score.
    #[serde(default)]
    #[validate(range(min = 0, max = 900))]
    pub current_score: i32,
    #[serde(default)]
    pub payment_history: PaymentHistory,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub credit_cards: i32,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub total_credit_limit: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub current_utilization: f64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub loans: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub missed_payments: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub account_age_months: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub recent_inquiries: i32,
    #[serde(default = "default_age")]
    #[validate(range(min = 18, max = 100))]
    pub age: i32,
    #[serde(default = "default_income")]
    #[validate(range(min = 0.0))]
    pub income: f64,
}

/// Scores between 1 and 299 are not issued by the bureau.
fn check_bureau_score(score: i32) -> Result<(), ApiError> {
    if score != 0 && score < 300 {
        let mut err = ValidationError::new("range");
        err.message = Some("must be 0 or between 300 and 900".into());
        let mut errors = ValidationErrors::new();
        errors.add("currentScore", err);
        return Err(errors.into());
    }
    Ok(())
}

impl CibilRequest {
    fn check_score(&self) -> Result<(), ApiError> {
        check_bureau_score(self.current_score)
    }

    pub fn into_profile(self) -> CreditProfile {
        CreditProfile {
            current_score: self.current_score,
            payment_history: self.payment_history,
            credit_cards: self.credit_cards,
            total_credit_limit: self.total_credit_limit,
            current_utilization: self.current_utilization,
            loans: self.loans,
            missed_payments: self.missed_payments,
            account_age_months: self.account_age_months,
            recent_inquiries: self.recent_inquiries,
            age: self.age,
            income: self.income,
        }
    }
}

fn default_credit_experience() -> String {
    "5+ years".to_string()
}

fn default_goals() -> String {
    "Credit improvement".to_string()
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    #[validate(range(min = 18, max = 100))]
    pub age: i32,
    #[validate(range(min = 0.0))]
    pub income: f64,
    #[validate(range(min = 0, max = 900))]
    pub current_score: i32,
    #[serde(default = "default_credit_experience")]
    #[validate(length(min = 1, max = 100))]
    pub credit_experience: String,
    #[serde(default = "default_goals")]
    #[validate(length(min = 1, max = 500))]
    pub goals: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ScenariosRequest {
    #[validate(length(min = 1, max = 10, message = "between 1 and 10 scenarios"))]
    pub scenarios: Vec<Value>,
}

pub struct CibilService {
    store: Arc<dyn Store>,
    gateway: Arc<dyn AnalysisGateway>,
}

impl CibilService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            gateway: state.gateway.clone(),
        }
    }

    pub async fn analyze(&self, user_id: Uuid, request: CibilRequest) -> Result<CibilAnalysis, ApiError> {
        request.check_score()?;
        let profile = request.into_profile();
        let result = self
            .gateway
            .analyze_cibil(&CreditFigures::from(&profile))
            .await?;

        let record = NewCibilAnalysis {
            profile,
            analysis: result.cibil_analysis,
            response_source: result.response_source,
            session_id: result.session_id,
        }
        .into_record(user_id);
        let stored = self.store.insert_cibil_analysis(record).await?;

        info!(
            %user_id,
            analysis_id = %stored.id,
            score = stored.profile.current_score,
            "CIBIL analysis stored"
        );
        Ok(stored)
    }

    pub async fn list(&self, user_id: Uuid, page: Pagination) -> Result<Page<CibilAnalysis>, ApiError> {
        Ok(self.store.list_cibil_analyses(user_id, page).await?)
    }

    pub async fn latest(&self, user_id: Uuid) -> Result<CibilAnalysis, ApiError> {
        self.store
            .latest_cibil_analysis(user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("No CIBIL analyses found"))
    }

    pub async fn scenarios(&self, request: ScenariosRequest) -> Result<Value, ApiError> {
        let upstream = ScenarioRequest {
            scenarios: request.scenarios,
        };
        Ok(self.gateway.cibil_scenarios(&upstream).await?)
    }

    /// 90-day improvement plan for the submitted profile. Not stored.
    pub async fn report(&self, user_id: Uuid, request: ReportRequest) -> Result<CibilReport, ApiError> {
        check_bureau_score(request.current_score)?;
        let upstream = CibilReportRequest {
            age: request.age,
            income: request.income,
            current_score: request.current_score,
            credit_experience: request.credit_experience,
            goals: request.goals,
        };
        let report = self.gateway.cibil_report(&upstream).await?;
        info!(%user_id, score = upstream.current_score, "CIBIL report generated");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate_value;
    use serde_json::json;

    #[test]
    fn empty_request_uses_defaults() {
        let request: CibilRequest = validate_value(json!({})).unwrap();
        assert!(request.check_score().is_ok());
        let profile = request.into_profile();
        assert_eq!(profile.current_score, 0);
        assert_eq!(profile.payment_history, PaymentHistory::Unknown);
        assert_eq!(profile.age, 30);
        assert_eq!(profile.income, 500_000.0);
    }

    #[test]
    fn scores_below_bureau_range_are_rejected() {
        let request: CibilRequest = validate_value(json!({"currentScore": 120})).unwrap();
        assert_eq!(request.check_score().unwrap_err().status_code(), 400);
        assert!(validate_value::<CibilRequest>(json!({"currentScore": 950})).is_err());
    }

    #[test]
    fn utilization_is_a_percentage() {
        assert!(validate_value::<CibilRequest>(json!({"currentUtilization": 140})).is_err());
        assert!(validate_value::<CibilRequest>(json!({"paymentHistory": "stellar"})).is_err());
    }

    #[test]
    fn report_requests_fill_in_defaults() {
        let request: ReportRequest =
            validate_value(json!({"age": 29, "income": 700000, "currentScore": 690})).unwrap();
        assert_eq!(request.credit_experience, "5+ years");
        assert_eq!(request.goals, "Credit improvement");
        assert!(validate_value::<ReportRequest>(json!({"age": 29, "income": 700000})).is_err());
        assert!(check_bureau_score(42).is_err());
    }

    #[test]
    fn scenario_batches_are_bounded() {
        assert!(validate_value::<ScenariosRequest>(json!({"scenarios": []})).is_err());
        let many: Vec<Value> = (0..11).map(|i| json!({"id": i})).collect();
        assert!(validate_value::<ScenariosRequest>(json!({ "scenarios": many })).is_err());
    }
}
