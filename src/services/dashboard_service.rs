//! Dashboard aggregation: folds the user's stored records and the gateway's
//! health into one view, optionally frozen as a snapshot.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::database::models::tax_input::caps;
use crate::database::models::{
    AgentHealth, CibilAnalysis, CreditInsights, DashboardSnapshot, DashboardSource, DashboardView,
    DocumentInsights, FinancialDocument, FinancialSummary, OnboardingData, TaxInput, TaxInsights,
};
use crate::database::repository::*;
use crate::database::{Page, Pagination, Store};
use crate::error::ApiError;
use crate::gateway::{AnalysisGateway, GatewayHealth, GatewayResult};
use crate::state::AppState;
use crate::types::{DocumentStatus, ScoreBand};

#[derive(Debug, Default, Deserialize, Validate)]
pub struct DashboardQuery {
    #[serde(default)]
    pub refresh: bool,
}

pub fn financial_summary(
    tax_input: Option<&TaxInput>,
    onboarding: Option<&OnboardingData>,
) -> FinancialSummary {
    let onboarding_income = onboarding
        .and_then(|o| o.financial_info.as_ref())
        .and_then(|info| info.get("annualIncome"))
        .and_then(|v| v.as_f64());

    FinancialSummary {
        annual_income: tax_input
            .map(|t| t.figures.annual_income)
            .or(onboarding_income)
            .unwrap_or(0.0),
        total_deductions: tax_input.map_or(0.0, |t| t.figures.total_deductions()),
        onboarding_completed: onboarding.map_or(false, |o| o.is_completed),
        onboarding_progress: onboarding.map_or(0, OnboardingData::progress_percent),
    }
}

pub fn tax_insights(tax_input: Option<&TaxInput>) -> TaxInsights {
    let Some(input) = tax_input else {
        return TaxInsights {
            section_80c_remaining: caps::SECTION_80C,
            ..Default::default()
        };
    };
    let used = input.figures.section_80c;
    let calculation = input.last_calculation.as_ref();
    TaxInsights {
        has_tax_inputs: true,
        financial_year: Some(input.financial_year.clone()),
        section_80c_used: used,
        section_80c_remaining: input.figures.remaining_80c(),
        section_80c_utilization: (used / caps::SECTION_80C * 100.0).min(100.0),
        recommended_regime: calculation.map(|c| c.optimal_regime),
        potential_savings: calculation.map(|c| c.tax_savings),
        last_calculated_at: calculation.map(|c| c.calculated_at),
    }
}

pub fn credit_insights(latest: Option<&CibilAnalysis>, analyses_count: u64) -> CreditInsights {
    match latest {
        Some(analysis) => CreditInsights {
            latest_score: Some(analysis.profile.current_score),
            utilization: Some(analysis.profile.current_utilization),
            score_band: ScoreBand::from_score(analysis.profile.current_score),
            analyses_count,
            last_analyzed_at: Some(analysis.created_at),
        },
        None => CreditInsights {
            analyses_count,
            ..Default::default()
        },
    }
}

pub fn document_insights(documents: &[FinancialDocument]) -> DocumentInsights {
    let mut insights = DocumentInsights::default();
    for doc in documents {
        insights.total += 1;
        match doc.status {
            DocumentStatus::Uploaded => insights.uploaded += 1,
            DocumentStatus::Processing => insights.processing += 1,
            DocumentStatus::Processed => insights.processed += 1,
            DocumentStatus::Error => insights.errored += 1,
        }
        if doc.tax_analysis_ready {
            insights.tax_ready += 1;
        }
        if doc.cibil_analysis_ready {
            insights.cibil_ready += 1;
        }
        *insights
            .by_type
            .entry(doc.document_type.as_str().to_string())
            .or_insert(0) += 1;
        if insights.latest_upload_at.map_or(true, |t| doc.uploaded_at > t) {
            insights.latest_upload_at = Some(doc.uploaded_at);
        }
    }
    insights
}

/// Gateway failures degrade to an `unavailable` entry instead of failing the dashboard.
pub fn agent_health(result: GatewayResult<GatewayHealth>) -> AgentHealth {
    match result {
        Ok(health) => AgentHealth {
            status: health.status,
            tax_agent_ready: health.agents.tax_agent_ready,
            cibil_agent_ready: health.agents.cibil_agent_ready,
            data_ingestion_agent_ready: health.agents.data_ingestion_agent_ready,
            checked_at: Utc::now(),
            error: None,
        },
        Err(err) => {
            warn!(error = %err, "Analysis backend health check failed");
            AgentHealth::unavailable(err.to_string())
        }
    }
}

pub struct DashboardService {
    store: Arc<dyn Store>,
    gateway: Arc<dyn AnalysisGateway>,
}

impl DashboardService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            gateway: state.gateway.clone(),
        }
    }

    /// The active snapshot, unless there is none or a refresh is requested.
    pub async fn get(&self, user_id: Uuid, query: DashboardQuery) -> Result<DashboardView, ApiError> {
        if !query.refresh {
            if let Some(snapshot) = self.store.find_active_snapshot(user_id).await? {
                return Ok(snapshot.to_view());
            }
        }
        self.live(user_id).await
    }

    pub async fn live(&self, user_id: Uuid) -> Result<DashboardView, ApiError> {
        let tax_input = self.store.find_active_tax_input(user_id).await?;
        let onboarding = self.store.find_onboarding(user_id).await?;
        let latest_cibil = self.store.latest_cibil_analysis(user_id).await?;
        let cibil_count = self
            .store
            .list_cibil_analyses(user_id, Pagination::new(1, 1))
            .await?
            .pagination
            .total;
        let documents = self.store.all_documents(user_id).await?;
        let health = self.gateway.health().await;

        Ok(DashboardView {
            financial_summary: financial_summary(tax_input.as_ref(), onboarding.as_ref()),
            tax_insights: tax_insights(tax_input.as_ref()),
            credit_insights: credit_insights(latest_cibil.as_ref(), cibil_count),
            document_insights: document_insights(&documents),
            agent_health: agent_health(health),
            generated_at: Utc::now(),
            source: DashboardSource::Live,
        })
    }

    pub async fn create_snapshot(&self, user_id: Uuid) -> Result<DashboardSnapshot, ApiError> {
        let view = self.live(user_id).await?;
        let snapshot = self
            .store
            .replace_active_snapshot(DashboardSnapshot::from_view(user_id, view))
            .await?;
        info!(%user_id, snapshot_id = %snapshot.id, "Dashboard snapshot created");
        Ok(snapshot)
    }

    pub async fn snapshots(
        &self,
        user_id: Uuid,
        page: Pagination,
    ) -> Result<Page<DashboardSnapshot>, ApiError> {
        Ok(self.store.list_snapshots(user_id, page).await?)
    }

    /// Direct health check; unlike the dashboard, a failure is an error here.
    pub async fn agents_health(&self) -> Result<GatewayHealth, ApiError> {
        Ok(self.gateway.health().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{NewDocument, NewTaxInput, TaxFigures};
    use crate::gateway::GatewayError;
    use crate::types::{DocumentType, OnboardingStep};
    use serde_json::json;

    fn tax_input(income: f64, section_80c: f64) -> TaxInput {
        NewTaxInput {
            financial_year: "2024-25".to_string(),
            figures: TaxFigures {
                annual_income: income,
                section_80c,
                section_80d: 10_000.0,
                ..Default::default()
            },
            preferred_regime: Default::default(),
            source_document_id: None,
        }
        .into_record(Uuid::new_v4())
    }

    #[test]
    fn income_prefers_tax_inputs_over_onboarding() {
        let mut onboarding = OnboardingData::not_started(Uuid::new_v4());
        onboarding.financial_info = Some(json!({"annualIncome": 700000.0}));
        onboarding.completed_steps.push(OnboardingStep::PersonalInfo);

        let summary = financial_summary(None, Some(&onboarding));
        assert_eq!(summary.annual_income, 700_000.0);
        assert_eq!(summary.onboarding_progress, 25);

        let input = tax_input(1_200_000.0, 50_000.0);
        let summary = financial_summary(Some(&input), Some(&onboarding));
        assert_eq!(summary.annual_income, 1_200_000.0);
        assert_eq!(summary.total_deductions, 60_000.0);

        assert_eq!(financial_summary(None, None).annual_income, 0.0);
    }

    #[test]
    fn section_80c_headroom() {
        let insights = tax_insights(Some(&tax_input(900_000.0, 75_000.0)));
        assert!(insights.has_tax_inputs);
        assert_eq!(insights.section_80c_remaining, 75_000.0);
        assert_eq!(insights.section_80c_utilization, 50.0);
        assert!(insights.recommended_regime.is_none());

        let empty = tax_insights(None);
        assert!(!empty.has_tax_inputs);
        assert_eq!(empty.section_80c_remaining, 150_000.0);
    }

    #[test]
    fn documents_are_counted_by_status_and_type() {
        let make = |name: &str, doc_type| {
            NewDocument {
                file_name: name.to_string(),
                file_type: "application/pdf".to_string(),
                file_size: 3,
                content: "YWJj".to_string(),
                content_hash: "h".to_string(),
                document_type: doc_type,
            }
            .into_record(Uuid::new_v4())
        };
        let mut processed = make("form16.pdf", DocumentType::Form16);
        processed.status = DocumentStatus::Processed;
        processed.tax_analysis_ready = true;
        let docs = vec![processed, make("b.pdf", DocumentType::Other), make("c.pdf", DocumentType::Other)];

        let insights = document_insights(&docs);
        assert_eq!(insights.total, 3);
        assert_eq!(insights.processed, 1);
        assert_eq!(insights.uploaded, 2);
        assert_eq!(insights.tax_ready, 1);
        assert_eq!(insights.by_type.get("other"), Some(&2));
        assert!(insights.latest_upload_at.is_some());
    }

    #[test]
    fn unreachable_gateway_degrades() {
        let health = agent_health(Err(GatewayError::Unreachable("refused".to_string())));
        assert_eq!(health.status, "unavailable");
        assert!(health.error.is_some());
        assert!(!health.tax_agent_ready);
    }

    #[test]
    fn no_analysis_means_unknown_band() {
        assert_eq!(credit_insights(None, 0).score_band, ScoreBand::Unknown);
    }
}
