use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ScoreBand, TaxRegime};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub annual_income: f64,
    pub total_deductions: f64,
    pub onboarding_completed: bool,
    pub onboarding_progress: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxInsights {
    pub has_tax_inputs: bool,
    pub financial_year: Option<String>,
    pub section_80c_used: f64,
    pub section_80c_remaining: f64,
    /// Percentage of the 80C ceiling already claimed.
    pub section_80c_utilization: f64,
    pub recommended_regime: Option<TaxRegime>,
    pub potential_savings: Option<f64>,
    pub last_calculated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditInsights {
    pub latest_score: Option<i32>,
    pub utilization: Option<f64>,
    pub score_band: ScoreBand,
    pub analyses_count: u64,
    pub last_analyzed_at: Option<DateTime<Utc>>,
}

impl Default for CreditInsights {
    fn default() -> Self {
        Self {
            latest_score: None,
            utilization: None,
            score_band: ScoreBand::Unknown,
            analyses_count: 0,
            last_analyzed_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInsights {
    pub total: u64,
    pub uploaded: u64,
    pub processing: u64,
    pub processed: u64,
    pub errored: u64,
    pub tax_ready: u64,
    pub cibil_ready: u64,
    pub by_type: BTreeMap<String, u64>,
    pub latest_upload_at: Option<DateTime<Utc>>,
}

/// Readiness of the external analysis agents at aggregation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentHealth {
    pub status: String,
    pub tax_agent_ready: bool,
    pub cibil_agent_ready: bool,
    pub data_ingestion_agent_ready: bool,
    pub checked_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl AgentHealth {
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            status: "unavailable".to_string(),
            tax_agent_ready: false,
            cibil_agent_ready: false,
            data_ingestion_agent_ready: false,
            checked_at: Utc::now(),
            error: Some(error.into()),
        }
    }
}

/// Where a dashboard view came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DashboardSource {
    Live,
    Snapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub financial_summary: FinancialSummary,
    pub tax_insights: TaxInsights,
    pub credit_insights: CreditInsights,
    pub document_insights: DocumentInsights,
    pub agent_health: AgentHealth,
    pub generated_at: DateTime<Utc>,
    pub source: DashboardSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub id: Uuid,
    pub user_id: Uuid,
    pub financial_summary: FinancialSummary,
    pub tax_insights: TaxInsights,
    pub credit_insights: CreditInsights,
    pub document_insights: DocumentInsights,
    pub agent_health: AgentHealth,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl DashboardSnapshot {
    pub fn from_view(user_id: Uuid, view: DashboardView) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            financial_summary: view.financial_summary,
            tax_insights: view.tax_insights,
            credit_insights: view.credit_insights,
            document_insights: view.document_insights,
            agent_health: view.agent_health,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn to_view(&self) -> DashboardView {
        DashboardView {
            financial_summary: self.financial_summary.clone(),
            tax_insights: self.tax_insights.clone(),
            credit_insights: self.credit_insights.clone(),
            document_insights: self.document_insights.clone(),
            agent_health: self.agent_health.clone(),
            generated_at: self.created_at,
            source: DashboardSource::Snapshot,
        }
    }
}
