//! Wire contract of the analysis backend.
//!
//! Upstream speaks snake_case. Fields the backend always sends are required
//! here so a shape change surfaces as a decode error instead of a zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::database::models::{
    CreditProfile, ExtractedTaxFigures, RegimeSummary, TaxCalculationSummary, TaxFigures,
};
use crate::types::{CityTier, PaymentHistory, RiskAppetite, TaxRegime};

/// Accepts integers and integral floats (`3` or `3.0`), rejects `3.5`.
fn whole_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if value.fract() != 0.0 || value < f64::from(i32::MIN) || value > f64::from(i32::MAX) {
        return Err(serde::de::Error::custom(format!(
            "expected a whole number, got {value}"
        )));
    }
    Ok(value as i32)
}

// ---------------------------------------------------------------------------
// Tax
// ---------------------------------------------------------------------------

/// Body of `POST /api/calculate-tax`; also the `tax_agent_format` block of a
/// document analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpstreamTaxFigures {
    pub annual_income: f64,
    pub investments_80c: f64,
    pub health_insurance: f64,
    pub home_loan_interest: f64,
    pub hra_claimed: f64,
    #[serde(default)]
    pub other_deductions: BTreeMap<String, f64>,
}

impl From<&TaxFigures> for UpstreamTaxFigures {
    fn from(f: &TaxFigures) -> Self {
        // The backend has no dedicated fields for these two sections.
        let mut other_deductions = f.other_deductions.clone();
        if f.section_80ccd1b > 0.0 {
            other_deductions.insert("80ccd1b".to_string(), f.section_80ccd1b);
        }
        if f.section_80tta > 0.0 {
            other_deductions.insert("80tta".to_string(), f.section_80tta);
        }
        Self {
            annual_income: f.annual_income,
            investments_80c: f.section_80c,
            health_insurance: f.section_80d,
            home_loan_interest: f.section_24b,
            hra_claimed: f.hra_claimed,
            other_deductions,
        }
    }
}

impl From<UpstreamTaxFigures> for ExtractedTaxFigures {
    fn from(f: UpstreamTaxFigures) -> Self {
        Self {
            annual_income: f.annual_income,
            section_80c: f.investments_80c,
            section_80d: f.health_insurance,
            section_24b: f.home_loan_interest,
            hra_claimed: f.hra_claimed,
            other_deductions: f.other_deductions,
        }
    }
}

/// Envelope shared by the tax endpoints. `status` decides which of the
/// remaining fields are meaningful.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StatusEnvelope {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub rest: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeResult {
    pub taxable_income: f64,
    pub total_tax: f64,
    #[serde(rename = "effectiveRate")]
    pub effective_rate: f64,
    pub recommended: bool,
}

impl From<&RegimeResult> for RegimeSummary {
    fn from(r: &RegimeResult) -> Self {
        Self {
            taxable_income: r.taxable_income,
            total_tax: r.total_tax,
            effective_rate: r.effective_rate,
            recommended: r.recommended,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeComparison {
    pub optimal_regime: TaxRegime,
    pub tax_savings: f64,
    pub savings_percentage: f64,
    pub recommendation_reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxCalculations {
    pub old_regime: RegimeResult,
    pub new_regime: RegimeResult,
    pub comparison: RegimeComparison,
    #[serde(default)]
    pub recommendations: Value,
    #[serde(default)]
    pub action_items: Value,
    #[serde(default)]
    pub investment_suggestions: Value,
    #[serde(default)]
    pub tax_planning_tips: Vec<String>,
}

/// Successful `POST /api/calculate-tax` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxCalculationResult {
    pub calculations: TaxCalculations,
    #[serde(default)]
    pub response_source: Option<String>,
    #[serde(default)]
    pub ai_insights: Option<String>,
}

impl TaxCalculationResult {
    pub fn summary(&self) -> TaxCalculationSummary {
        let c = &self.calculations;
        TaxCalculationSummary {
            optimal_regime: c.comparison.optimal_regime,
            tax_savings: c.comparison.tax_savings,
            savings_percentage: c.comparison.savings_percentage,
            recommendation_reason: c.comparison.recommendation_reason.clone(),
            old_regime: (&c.old_regime).into(),
            new_regime: (&c.new_regime).into(),
            tax_planning_tips: c.tax_planning_tips.clone(),
            recommendations: c.recommendations.clone(),
            action_items: c.action_items.clone(),
            response_source: self.response_source.clone(),
            calculated_at: chrono::Utc::now(),
        }
    }
}

/// Body of `POST /api/optimize-tax`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxOptimizationRequest {
    pub age: u8,
    pub annual_income: f64,
    /// Keys understood upstream: `80c`, `80d`, `home_loan`.
    pub existing_investments: BTreeMap<String, f64>,
    pub risk_appetite: RiskAppetite,
    pub family_size: u8,
    pub city_tier: CityTier,
}

/// Body of `POST /api/tax-query`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxQueryRequest {
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub income_details: Option<Value>,
}

/// Successful `POST /api/tax-query` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct TaxQueryAnswer {
    pub question: String,
    pub response: Value,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Successful `POST /api/optimize-tax` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxStrategy {
    pub strategy: Value,
    #[serde(default)]
    pub timestamp: Option<String>,
}

// ---------------------------------------------------------------------------
// CIBIL
// ---------------------------------------------------------------------------

/// Credit figures in upstream form; request body of `/api/analyze-cibil` and
/// the `cibil_agent_format` block of a document analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditFigures {
    #[serde(deserialize_with = "whole_number")]
    pub current_score: i32,
    pub payment_history: PaymentHistory,
    #[serde(deserialize_with = "whole_number")]
    pub credit_cards: i32,
    pub total_credit_limit: f64,
    pub current_utilization: f64,
    #[serde(deserialize_with = "whole_number")]
    pub loans: i32,
    #[serde(deserialize_with = "whole_number")]
    pub missed_payments: i32,
    #[serde(deserialize_with = "whole_number")]
    pub account_age_months: i32,
    #[serde(deserialize_with = "whole_number")]
    pub recent_inquiries: i32,
    #[serde(deserialize_with = "whole_number")]
    pub age: i32,
    pub income: f64,
}

impl From<&CreditProfile> for CreditFigures {
    fn from(p: &CreditProfile) -> Self {
        Self {
            current_score: p.current_score,
            payment_history: p.payment_history,
            credit_cards: p.credit_cards,
            total_credit_limit: p.total_credit_limit,
            current_utilization: p.current_utilization,
            loans: p.loans,
            missed_payments: p.missed_payments,
            account_age_months: p.account_age_months,
            recent_inquiries: p.recent_inquiries,
            age: p.age,
            income: p.income,
        }
    }
}

impl From<CreditFigures> for CreditProfile {
    fn from(f: CreditFigures) -> Self {
        Self {
            current_score: f.current_score,
            payment_history: f.payment_history,
            credit_cards: f.credit_cards,
            total_credit_limit: f.total_credit_limit,
            current_utilization: f.current_utilization,
            loans: f.loans,
            missed_payments: f.missed_payments,
            account_age_months: f.account_age_months,
            recent_inquiries: f.recent_inquiries,
            age: f.age,
            income: f.income,
        }
    }
}

/// `POST /api/analyze-cibil` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CibilResult {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub response_source: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    pub cibil_analysis: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioRequest {
    pub scenarios: Vec<Value>,
}

/// Body of `POST /api/cibil-report`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CibilReportRequest {
    pub age: i32,
    pub income: f64,
    pub current_score: i32,
    pub credit_experience: String,
    pub goals: String,
}

/// Successful `POST /api/cibil-report` result: a 90-day improvement plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct CibilReport {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub response_source: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    pub cibil_report: Value,
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// A file forwarded as multipart field `file`.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSummary {
    pub document_type: String,
    /// Percentage, 0..=100.
    pub confidence_level: f64,
    #[serde(default)]
    pub processing_notes: Option<String>,
    pub ready_for_tax_analysis: bool,
    pub ready_for_cibil_analysis: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReadiness {
    #[serde(default)]
    pub tax_ready: bool,
    #[serde(default)]
    pub cibil_ready: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnhancedAnalysis {
    #[serde(default)]
    pub tax_analysis: Option<Value>,
    #[serde(default)]
    pub cibil_analysis: Option<Value>,
    #[serde(default)]
    pub analysis_ready: AnalysisReadiness,
}

/// `POST /api/analyze-financial-data` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentExtraction {
    pub tax_agent_format: UpstreamTaxFigures,
    pub cibil_agent_format: CreditFigures,
    pub financial_summary: ExtractionSummary,
    #[serde(default)]
    pub ai_insights: Option<String>,
    #[serde(default)]
    pub enhanced_analysis: EnhancedAnalysis,
}

impl DocumentExtraction {
    /// Confidence rescaled from the upstream percentage to `0.0..=1.0`.
    pub fn confidence(&self) -> f64 {
        let pct = self.financial_summary.confidence_level;
        if pct.is_nan() {
            return 0.0;
        }
        (pct / 100.0).clamp(0.0, 1.0)
    }

    pub fn tax_ready(&self) -> bool {
        self.financial_summary.ready_for_tax_analysis
            || self.enhanced_analysis.analysis_ready.tax_ready
    }

    pub fn cibil_ready(&self) -> bool {
        self.financial_summary.ready_for_cibil_analysis
            || self.enhanced_analysis.analysis_ready.cibil_ready
    }

    /// Planning tips from the follow-up tax run, when the backend made one.
    pub fn recommendations(&self) -> Vec<String> {
        self.enhanced_analysis
            .tax_analysis
            .as_ref()
            .and_then(|t| t.pointer("/calculations/tax_planning_tips"))
            .and_then(Value::as_array)
            .map(|tips| {
                tips.iter()
                    .filter_map(|t| t.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Decoded extraction plus the payload it came from.
#[derive(Debug, Clone)]
pub struct DocumentAnalysisResult {
    pub extraction: DocumentExtraction,
    pub raw: Value,
}

// ---------------------------------------------------------------------------
// Chat and health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct ChatReply {
    pub success: bool,
    pub response: String,
    pub query_type: String,
    pub agents_used: Vec<String>,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_action: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightsRequest {
    pub user_data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_areas: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct ChatInsights {
    pub success: bool,
    pub insights: Value,
    pub timestamp: String,
    #[serde(default)]
    pub focus_areas: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReadiness {
    pub tax_agent_ready: bool,
    pub cibil_agent_ready: bool,
    pub data_ingestion_agent_ready: bool,
}

/// `GET /api/health` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayHealth {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    pub agents: AgentReadiness,
    #[serde(default)]
    pub configuration: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extraction_json(confidence: f64) -> Value {
        json!({
            "tax_agent_format": {
                "annual_income": 850000,
                "investments_80c": 46000,
                "health_insurance": 12000,
                "home_loan_interest": 0,
                "hra_claimed": 0,
                "other_deductions": {}
            },
            "cibil_agent_format": {
                "current_score": 0,
                "payment_history": "unknown",
                "credit_cards": 2.0,
                "total_credit_limit": 150000,
                "current_utilization": 30,
                "loans": 0,
                "missed_payments": 0,
                "account_age_months": 0,
                "recent_inquiries": 0,
                "age": 30,
                "income": 850000
            },
            "financial_summary": {
                "document_type": "bank_statement",
                "confidence_level": confidence,
                "processing_notes": "ok",
                "ready_for_tax_analysis": true,
                "ready_for_cibil_analysis": false
            },
            "enhanced_analysis": {
                "tax_analysis": {"calculations": {"tax_planning_tips": ["Invest in ELSS"]}},
                "cibil_analysis": null,
                "analysis_ready": {"tax_ready": true, "cibil_ready": false}
            }
        })
    }

    #[test]
    fn decodes_a_document_extraction() {
        let extraction: DocumentExtraction = serde_json::from_value(extraction_json(80.0)).unwrap();
        assert_eq!(extraction.confidence(), 0.8);
        assert!(extraction.tax_ready());
        assert!(!extraction.cibil_ready());
        assert_eq!(extraction.cibil_agent_format.credit_cards, 2);
        assert_eq!(extraction.recommendations(), vec!["Invest in ELSS".to_string()]);

        let figures: ExtractedTaxFigures = extraction.tax_agent_format.into();
        assert_eq!(figures.section_80c, 46_000.0);
        assert_eq!(figures.section_80d, 12_000.0);
    }

    #[test]
    fn confidence_is_clamped() {
        let extraction: DocumentExtraction = serde_json::from_value(extraction_json(140.0)).unwrap();
        assert_eq!(extraction.confidence(), 1.0);
    }

    #[test]
    fn missing_required_block_fails_to_decode() {
        let mut body = extraction_json(60.0);
        body.as_object_mut().unwrap().remove("tax_agent_format");
        assert!(serde_json::from_value::<DocumentExtraction>(body).is_err());
    }

    #[test]
    fn fractional_counts_are_rejected() {
        let mut body = extraction_json(60.0);
        body["cibil_agent_format"]["loans"] = json!(1.5);
        assert!(serde_json::from_value::<DocumentExtraction>(body).is_err());
    }

    #[test]
    fn folds_extra_sections_into_other_deductions() {
        let figures = TaxFigures {
            annual_income: 1_000_000.0,
            section_80c: 150_000.0,
            section_80ccd1b: 50_000.0,
            ..Default::default()
        };
        let upstream = UpstreamTaxFigures::from(&figures);
        assert_eq!(upstream.investments_80c, 150_000.0);
        assert_eq!(upstream.other_deductions.get("80ccd1b"), Some(&50_000.0));
        assert!(!upstream.other_deductions.contains_key("80tta"));
    }

    #[test]
    fn chat_reply_serializes_in_camel_case() {
        let reply: ChatReply = serde_json::from_value(json!({
            "success": true,
            "response": "Hello",
            "query_type": "general",
            "agents_used": ["tax"],
            "timestamp": "2024-06-01T00:00:00"
        }))
        .unwrap();
        let out = serde_json::to_value(&reply).unwrap();
        assert_eq!(out["queryType"], "general");
        assert_eq!(out["agentsUsed"], json!(["tax"]));
        assert!(out.get("suggestions").is_none());
    }
}
