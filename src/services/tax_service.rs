use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::database::models::tax_input::DEFAULT_FINANCIAL_YEAR;
use crate::database::models::{
    ExtractedTaxFigures, NewTaxInput, TaxCalculationSummary, TaxFigures, TaxInput, TaxInputUpdate,
};
use crate::database::repository::{DocumentRepository, TaxInputRepository};
use crate::database::{DatabaseError, Store};
use crate::error::ApiError;
use crate::gateway::{
    AnalysisGateway, TaxOptimizationRequest, TaxQueryAnswer, TaxQueryRequest, TaxStrategy,
    UpstreamTaxFigures,
};
use crate::state::AppState;
use crate::types::{CityTier, RiskAppetite, TaxRegime};

fn default_financial_year() -> String {
    DEFAULT_FINANCIAL_YEAR.to_string()
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TaxInputRequest {
    #[serde(default = "default_financial_year")]
    #[validate(length(min = 4, max = 9))]
    pub financial_year: String,
    #[validate(range(min = 0.0))]
    pub annual_income: f64,
    #[serde(rename = "section80C", default)]
    #[validate(range(min = 0.0))]
    pub section_80c: f64,
    #[serde(rename = "section80D", default)]
    #[validate(range(min = 0.0))]
    pub section_80d: f64,
    #[serde(rename = "section24B", default)]
    #[validate(range(min = 0.0))]
    pub section_24b: f64,
    #[serde(rename = "section80CCD1B", default)]
    #[validate(range(min = 0.0))]
    pub section_80ccd1b: f64,
    #[serde(rename = "section80TTA", default)]
    #[validate(range(min = 0.0))]
    pub section_80tta: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub hra_claimed: f64,
    #[serde(default)]
    pub other_deductions: BTreeMap<String, f64>,
    #[serde(default)]
    pub preferred_regime: TaxRegime,
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TaxInputPatch {
    #[validate(length(min = 4, max = 9))]
    pub financial_year: Option<String>,
    #[validate(range(min = 0.0))]
    pub annual_income: Option<f64>,
    #[serde(rename = "section80C")]
    #[validate(range(min = 0.0))]
    pub section_80c: Option<f64>,
    #[serde(rename = "section80D")]
    #[validate(range(min = 0.0))]
    pub section_80d: Option<f64>,
    #[serde(rename = "section24B")]
    #[validate(range(min = 0.0))]
    pub section_24b: Option<f64>,
    #[serde(rename = "section80CCD1B")]
    #[validate(range(min = 0.0))]
    pub section_80ccd1b: Option<f64>,
    #[serde(rename = "section80TTA")]
    #[validate(range(min = 0.0))]
    pub section_80tta: Option<f64>,
    #[validate(range(min = 0.0))]
    pub hra_claimed: Option<f64>,
    pub other_deductions: Option<BTreeMap<String, f64>>,
    pub preferred_regime: Option<TaxRegime>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FromDocumentRequest {
    pub document_id: Uuid,
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRequest {
    #[validate(range(min = 18, max = 100))]
    pub age: u8,
    #[serde(default)]
    pub risk_appetite: RiskAppetite,
    #[serde(default = "default_family_size")]
    #[validate(range(min = 1, max = 20))]
    pub family_size: u8,
    #[serde(default)]
    pub city_tier: CityTier,
}

fn default_family_size() -> u8 {
    1
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TaxQuestion {
    #[validate(length(min = 1, max = 1000))]
    pub question: String,
    /// Forwarded as-is; the backend reads `annual_income` from it.
    pub income_details: Option<Value>,
}

/// Response of `POST /api/tax/calculate`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxCalculationOutcome {
    pub tax_input_id: Uuid,
    pub financial_year: String,
    #[serde(flatten)]
    pub summary: TaxCalculationSummary,
    pub ai_insights: Option<String>,
}

fn check_other_deductions(deductions: &BTreeMap<String, f64>) -> Result<(), ApiError> {
    if deductions.values().any(|v| *v < 0.0 || !v.is_finite()) {
        let mut err = ValidationError::new("range");
        err.message = Some("deduction amounts must be non-negative".into());
        let mut errors = ValidationErrors::new();
        errors.add("otherDeductions", err);
        return Err(errors.into());
    }
    Ok(())
}

impl From<ExtractedTaxFigures> for TaxFigures {
    fn from(e: ExtractedTaxFigures) -> Self {
        TaxFigures {
            annual_income: e.annual_income,
            section_80c: e.section_80c,
            section_80d: e.section_80d,
            section_24b: e.section_24b,
            hra_claimed: e.hra_claimed,
            other_deductions: e.other_deductions,
            ..Default::default()
        }
    }
}

pub struct TaxService {
    store: Arc<dyn Store>,
    gateway: Arc<dyn AnalysisGateway>,
}

impl TaxService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            gateway: state.gateway.clone(),
        }
    }

    pub async fn create(&self, user_id: Uuid, request: TaxInputRequest) -> Result<TaxInput, ApiError> {
        check_other_deductions(&request.other_deductions)?;
        let record = NewTaxInput {
            financial_year: request.financial_year,
            figures: TaxFigures {
                annual_income: request.annual_income,
                section_80c: request.section_80c,
                section_80d: request.section_80d,
                section_24b: request.section_24b,
                section_80ccd1b: request.section_80ccd1b,
                section_80tta: request.section_80tta,
                hra_claimed: request.hra_claimed,
                other_deductions: request.other_deductions,
            },
            preferred_regime: request.preferred_regime,
            source_document_id: None,
        }
        .into_record(user_id);

        let stored = self.replace(record, request.overwrite).await?;
        info!(%user_id, tax_input_id = %stored.id, "Tax inputs saved");
        Ok(stored)
    }

    pub async fn get(&self, user_id: Uuid) -> Result<TaxInput, ApiError> {
        self.store
            .find_active_tax_input(user_id)
            .await?
            .ok_or_else(no_active_input)
    }

    pub async fn update(&self, user_id: Uuid, patch: TaxInputPatch) -> Result<TaxInput, ApiError> {
        if let Some(deductions) = &patch.other_deductions {
            check_other_deductions(deductions)?;
        }
        let update = TaxInputUpdate {
            financial_year: patch.financial_year,
            annual_income: patch.annual_income,
            section_80c: patch.section_80c,
            section_80d: patch.section_80d,
            section_24b: patch.section_24b,
            section_80ccd1b: patch.section_80ccd1b,
            section_80tta: patch.section_80tta,
            hra_claimed: patch.hra_claimed,
            other_deductions: patch.other_deductions,
            preferred_regime: patch.preferred_regime,
            last_calculation: None,
        };
        self.store
            .update_active_tax_input(user_id, &update)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound(_) => no_active_input(),
                other => other.into(),
            })
    }

    pub async fn delete(&self, user_id: Uuid) -> Result<(), ApiError> {
        if !self.store.deactivate_tax_input(user_id).await? {
            return Err(no_active_input());
        }
        info!(%user_id, "Tax inputs deactivated");
        Ok(())
    }

    /// Builds the active tax input from the latest analysis of a document.
    pub async fn from_document(
        &self,
        user_id: Uuid,
        request: FromDocumentRequest,
    ) -> Result<TaxInput, ApiError> {
        let document_id = request.document_id;
        self.store
            .find_document(user_id, document_id, false)
            .await?
            .ok_or_else(|| ApiError::not_found("Document not found"))?;
        let analysis = self
            .store
            .latest_analysis(user_id, document_id)
            .await?
            .ok_or_else(|| ApiError::not_found("No analysis available for this document"))?;

        let figures = TaxFigures::from(analysis.extracted_tax);
        if figures.annual_income <= 0.0 {
            return Err(ApiError::bad_request(
                "The document analysis did not find a positive annual income",
            ));
        }

        let record = NewTaxInput {
            financial_year: default_financial_year(),
            figures,
            preferred_regime: TaxRegime::Auto,
            source_document_id: Some(document_id),
        }
        .into_record(user_id);

        let stored = self.replace(record, request.overwrite).await?;
        info!(%user_id, %document_id, tax_input_id = %stored.id, "Tax inputs populated from document");
        Ok(stored)
    }

    pub async fn calculate(&self, user_id: Uuid) -> Result<TaxCalculationOutcome, ApiError> {
        let input = self.get(user_id).await?;
        let result = self
            .gateway
            .calculate_tax(&UpstreamTaxFigures::from(&input.figures))
            .await?;
        let summary = result.summary();

        let update = TaxInputUpdate {
            last_calculation: Some(summary.clone()),
            ..Default::default()
        };
        self.store.update_active_tax_input(user_id, &update).await?;

        info!(
            %user_id,
            optimal_regime = %summary.optimal_regime,
            savings = summary.tax_savings,
            "Tax calculated"
        );
        Ok(TaxCalculationOutcome {
            tax_input_id: input.id,
            financial_year: input.financial_year,
            summary,
            ai_insights: result.ai_insights,
        })
    }

    pub async fn optimize(&self, user_id: Uuid, request: OptimizeRequest) -> Result<TaxStrategy, ApiError> {
        let input = self.get(user_id).await?;
        let figures = &input.figures;
        let existing_investments = BTreeMap::from([
            ("80c".to_string(), figures.section_80c),
            ("80d".to_string(), figures.section_80d),
            ("home_loan".to_string(), figures.section_24b),
        ]);
        let upstream = TaxOptimizationRequest {
            age: request.age,
            annual_income: figures.annual_income,
            existing_investments,
            risk_appetite: request.risk_appetite,
            family_size: request.family_size,
            city_tier: request.city_tier,
        };
        Ok(self.gateway.optimize_tax(&upstream).await?)
    }

    /// Quick question answered upstream. Falls back on the active inputs'
    /// income when the caller sends no income details.
    pub async fn query(&self, user_id: Uuid, question: TaxQuestion) -> Result<TaxQueryAnswer, ApiError> {
        if question.question.trim().is_empty() {
            return Err(ApiError::validation_error("question: must not be blank", None));
        }
        let income_details = match question.income_details {
            Some(details) => Some(details),
            None => self
                .store
                .find_active_tax_input(user_id)
                .await?
                .map(|input| json!({ "annual_income": input.figures.annual_income })),
        };
        let request = TaxQueryRequest {
            question: question.question,
            income_details,
        };
        Ok(self.gateway.tax_query(&request).await?)
    }

    async fn replace(&self, record: TaxInput, overwrite: bool) -> Result<TaxInput, ApiError> {
        match self.store.replace_active_tax_input(record, overwrite).await {
            Ok(stored) => Ok(stored),
            Err(DatabaseError::Conflict(_)) => Err(ApiError::conflict(
                "Active tax inputs already exist; pass overwrite=true to replace them",
            )),
            Err(other) => Err(other.into()),
        }
    }
}

fn no_active_input() -> ApiError {
    ApiError::not_found("No active tax inputs found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate_value;

    #[test]
    fn request_defaults_are_applied() {
        let request: TaxInputRequest = validate_value(json!({"annualIncome": 900000})).unwrap();
        assert_eq!(request.financial_year, "2024-25");
        assert_eq!(request.preferred_regime, TaxRegime::Auto);
        assert!(!request.overwrite);
        assert_eq!(request.section_80c, 0.0);
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let err = validate_value::<TaxInputRequest>(json!({"annualIncome": 1, "section80C": -5}))
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let mut deductions = BTreeMap::new();
        deductions.insert("donations".to_string(), -1.0);
        assert!(check_other_deductions(&deductions).is_err());
    }

    #[test]
    fn extracted_figures_map_onto_tax_figures() {
        let figures = TaxFigures::from(ExtractedTaxFigures {
            annual_income: 1_000_000.0,
            section_80c: 200_000.0,
            ..Default::default()
        });
        assert_eq!(figures.clamped().section_80c, 150_000.0);
        assert_eq!(figures.section_80ccd1b, 0.0);
    }

    #[test]
    fn questions_are_bounded() {
        assert!(validate_value::<TaxQuestion>(json!({"question": ""})).is_err());
        let long = "?".repeat(1001);
        assert!(validate_value::<TaxQuestion>(json!({ "question": long })).is_err());
        let question: TaxQuestion = validate_value(json!({"question": "Is PPF under 80C?"})).unwrap();
        assert!(question.income_details.is_none());
    }

    #[test]
    fn optimize_requires_adult_age() {
        assert!(validate_value::<OptimizeRequest>(json!({"age": 12})).is_err());
        let request: OptimizeRequest = validate_value(json!({"age": 35})).unwrap();
        assert_eq!(request.family_size, 1);
        assert_eq!(request.city_tier, CityTier::Metro);
    }
}
