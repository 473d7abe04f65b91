use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::database::models::OnboardingData;
use crate::database::repository::{DocumentRepository, OnboardingRepository};
use crate::database::Store;
use crate::error::ApiError;
use crate::state::AppState;
use crate::types::{EmploymentType, OnboardingStep, RiskAppetite};
use crate::validation::{non_blank_items, validate_value};

#[derive(Debug, Deserialize, Validate)]
pub struct StepSubmission {
    pub step: OnboardingStep,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    #[validate(length(min = 1, max = 100))]
    pub full_name: String,
    pub date_of_birth: Option<chrono::NaiveDate>,
    #[validate(length(min = 5, max = 20))]
    pub phone: Option<String>,
    #[validate(length(equal = 10, message = "PAN must be 10 characters"))]
    pub pan_number: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub occupation: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FinancialInfo {
    #[validate(range(min = 0.0))]
    pub annual_income: f64,
    pub employment_type: EmploymentType,
    #[validate(range(min = 0.0))]
    pub monthly_expenses: Option<f64>,
    #[validate(range(min = 0.0))]
    pub existing_investments: Option<f64>,
    #[validate(range(min = 0.0))]
    pub existing_loans: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FinancialGoals {
    #[validate(length(min = 1, max = 10, message = "between 1 and 10 goals"))]
    pub goals: Vec<String>,
    #[serde(default)]
    pub risk_appetite: RiskAppetite,
    #[validate(range(min = 1, max = 50))]
    pub investment_horizon_years: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DocumentsStep {
    #[serde(default)]
    pub document_ids: Vec<Uuid>,
    #[serde(default)]
    pub skipped: bool,
}

/// Validates `data` against the schema of `step` and returns it with defaults filled in.
pub fn validate_step_payload(step: OnboardingStep, data: Value) -> Result<Value, ApiError> {
    let normalized = match step {
        OnboardingStep::PersonalInfo => to_value(validate_value::<PersonalInfo>(data)?)?,
        OnboardingStep::FinancialInfo => to_value(validate_value::<FinancialInfo>(data)?)?,
        OnboardingStep::FinancialGoals => {
            let goals = validate_value::<FinancialGoals>(data)?;
            if let Err(err) = non_blank_items(&goals.goals) {
                let mut errors = ValidationErrors::new();
                errors.add("goals", err);
                return Err(errors.into());
            }
            to_value(goals)?
        }
        OnboardingStep::Documents => to_value(validate_value::<DocumentsStep>(data)?)?,
        OnboardingStep::Completed => {
            return Err(ApiError::bad_request("'completed' is not a submittable step"))
        }
    };
    Ok(normalized)
}

fn to_value<T: Serialize>(value: T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::internal_server_error(e.to_string()))
}

/// Applies a validated step to the record, enforcing the linear order.
pub fn apply_step(
    record: &mut OnboardingData,
    step: OnboardingStep,
    payload: Value,
) -> Result<(), ApiError> {
    let is_current = step == record.current_step;
    let is_reedit = record.completed_steps.contains(&step);
    if !is_current && !is_reedit {
        return Err(ApiError::bad_request(format!(
            "Step '{}' is not available yet; current step is '{}'",
            step, record.current_step
        )));
    }

    let now = Utc::now();
    record.set_step_payload(step, payload);
    if !is_reedit {
        record.completed_steps.push(step);
    }
    if is_current {
        record.current_step = step.next();
        if record.current_step == OnboardingStep::Completed && !record.is_completed {
            record.is_completed = true;
            record.completed_at = Some(now);
        }
    }
    record.updated_at = now;
    Ok(())
}

pub struct OnboardingService {
    store: Arc<dyn Store>,
}

impl OnboardingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    pub async fn get(&self, user_id: Uuid) -> Result<OnboardingData, ApiError> {
        Ok(self
            .store
            .find_onboarding(user_id)
            .await?
            .unwrap_or_else(|| OnboardingData::not_started(user_id)))
    }

    pub async fn submit_step(
        &self,
        user_id: Uuid,
        submission: StepSubmission,
    ) -> Result<OnboardingData, ApiError> {
        let step = submission.step;
        let payload = validate_step_payload(step, submission.data)?;

        if step == OnboardingStep::Documents {
            self.ensure_documents_owned(user_id, &payload).await?;
        }

        let mut record = self.get(user_id).await?;
        apply_step(&mut record, step, payload)?;
        let saved = self.store.save_onboarding(record).await?;

        info!(
            %user_id,
            step = %step,
            current_step = %saved.current_step,
            "Onboarding step saved"
        );
        Ok(saved)
    }

    async fn ensure_documents_owned(&self, user_id: Uuid, payload: &Value) -> Result<(), ApiError> {
        let step: DocumentsStep = serde_json::from_value(payload.clone())
            .map_err(|e| ApiError::internal_server_error(e.to_string()))?;
        for id in step.document_ids {
            if self.store.find_document(user_id, id, false).await?.is_none() {
                return Err(ApiError::bad_request(format!("Document {id} does not exist")));
            }
        }
        Ok(())
    }
}
