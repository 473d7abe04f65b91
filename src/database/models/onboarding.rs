use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::OnboardingStep;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingData {
    pub id: Uuid,
    pub user_id: Uuid,
    pub current_step: OnboardingStep,
    pub completed_steps: Vec<OnboardingStep>,
    pub is_completed: bool,
    pub personal_info: Option<Value>,
    pub financial_info: Option<Value>,
    pub financial_goals: Option<Value>,
    pub documents: Option<Value>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OnboardingData {
    /// The record a user has before submitting the first step. Not persisted.
    pub fn not_started(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            current_step: OnboardingStep::PersonalInfo,
            completed_steps: Vec::new(),
            is_completed: false,
            personal_info: None,
            financial_info: None,
            financial_goals: None,
            documents: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn step_payload(&self, step: OnboardingStep) -> Option<&Value> {
        match step {
            OnboardingStep::PersonalInfo => self.personal_info.as_ref(),
            OnboardingStep::FinancialInfo => self.financial_info.as_ref(),
            OnboardingStep::FinancialGoals => self.financial_goals.as_ref(),
            OnboardingStep::Documents => self.documents.as_ref(),
            OnboardingStep::Completed => None,
        }
    }

    pub fn set_step_payload(&mut self, step: OnboardingStep, payload: Value) {
        match step {
            OnboardingStep::PersonalInfo => self.personal_info = Some(payload),
            OnboardingStep::FinancialInfo => self.financial_info = Some(payload),
            OnboardingStep::FinancialGoals => self.financial_goals = Some(payload),
            OnboardingStep::Documents => self.documents = Some(payload),
            OnboardingStep::Completed => {}
        }
    }

    /// Share of the fillable steps already submitted, 0..=100.
    pub fn progress_percent(&self) -> u8 {
        if self.is_completed {
            return 100;
        }
        let done = self
            .completed_steps
            .iter()
            .filter(|s| **s != OnboardingStep::Completed)
            .count()
            .min(OnboardingStep::FILLABLE);
        ((done * 100) / OnboardingStep::FILLABLE) as u8
    }
}
