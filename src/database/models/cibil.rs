use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::PaymentHistory;

/// Credit figures, either submitted by the user or extracted from a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditProfile {
    pub current_score: i32,
    pub payment_history: PaymentHistory,
    pub credit_cards: i32,
    pub total_credit_limit: f64,
    pub current_utilization: f64,
    pub loans: i32,
    pub missed_payments: i32,
    pub account_age_months: i32,
    pub recent_inquiries: i32,
    pub age: i32,
    pub income: f64,
}

impl Default for CreditProfile {
    fn default() -> Self {
        Self {
            current_score: 0,
            payment_history: PaymentHistory::Unknown,
            credit_cards: 0,
            total_credit_limit: 0.0,
            current_utilization: 0.0,
            loans: 0,
            missed_payments: 0,
            account_age_months: 0,
            recent_inquiries: 0,
            age: 30,
            income: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CibilAnalysis {
    pub id: Uuid,
    pub user_id: Uuid,
    pub profile: CreditProfile,
    /// Analysis body as returned upstream (free text or structured advice).
    pub analysis: Value,
    pub response_source: Option<String>,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCibilAnalysis {
    pub profile: CreditProfile,
    pub analysis: Value,
    pub response_source: Option<String>,
    pub session_id: Option<String>,
}

impl NewCibilAnalysis {
    pub fn into_record(self, user_id: Uuid) -> CibilAnalysis {
        CibilAnalysis {
            id: Uuid::new_v4(),
            user_id,
            profile: self.profile,
            analysis: self.analysis,
            response_source: self.response_source,
            session_id: self.session_id,
            created_at: Utc::now(),
        }
    }
}
