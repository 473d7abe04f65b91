use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::TaxRegime;

/// Deduction ceilings applied to every stored tax input (AY 2024-25, old regime).
pub mod caps {
    pub const SECTION_80C: f64 = 150_000.0;
    pub const SECTION_80D: f64 = 25_000.0;
    pub const SECTION_24B: f64 = 200_000.0;
    pub const SECTION_80CCD1B: f64 = 50_000.0;
    pub const SECTION_80TTA: f64 = 10_000.0;
    /// HRA exemption is capped at this fraction of annual income.
    pub const HRA_INCOME_SHARE: f64 = 0.5;
}

pub const DEFAULT_FINANCIAL_YEAR: &str = "2024-25";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxFigures {
    #[serde(rename = "annualIncome")]
    pub annual_income: f64,
    #[serde(rename = "section80C")]
    pub section_80c: f64,
    #[serde(rename = "section80D")]
    pub section_80d: f64,
    #[serde(rename = "section24B")]
    pub section_24b: f64,
    #[serde(rename = "section80CCD1B")]
    pub section_80ccd1b: f64,
    #[serde(rename = "section80TTA")]
    pub section_80tta: f64,
    #[serde(rename = "hraClaimed")]
    pub hra_claimed: f64,
    #[serde(rename = "otherDeductions", default)]
    pub other_deductions: BTreeMap<String, f64>,
}

fn cap(value: f64, ceiling: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, ceiling)
}

impl TaxFigures {
    /// Returns a copy with every deduction limited to its statutory ceiling.
    pub fn clamped(&self) -> Self {
        let annual_income = if self.annual_income.is_finite() { self.annual_income.max(0.0) } else { 0.0 };
        Self {
            annual_income,
            section_80c: cap(self.section_80c, caps::SECTION_80C),
            section_80d: cap(self.section_80d, caps::SECTION_80D),
            section_24b: cap(self.section_24b, caps::SECTION_24B),
            section_80ccd1b: cap(self.section_80ccd1b, caps::SECTION_80CCD1B),
            section_80tta: cap(self.section_80tta, caps::SECTION_80TTA),
            hra_claimed: cap(self.hra_claimed, annual_income * caps::HRA_INCOME_SHARE),
            other_deductions: self
                .other_deductions
                .iter()
                .map(|(name, amount)| (name.clone(), cap(*amount, f64::MAX)))
                .collect(),
        }
    }

    pub fn total_deductions(&self) -> f64 {
        self.section_80c
            + self.section_80d
            + self.section_24b
            + self.section_80ccd1b
            + self.section_80tta
            + self.hra_claimed
            + self.other_deductions.values().sum::<f64>()
    }

    pub fn remaining_80c(&self) -> f64 {
        (caps::SECTION_80C - self.section_80c).max(0.0)
    }
}

/// Per-regime figures from the most recent tax calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegimeSummary {
    pub taxable_income: f64,
    pub total_tax: f64,
    pub effective_rate: f64,
    pub recommended: bool,
}

/// Locally owned view of a gateway tax calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxCalculationSummary {
    pub optimal_regime: TaxRegime,
    pub tax_savings: f64,
    pub savings_percentage: f64,
    pub recommendation_reason: String,
    pub old_regime: RegimeSummary,
    pub new_regime: RegimeSummary,
    pub tax_planning_tips: Vec<String>,
    pub recommendations: Value,
    pub action_items: Value,
    pub response_source: Option<String>,
    pub calculated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxInput {
    pub id: Uuid,
    pub user_id: Uuid,
    pub financial_year: String,
    #[serde(flatten)]
    pub figures: TaxFigures,
    pub preferred_regime: TaxRegime,
    pub source_document_id: Option<Uuid>,
    pub last_calculation: Option<TaxCalculationSummary>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTaxInput {
    pub financial_year: String,
    pub figures: TaxFigures,
    pub preferred_regime: TaxRegime,
    pub source_document_id: Option<Uuid>,
}

impl NewTaxInput {
    /// Builds the active record. Figures are clamped here so no write path can skip it.
    pub fn into_record(self, user_id: Uuid) -> TaxInput {
        let now = Utc::now();
        TaxInput {
            id: Uuid::new_v4(),
            user_id,
            financial_year: self.financial_year,
            figures: self.figures.clamped(),
            preferred_regime: self.preferred_regime,
            source_document_id: self.source_document_id,
            last_calculation: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for the active tax input.
#[derive(Debug, Clone, Default)]
pub struct TaxInputUpdate {
    pub financial_year: Option<String>,
    pub annual_income: Option<f64>,
    pub section_80c: Option<f64>,
    pub section_80d: Option<f64>,
    pub section_24b: Option<f64>,
    pub section_80ccd1b: Option<f64>,
    pub section_80tta: Option<f64>,
    pub hra_claimed: Option<f64>,
    pub other_deductions: Option<BTreeMap<String, f64>>,
    pub preferred_regime: Option<TaxRegime>,
    pub last_calculation: Option<TaxCalculationSummary>,
}

impl TaxInputUpdate {
    /// Merges the update into `input` and re-clamps. A stored calculation is
    /// dropped when the figures it was computed from change.
    pub fn apply(&self, input: &mut TaxInput) {
        let previous = input.figures.clone();
        if let Some(v) = &self.financial_year {
            input.financial_year = v.clone();
        }
        let f = &mut input.figures;
        if let Some(v) = self.annual_income {
            f.annual_income = v;
        }
        if let Some(v) = self.section_80c {
            f.section_80c = v;
        }
        if let Some(v) = self.section_80d {
            f.section_80d = v;
        }
        if let Some(v) = self.section_24b {
            f.section_24b = v;
        }
        if let Some(v) = self.section_80ccd1b {
            f.section_80ccd1b = v;
        }
        if let Some(v) = self.section_80tta {
            f.section_80tta = v;
        }
        if let Some(v) = self.hra_claimed {
            f.hra_claimed = v;
        }
        if let Some(v) = &self.other_deductions {
            f.other_deductions = v.clone();
        }
        if let Some(v) = self.preferred_regime {
            input.preferred_regime = v;
        }
        input.figures = input.figures.clamped();
        match &self.last_calculation {
            Some(v) => input.last_calculation = Some(v.clone()),
            None if input.figures != previous => input.last_calculation = None,
            None => {}
        }
        input.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn figures(income: f64) -> TaxFigures {
        TaxFigures {
            annual_income: income,
            ..Default::default()
        }
    }

    #[test]
    fn clamps_each_section_to_its_cap() {
        let input = TaxFigures {
            section_80c: 999_999.0,
            section_80d: 80_000.0,
            section_24b: 450_000.0,
            section_80ccd1b: 75_000.0,
            section_80tta: 20_000.0,
            ..figures(1_200_000.0)
        };
        let clamped = input.clamped();
        assert_eq!(clamped.section_80c, 150_000.0);
        assert_eq!(clamped.section_80d, 25_000.0);
        assert_eq!(clamped.section_24b, 200_000.0);
        assert_eq!(clamped.section_80ccd1b, 50_000.0);
        assert_eq!(clamped.section_80tta, 10_000.0);
    }

    #[test]
    fn values_under_the_cap_are_kept() {
        let input = TaxFigures {
            section_80c: 46_000.0,
            hra_claimed: 120_000.0,
            ..figures(900_000.0)
        };
        let clamped = input.clamped();
        assert_eq!(clamped.section_80c, 46_000.0);
        assert_eq!(clamped.hra_claimed, 120_000.0);
    }

    #[test]
    fn hra_is_limited_by_income() {
        let input = TaxFigures {
            hra_claimed: 400_000.0,
            ..figures(600_000.0)
        };
        assert_eq!(input.clamped().hra_claimed, 300_000.0);
    }

    #[test]
    fn update_reclamps() {
        let mut record = NewTaxInput {
            financial_year: DEFAULT_FINANCIAL_YEAR.to_string(),
            figures: figures(1_000_000.0),
            preferred_regime: TaxRegime::Auto,
            source_document_id: None,
        }
        .into_record(Uuid::new_v4());

        TaxInputUpdate {
            section_80c: Some(999_999.0),
            ..Default::default()
        }
        .apply(&mut record);

        assert_eq!(record.figures.section_80c, caps::SECTION_80C);
        assert_eq!(record.figures.remaining_80c(), 0.0);
    }

    #[test]
    fn changed_figures_drop_the_stored_calculation() {
        let mut record = NewTaxInput {
            financial_year: DEFAULT_FINANCIAL_YEAR.to_string(),
            figures: figures(1_000_000.0),
            preferred_regime: TaxRegime::Auto,
            source_document_id: None,
        }
        .into_record(Uuid::new_v4());
        let regime = RegimeSummary {
            taxable_income: 1_000_000.0,
            total_tax: 60_000.0,
            effective_rate: 6.0,
            recommended: true,
        };
        record.last_calculation = Some(TaxCalculationSummary {
            optimal_regime: TaxRegime::New,
            tax_savings: 5_000.0,
            savings_percentage: 7.7,
            recommendation_reason: String::new(),
            old_regime: RegimeSummary { recommended: false, ..regime.clone() },
            new_regime: regime,
            tax_planning_tips: Vec::new(),
            recommendations: Value::Null,
            action_items: Value::Null,
            response_source: None,
            calculated_at: Utc::now(),
        });

        TaxInputUpdate {
            preferred_regime: Some(TaxRegime::Old),
            ..Default::default()
        }
        .apply(&mut record);
        assert!(record.last_calculation.is_some());

        TaxInputUpdate {
            section_80d: Some(20_000.0),
            ..Default::default()
        }
        .apply(&mut record);
        assert!(record.last_calculation.is_none());
    }

    #[test]
    fn wire_names_match_section_labels() {
        let json = serde_json::to_value(figures(1.0)).unwrap();
        assert!(json.get("section80C").is_some());
        assert!(json.get("section80CCD1B").is_some());
        assert!(json.get("annualIncome").is_some());
    }
}
