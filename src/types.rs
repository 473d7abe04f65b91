/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// Raised when a stored or submitted string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a fieldless enum whose wire and database form is a fixed string.
macro_rules! string_enum {
    ($(#[$meta:meta])* pub enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum! {
    /// Onboarding wizard steps, in order.
    pub enum OnboardingStep {
        PersonalInfo => "personalInfo",
        FinancialInfo => "financialInfo",
        FinancialGoals => "financialGoals",
        Documents => "documents",
        Completed => "completed",
    }
}

impl OnboardingStep {
    pub fn next(self) -> Self {
        match self {
            OnboardingStep::PersonalInfo => OnboardingStep::FinancialInfo,
            OnboardingStep::FinancialInfo => OnboardingStep::FinancialGoals,
            OnboardingStep::FinancialGoals => OnboardingStep::Documents,
            OnboardingStep::Documents | OnboardingStep::Completed => OnboardingStep::Completed,
        }
    }

    /// Zero-based position in the wizard; `Completed` sits one past the last step.
    pub fn position(self) -> usize {
        match self {
            OnboardingStep::PersonalInfo => 0,
            OnboardingStep::FinancialInfo => 1,
            OnboardingStep::FinancialGoals => 2,
            OnboardingStep::Documents => 3,
            OnboardingStep::Completed => 4,
        }
    }

    /// Number of steps a user actually fills in.
    pub const FILLABLE: usize = 4;
}

string_enum! {
    /// Document processing lifecycle.
    pub enum DocumentStatus {
        Uploaded => "uploaded",
        Processing => "processing",
        Processed => "processed",
        Error => "error",
    }
}

string_enum! {
    pub enum AnalysisType {
        General => "general",
        Tax => "tax",
        Cibil => "cibil",
    }
}

impl Default for AnalysisType {
    fn default() -> Self {
        AnalysisType::General
    }
}

string_enum! {
    /// Locally derived document category, assigned at upload time.
    pub enum DocumentType {
        Form16 => "form16",
        SalarySlip => "salary_slip",
        BankStatement => "bank_statement",
        CreditReport => "credit_report",
        InvestmentProof => "investment_proof",
        Other => "other",
    }
}

string_enum! {
    pub enum TaxRegime {
        Old => "old",
        New => "new",
        Auto => "auto",
    }
}

impl Default for TaxRegime {
    fn default() -> Self {
        TaxRegime::Auto
    }
}

string_enum! {
    pub enum PaymentHistory {
        Excellent => "excellent",
        Good => "good",
        Fair => "fair",
        Poor => "poor",
        Unknown => "unknown",
    }
}

impl Default for PaymentHistory {
    fn default() -> Self {
        PaymentHistory::Unknown
    }
}

string_enum! {
    pub enum EmploymentType {
        Salaried => "salaried",
        SelfEmployed => "self_employed",
        Business => "business",
        Freelancer => "freelancer",
        Retired => "retired",
        Other => "other",
    }
}

string_enum! {
    pub enum RiskAppetite {
        Conservative => "conservative",
        Moderate => "moderate",
        Aggressive => "aggressive",
    }
}

impl Default for RiskAppetite {
    fn default() -> Self {
        RiskAppetite::Moderate
    }
}

string_enum! {
    pub enum CityTier {
        Metro => "metro",
        NonMetro => "non_metro",
    }
}

impl Default for CityTier {
    fn default() -> Self {
        CityTier::Metro
    }
}

string_enum! {
    /// Credit score bands used by the dashboard.
    pub enum ScoreBand {
        Excellent => "excellent",
        Good => "good",
        Fair => "fair",
        Poor => "poor",
        Unknown => "unknown",
    }
}

string_enum! {
    /// Author of a stored chat turn.
    pub enum ChatRole {
        User => "user",
        Assistant => "assistant",
    }
}

impl ScoreBand {
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s >= 750 => ScoreBand::Excellent,
            s if s >= 700 => ScoreBand::Good,
            s if s >= 650 => ScoreBand::Fair,
            s if s > 0 => ScoreBand::Poor,
            _ => ScoreBand::Unknown,
        }
    }
}
