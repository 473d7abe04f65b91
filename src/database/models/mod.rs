pub mod chat;
pub mod cibil;
pub mod dashboard;
pub mod document;
pub mod onboarding;
pub mod tax_input;
pub mod user;

pub use chat::{ChatTranscript, ChatTurn};
pub use cibil::{CibilAnalysis, CreditProfile, NewCibilAnalysis};
pub use dashboard::{
    AgentHealth, CreditInsights, DashboardSnapshot, DashboardSource, DashboardView,
    DocumentInsights, FinancialSummary, TaxInsights,
};
pub use document::{
    DocumentAnalysis, DocumentFilter, DocumentWithAnalyses, ExtractedTaxFigures,
    FinancialDocument, NewDocument, NewDocumentAnalysis,
};
pub use onboarding::OnboardingData;
pub use tax_input::{
    NewTaxInput, RegimeSummary, TaxCalculationSummary, TaxFigures, TaxInput, TaxInputUpdate,
};
pub use user::{NewUser, ProfileUpdate, User};
