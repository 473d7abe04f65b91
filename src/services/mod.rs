pub mod auth_service;
pub mod chat_service;
pub mod cibil_service;
pub mod dashboard_service;
pub mod document_service;
pub mod onboarding_service;
pub mod tax_service;

pub use auth_service::AuthService;
pub use chat_service::ChatService;
pub use cibil_service::CibilService;
pub use dashboard_service::DashboardService;
pub use document_service::DocumentService;
pub use onboarding_service::OnboardingService;
pub use tax_service::TaxService;
