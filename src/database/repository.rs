//! Persistence ports. Services hold an `Arc<dyn Store>` and never see SQL.
//!
//! Every method is scoped by the owning user's id; a row that exists but
//! belongs to someone else is indistinguishable from a missing one.

use async_trait::async_trait;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    ChatTurn, CibilAnalysis, DashboardSnapshot, DocumentAnalysis, DocumentFilter, FinancialDocument,
    NewDocumentAnalysis, OnboardingData, TaxInput, TaxInputUpdate, User,
};
use crate::database::pagination::{Page, Pagination};

pub type DbResult<T> = Result<T, DatabaseError>;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new account. Fails with `Conflict` when the email is taken.
    async fn insert_user(&self, user: User) -> DbResult<User>;
    async fn find_user(&self, id: Uuid) -> DbResult<Option<User>>;
    /// Lookup by already-normalised (lowercased) email.
    async fn find_user_by_email(&self, email: &str) -> DbResult<Option<User>>;
    async fn update_user(&self, user: User) -> DbResult<User>;
}

#[async_trait]
pub trait OnboardingRepository: Send + Sync {
    async fn find_onboarding(&self, user_id: Uuid) -> DbResult<Option<OnboardingData>>;
    /// Insert or replace the user's single onboarding record.
    async fn save_onboarding(&self, data: OnboardingData) -> DbResult<OnboardingData>;
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Stores the whole batch or nothing.
    async fn insert_documents(&self, documents: Vec<FinancialDocument>)
        -> DbResult<Vec<FinancialDocument>>;
    /// Newest first, content stripped.
    async fn list_documents(
        &self,
        user_id: Uuid,
        filter: DocumentFilter,
        page: Pagination,
    ) -> DbResult<Page<FinancialDocument>>;
    /// Every document of the user, content stripped. Used for aggregation.
    async fn all_documents(&self, user_id: Uuid) -> DbResult<Vec<FinancialDocument>>;
    async fn find_document(
        &self,
        user_id: Uuid,
        id: Uuid,
        include_content: bool,
    ) -> DbResult<Option<FinancialDocument>>;
    /// Newest first.
    async fn list_analyses(&self, user_id: Uuid, document_id: Uuid)
        -> DbResult<Vec<DocumentAnalysis>>;
    async fn latest_analysis(&self, user_id: Uuid, document_id: Uuid)
        -> DbResult<Option<DocumentAnalysis>>;
    /// Removes the document and its analyses. Returns false when nothing matched.
    async fn delete_document(&self, user_id: Uuid, id: Uuid) -> DbResult<bool>;
    async fn mark_processing(&self, user_id: Uuid, id: Uuid) -> DbResult<FinancialDocument>;
    async fn mark_error(&self, user_id: Uuid, id: Uuid, error: &str) -> DbResult<()>;
    /// Appends the analysis and moves the document to `processed` in one step.
    async fn record_analysis(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        analysis: NewDocumentAnalysis,
    ) -> DbResult<(FinancialDocument, DocumentAnalysis)>;
}

#[async_trait]
pub trait TaxInputRepository: Send + Sync {
    async fn find_active_tax_input(&self, user_id: Uuid) -> DbResult<Option<TaxInput>>;
    /// Makes `input` the active record. With `overwrite == false` an existing
    /// active record is a `Conflict`; otherwise it is deactivated first.
    async fn replace_active_tax_input(&self, input: TaxInput, overwrite: bool)
        -> DbResult<TaxInput>;
    async fn update_active_tax_input(&self, user_id: Uuid, update: &TaxInputUpdate)
        -> DbResult<TaxInput>;
    /// Soft delete. Returns false when there was no active record.
    async fn deactivate_tax_input(&self, user_id: Uuid) -> DbResult<bool>;
}

#[async_trait]
pub trait CibilRepository: Send + Sync {
    async fn insert_cibil_analysis(&self, analysis: CibilAnalysis) -> DbResult<CibilAnalysis>;
    async fn list_cibil_analyses(&self, user_id: Uuid, page: Pagination)
        -> DbResult<Page<CibilAnalysis>>;
    async fn latest_cibil_analysis(&self, user_id: Uuid) -> DbResult<Option<CibilAnalysis>>;
}

#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Deactivates the user's previous snapshot and stores this one as active.
    async fn replace_active_snapshot(&self, snapshot: DashboardSnapshot)
        -> DbResult<DashboardSnapshot>;
    async fn find_active_snapshot(&self, user_id: Uuid) -> DbResult<Option<DashboardSnapshot>>;
    async fn list_snapshots(&self, user_id: Uuid, page: Pagination)
        -> DbResult<Page<DashboardSnapshot>>;
}

#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Appends the turns in order, all or nothing.
    async fn append_chat_turns(&self, turns: Vec<ChatTurn>) -> DbResult<()>;
    /// The user's most recent `limit` turns, oldest first.
    async fn list_chat_turns(&self, user_id: Uuid, limit: u32) -> DbResult<Vec<ChatTurn>>;
    /// Deletes the user's conversation. Returns the number of turns removed.
    async fn clear_chat_turns(&self, user_id: Uuid) -> DbResult<u64>;
}

#[async_trait]
pub trait Store:
    UserRepository
    + OnboardingRepository
    + DocumentRepository
    + TaxInputRepository
    + CibilRepository
    + SnapshotRepository
    + ChatRepository
{
    async fn health_check(&self) -> DbResult<()>;
}
