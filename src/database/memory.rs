//! Process-local store used by the test suite and `STORAGE_BACKEND=memory`.
//!
//! All tables live behind a single async `RwLock`, so every multi-row write
//! (batch upload, replace-active) is atomic with respect to other requests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    ChatTurn, CibilAnalysis, DashboardSnapshot, DocumentAnalysis, DocumentFilter, FinancialDocument,
    NewDocumentAnalysis, OnboardingData, TaxInput, TaxInputUpdate, User,
};
use crate::database::pagination::{Page, Pagination};
use crate::database::repository::*;
use crate::types::DocumentStatus;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    onboarding: HashMap<Uuid, OnboardingData>,
    /// Insertion order; listings reverse it.
    documents: Vec<FinancialDocument>,
    analyses: Vec<DocumentAnalysis>,
    tax_inputs: Vec<TaxInput>,
    cibil: Vec<CibilAnalysis>,
    snapshots: Vec<DashboardSnapshot>,
    chat: Vec<ChatTurn>,
}

impl Tables {
    fn document_mut(&mut self, user_id: Uuid, id: Uuid) -> DbResult<&mut FinancialDocument> {
        self.documents
            .iter_mut()
            .find(|d| d.id == id && d.user_id == user_id)
            .ok_or_else(|| DatabaseError::not_found("Document not found"))
    }

    fn active_tax_input_mut(&mut self, user_id: Uuid) -> Option<&mut TaxInput> {
        self.tax_inputs
            .iter_mut()
            .find(|t| t.user_id == user_id && t.is_active)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T: Clone>(rows: impl Iterator<Item = T>) -> Vec<T> {
    let mut rows: Vec<T> = rows.collect();
    rows.reverse();
    rows
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert_user(&self, user: User) -> DbResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(DatabaseError::Conflict("Email is already registered".to_string()));
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> DbResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, user: User) -> DbResult<User> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(user)
            }
            None => Err(DatabaseError::not_found("User not found")),
        }
    }
}

#[async_trait]
impl OnboardingRepository for MemoryStore {
    async fn find_onboarding(&self, user_id: Uuid) -> DbResult<Option<OnboardingData>> {
        Ok(self.tables.read().await.onboarding.get(&user_id).cloned())
    }

    async fn save_onboarding(&self, data: OnboardingData) -> DbResult<OnboardingData> {
        let mut tables = self.tables.write().await;
        tables.onboarding.insert(data.user_id, data.clone());
        Ok(data)
    }
}

#[async_trait]
impl DocumentRepository for MemoryStore {
    async fn insert_documents(
        &self,
        documents: Vec<FinancialDocument>,
    ) -> DbResult<Vec<FinancialDocument>> {
        let mut tables = self.tables.write().await;
        tables.documents.extend(documents.iter().cloned());
        Ok(documents.into_iter().map(FinancialDocument::without_content).collect())
    }

    async fn list_documents(
        &self,
        user_id: Uuid,
        filter: DocumentFilter,
        page: Pagination,
    ) -> DbResult<Page<FinancialDocument>> {
        let tables = self.tables.read().await;
        let matching = newest_first(
            tables
                .documents
                .iter()
                .filter(|d| d.user_id == user_id && filter.matches(d))
                .cloned(),
        );
        let items = page
            .slice(&matching)
            .into_iter()
            .map(FinancialDocument::without_content)
            .collect();
        Ok(Page::new(items, page, matching.len() as u64))
    }

    async fn all_documents(&self, user_id: Uuid) -> DbResult<Vec<FinancialDocument>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .documents
                .iter()
                .filter(|d| d.user_id == user_id)
                .map(|d| d.clone().without_content()),
        ))
    }

    async fn find_document(
        &self,
        user_id: Uuid,
        id: Uuid,
        include_content: bool,
    ) -> DbResult<Option<FinancialDocument>> {
        let tables = self.tables.read().await;
        Ok(tables
            .documents
            .iter()
            .find(|d| d.id == id && d.user_id == user_id)
            .map(|d| {
                if include_content {
                    d.clone()
                } else {
                    d.clone().without_content()
                }
            }))
    }

    async fn list_analyses(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> DbResult<Vec<DocumentAnalysis>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .analyses
                .iter()
                .filter(|a| a.document_id == document_id && a.user_id == user_id)
                .cloned(),
        ))
    }

    async fn latest_analysis(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> DbResult<Option<DocumentAnalysis>> {
        let tables = self.tables.read().await;
        Ok(tables
            .analyses
            .iter()
            .rev()
            .find(|a| a.document_id == document_id && a.user_id == user_id)
            .cloned())
    }

    async fn delete_document(&self, user_id: Uuid, id: Uuid) -> DbResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.documents.len();
        tables.documents.retain(|d| !(d.id == id && d.user_id == user_id));
        if tables.documents.len() == before {
            return Ok(false);
        }
        tables.analyses.retain(|a| a.document_id != id);
        for input in tables
            .tax_inputs
            .iter_mut()
            .filter(|t| t.source_document_id == Some(id))
        {
            input.source_document_id = None;
        }
        Ok(true)
    }

    async fn mark_processing(&self, user_id: Uuid, id: Uuid) -> DbResult<FinancialDocument> {
        let mut tables = self.tables.write().await;
        let doc = tables.document_mut(user_id, id)?;
        doc.status = DocumentStatus::Processing;
        doc.updated_at = Utc::now();
        Ok(doc.clone())
    }

    async fn mark_error(&self, user_id: Uuid, id: Uuid, error: &str) -> DbResult<()> {
        let mut tables = self.tables.write().await;
        let doc = tables.document_mut(user_id, id)?;
        doc.status = DocumentStatus::Error;
        doc.last_error = Some(error.to_string());
        doc.updated_at = Utc::now();
        Ok(())
    }

    async fn record_analysis(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        analysis: NewDocumentAnalysis,
    ) -> DbResult<(FinancialDocument, DocumentAnalysis)> {
        let mut tables = self.tables.write().await;
        let doc = tables.document_mut(user_id, document_id)?;
        analysis.apply_to(doc);
        let document = doc.clone().without_content();
        let record = analysis.into_record(document_id, user_id);
        tables.analyses.push(record.clone());
        Ok((document, record))
    }
}

#[async_trait]
impl TaxInputRepository for MemoryStore {
    async fn find_active_tax_input(&self, user_id: Uuid) -> DbResult<Option<TaxInput>> {
        let tables = self.tables.read().await;
        Ok(tables
            .tax_inputs
            .iter()
            .find(|t| t.user_id == user_id && t.is_active)
            .cloned())
    }

    async fn replace_active_tax_input(&self, input: TaxInput, overwrite: bool) -> DbResult<TaxInput> {
        let mut tables = self.tables.write().await;
        if let Some(active) = tables.active_tax_input_mut(input.user_id) {
            if !overwrite {
                return Err(DatabaseError::Conflict(
                    "Active tax inputs already exist".to_string(),
                ));
            }
            active.is_active = false;
            active.updated_at = Utc::now();
        }
        tables.tax_inputs.push(input.clone());
        Ok(input)
    }

    async fn update_active_tax_input(
        &self,
        user_id: Uuid,
        update: &TaxInputUpdate,
    ) -> DbResult<TaxInput> {
        let mut tables = self.tables.write().await;
        let active = tables
            .active_tax_input_mut(user_id)
            .ok_or_else(|| DatabaseError::not_found("No active tax inputs"))?;
        update.apply(active);
        Ok(active.clone())
    }

    async fn deactivate_tax_input(&self, user_id: Uuid) -> DbResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.active_tax_input_mut(user_id) {
            Some(active) => {
                active.is_active = false;
                active.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl CibilRepository for MemoryStore {
    async fn insert_cibil_analysis(&self, analysis: CibilAnalysis) -> DbResult<CibilAnalysis> {
        self.tables.write().await.cibil.push(analysis.clone());
        Ok(analysis)
    }

    async fn list_cibil_analyses(
        &self,
        user_id: Uuid,
        page: Pagination,
    ) -> DbResult<Page<CibilAnalysis>> {
        let tables = self.tables.read().await;
        let rows = newest_first(tables.cibil.iter().filter(|c| c.user_id == user_id).cloned());
        Ok(Page::new(page.slice(&rows), page, rows.len() as u64))
    }

    async fn latest_cibil_analysis(&self, user_id: Uuid) -> DbResult<Option<CibilAnalysis>> {
        let tables = self.tables.read().await;
        Ok(tables.cibil.iter().rev().find(|c| c.user_id == user_id).cloned())
    }
}

#[async_trait]
impl SnapshotRepository for MemoryStore {
    async fn replace_active_snapshot(
        &self,
        snapshot: DashboardSnapshot,
    ) -> DbResult<DashboardSnapshot> {
        let mut tables = self.tables.write().await;
        for previous in tables
            .snapshots
            .iter_mut()
            .filter(|s| s.user_id == snapshot.user_id && s.is_active)
        {
            previous.is_active = false;
        }
        tables.snapshots.push(snapshot.clone());
        Ok(snapshot)
    }

    async fn find_active_snapshot(&self, user_id: Uuid) -> DbResult<Option<DashboardSnapshot>> {
        let tables = self.tables.read().await;
        Ok(tables
            .snapshots
            .iter()
            .find(|s| s.user_id == user_id && s.is_active)
            .cloned())
    }

    async fn list_snapshots(
        &self,
        user_id: Uuid,
        page: Pagination,
    ) -> DbResult<Page<DashboardSnapshot>> {
        let tables = self.tables.read().await;
        let rows = newest_first(tables.snapshots.iter().filter(|s| s.user_id == user_id).cloned());
        Ok(Page::new(page.slice(&rows), page, rows.len() as u64))
    }
}

#[async_trait]
impl ChatRepository for MemoryStore {
    async fn append_chat_turns(&self, turns: Vec<ChatTurn>) -> DbResult<()> {
        self.tables.write().await.chat.extend(turns);
        Ok(())
    }

    async fn list_chat_turns(&self, user_id: Uuid, limit: u32) -> DbResult<Vec<ChatTurn>> {
        let tables = self.tables.read().await;
        let mut turns: Vec<ChatTurn> = tables
            .chat
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .take(limit as usize)
            .cloned()
            .collect();
        turns.reverse();
        Ok(turns)
    }

    async fn clear_chat_turns(&self, user_id: Uuid) -> DbResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.chat.len();
        tables.chat.retain(|t| t.user_id != user_id);
        Ok((before - tables.chat.len()) as u64)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> DbResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{NewDocument, NewTaxInput, TaxFigures};
    use crate::types::{ChatRole, DocumentType, TaxRegime};

    fn tax_input(user_id: Uuid, section_80c: f64) -> TaxInput {
        NewTaxInput {
            financial_year: "2024-25".to_string(),
            figures: TaxFigures {
                annual_income: 900_000.0,
                section_80c,
                ..Default::default()
            },
            preferred_regime: TaxRegime::Auto,
            source_document_id: None,
        }
        .into_record(user_id)
    }

    #[tokio::test]
    async fn replace_active_respects_overwrite() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();

        store.replace_active_tax_input(tax_input(user, 10.0), false).await.unwrap();
        let err = store
            .replace_active_tax_input(tax_input(user, 20.0), false)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));

        store.replace_active_tax_input(tax_input(user, 30.0), true).await.unwrap();
        let tables = store.tables.read().await;
        let active: Vec<_> = tables.tax_inputs.iter().filter(|t| t.is_active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].figures.section_80c, 30.0);
    }

    #[tokio::test]
    async fn deleting_a_document_detaches_tax_inputs() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let document = NewDocument {
            file_name: "form16.pdf".to_string(),
            file_type: "application/pdf".to_string(),
            file_size: 3,
            content: "YWJj".to_string(),
            content_hash: String::new(),
            document_type: DocumentType::Form16,
        }
        .into_record(user);
        let document_id = document.id;
        store.insert_documents(vec![document]).await.unwrap();

        let mut input = tax_input(user, 10.0);
        input.source_document_id = Some(document_id);
        store.replace_active_tax_input(input, false).await.unwrap();

        assert!(store.delete_document(user, document_id).await.unwrap());
        let active = store.find_active_tax_input(user).await.unwrap().unwrap();
        assert_eq!(active.source_document_id, None);
    }

    #[tokio::test]
    async fn chat_turns_are_kept_per_user() {
        let store = MemoryStore::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        store
            .append_chat_turns(vec![
                ChatTurn::new(alice, ChatRole::User, "one", None),
                ChatTurn::new(bob, ChatRole::User, "two", None),
                ChatTurn::new(alice, ChatRole::Assistant, "three", None),
            ])
            .await
            .unwrap();

        let turns = store.list_chat_turns(alice, 10).await.unwrap();
        let contents: Vec<&str> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, ["one", "three"]);
        assert_eq!(store.list_chat_turns(alice, 1).await.unwrap()[0].content, "three");

        assert_eq!(store.clear_chat_turns(bob).await.unwrap(), 1);
        assert_eq!(store.list_chat_turns(alice, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn records_are_scoped_by_user() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        store.replace_active_tax_input(tax_input(owner, 10.0), false).await.unwrap();

        let stranger = Uuid::new_v4();
        assert!(store.find_active_tax_input(stranger).await.unwrap().is_none());
        assert!(!store.deactivate_tax_input(stranger).await.unwrap());
        assert!(store.find_active_tax_input(owner).await.unwrap().is_some());
    }
}
