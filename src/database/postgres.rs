//! Postgres-backed store. Enum columns are stored as their wire strings and
//! structured payloads as JSONB; row structs below translate both ways.

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{types::Json, FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    AgentHealth, ChatTurn, CibilAnalysis, CreditInsights, CreditProfile, DashboardSnapshot,
    DocumentAnalysis, DocumentFilter, DocumentInsights, ExtractedTaxFigures, FinancialDocument,
    FinancialSummary, NewDocumentAnalysis, OnboardingData, TaxCalculationSummary, TaxFigures,
    TaxInput, TaxInputUpdate, TaxInsights, User,
};
use crate::database::pagination::{Page, Pagination};
use crate::database::repository::*;
use crate::types::UnknownVariant;

fn parse<T: FromStr<Err = UnknownVariant>>(value: &str) -> DbResult<T> {
    value
        .parse()
        .map_err(|e: UnknownVariant| DatabaseError::Decode(e.to_string()))
}

fn limit_offset(page: Pagination) -> (i64, i64) {
    (i64::from(page.limit), page.offset() as i64)
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

const USER_COLUMNS: &str =
    "id, email, name, phone, profile_photo, password_hash, created_at, updated_at";

#[derive(FromRow)]
struct OnboardingRow {
    id: Uuid,
    user_id: Uuid,
    current_step: String,
    completed_steps: Vec<String>,
    is_completed: bool,
    personal_info: Option<Value>,
    financial_info: Option<Value>,
    financial_goals: Option<Value>,
    documents: Option<Value>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OnboardingRow> for OnboardingData {
    type Error = DatabaseError;

    fn try_from(row: OnboardingRow) -> DbResult<Self> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            current_step: parse(&row.current_step)?,
            completed_steps: row
                .completed_steps
                .iter()
                .map(|s| parse(s))
                .collect::<DbResult<_>>()?,
            is_completed: row.is_completed,
            personal_info: row.personal_info,
            financial_info: row.financial_info,
            financial_goals: row.financial_goals,
            documents: row.documents,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const DOCUMENT_META_COLUMNS: &str = "id, user_id, file_name, file_type, file_size, content_hash, \
     document_type, status, is_processed, tax_analysis_ready, cibil_analysis_ready, last_error, \
     uploaded_at, updated_at, processed_at";

fn document_columns(include_content: bool) -> String {
    let content = if include_content {
        "content"
    } else {
        "NULL::text AS content"
    };
    format!("{DOCUMENT_META_COLUMNS}, {content}")
}

#[derive(FromRow)]
struct DocumentRow {
    id: Uuid,
    user_id: Uuid,
    file_name: String,
    file_type: String,
    file_size: i64,
    content: Option<String>,
    content_hash: String,
    document_type: String,
    status: String,
    is_processed: bool,
    tax_analysis_ready: bool,
    cibil_analysis_ready: bool,
    last_error: Option<String>,
    uploaded_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<DocumentRow> for FinancialDocument {
    type Error = DatabaseError;

    fn try_from(row: DocumentRow) -> DbResult<Self> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            file_name: row.file_name,
            file_type: row.file_type,
            file_size: row.file_size,
            content: row.content,
            content_hash: row.content_hash,
            document_type: parse(&row.document_type)?,
            status: parse(&row.status)?,
            is_processed: row.is_processed,
            tax_analysis_ready: row.tax_analysis_ready,
            cibil_analysis_ready: row.cibil_analysis_ready,
            last_error: row.last_error,
            uploaded_at: row.uploaded_at,
            updated_at: row.updated_at,
            processed_at: row.processed_at,
        })
    }
}

const ANALYSIS_COLUMNS: &str = "id, document_id, user_id, analysis_type, document_type, \
     confidence_level, extracted_tax, extracted_credit, recommendations, insights, raw_response, \
     created_at";

#[derive(FromRow)]
struct AnalysisRow {
    id: Uuid,
    document_id: Uuid,
    user_id: Uuid,
    analysis_type: String,
    document_type: String,
    confidence_level: f64,
    extracted_tax: Json<ExtractedTaxFigures>,
    extracted_credit: Json<CreditProfile>,
    recommendations: Json<Vec<String>>,
    insights: Option<String>,
    raw_response: Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<AnalysisRow> for DocumentAnalysis {
    type Error = DatabaseError;

    fn try_from(row: AnalysisRow) -> DbResult<Self> {
        Ok(Self {
            id: row.id,
            document_id: row.document_id,
            user_id: row.user_id,
            analysis_type: parse(&row.analysis_type)?,
            document_type: row.document_type,
            confidence_level: row.confidence_level,
            extracted_tax: row.extracted_tax.0,
            extracted_credit: row.extracted_credit.0,
            recommendations: row.recommendations.0,
            insights: row.insights,
            raw_response: row.raw_response,
            created_at: row.created_at,
        })
    }
}

const TAX_INPUT_COLUMNS: &str = "id, user_id, financial_year, annual_income, section_80c, \
     section_80d, section_24b, section_80ccd1b, section_80tta, hra_claimed, other_deductions, \
     preferred_regime, source_document_id, last_calculation, is_active, created_at, updated_at";

#[derive(FromRow)]
struct TaxInputRow {
    id: Uuid,
    user_id: Uuid,
    financial_year: String,
    annual_income: f64,
    section_80c: f64,
    section_80d: f64,
    section_24b: f64,
    section_80ccd1b: f64,
    section_80tta: f64,
    hra_claimed: f64,
    other_deductions: Json<BTreeMap<String, f64>>,
    preferred_regime: String,
    source_document_id: Option<Uuid>,
    last_calculation: Option<Json<TaxCalculationSummary>>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaxInputRow> for TaxInput {
    type Error = DatabaseError;

    fn try_from(row: TaxInputRow) -> DbResult<Self> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            financial_year: row.financial_year,
            figures: TaxFigures {
                annual_income: row.annual_income,
                section_80c: row.section_80c,
                section_80d: row.section_80d,
                section_24b: row.section_24b,
                section_80ccd1b: row.section_80ccd1b,
                section_80tta: row.section_80tta,
                hra_claimed: row.hra_claimed,
                other_deductions: row.other_deductions.0,
            },
            preferred_regime: parse(&row.preferred_regime)?,
            source_document_id: row.source_document_id,
            last_calculation: row.last_calculation.map(|j| j.0),
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const CIBIL_COLUMNS: &str =
    "id, user_id, profile, analysis, response_source, session_id, created_at";

#[derive(FromRow)]
struct CibilRow {
    id: Uuid,
    user_id: Uuid,
    profile: Json<CreditProfile>,
    analysis: Value,
    response_source: Option<String>,
    session_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CibilRow> for CibilAnalysis {
    fn from(row: CibilRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            profile: row.profile.0,
            analysis: row.analysis,
            response_source: row.response_source,
            session_id: row.session_id,
            created_at: row.created_at,
        }
    }
}

const SNAPSHOT_COLUMNS: &str = "id, user_id, financial_summary, tax_insights, credit_insights, \
     document_insights, agent_health, is_active, created_at";

#[derive(FromRow)]
struct SnapshotRow {
    id: Uuid,
    user_id: Uuid,
    financial_summary: Json<FinancialSummary>,
    tax_insights: Json<TaxInsights>,
    credit_insights: Json<CreditInsights>,
    document_insights: Json<DocumentInsights>,
    agent_health: Json<AgentHealth>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<SnapshotRow> for DashboardSnapshot {
    fn from(row: SnapshotRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            financial_summary: row.financial_summary.0,
            tax_insights: row.tax_insights.0,
            credit_insights: row.credit_insights.0,
            document_insights: row.document_insights.0,
            agent_health: row.agent_health.0,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

const CHAT_COLUMNS: &str = "id, user_id, role, content, session_id, query_type, created_at";

#[derive(FromRow)]
struct ChatRow {
    id: Uuid,
    user_id: Uuid,
    role: String,
    content: String,
    session_id: Option<String>,
    query_type: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ChatRow> for ChatTurn {
    type Error = DatabaseError;

    fn try_from(row: ChatRow) -> DbResult<Self> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            role: parse(&row.role)?,
            content: row.content,
            session_id: row.session_id,
            query_type: row.query_type,
            created_at: row.created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_document(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        id: Uuid,
    ) -> DbResult<FinancialDocument> {
        let sql = format!(
            "SELECT {} FROM financial_documents WHERE id = $1 AND user_id = $2 FOR UPDATE",
            document_columns(false)
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Document not found"))?;
        row.try_into()
    }

    async fn store_document_state(
        tx: &mut Transaction<'_, Postgres>,
        doc: &FinancialDocument,
    ) -> DbResult<()> {
        sqlx::query(
            "UPDATE financial_documents
             SET status = $3, is_processed = $4, tax_analysis_ready = $5,
                 cibil_analysis_ready = $6, last_error = $7, processed_at = $8, updated_at = $9
             WHERE id = $1 AND user_id = $2",
        )
        .bind(doc.id)
        .bind(doc.user_id)
        .bind(doc.status.as_str())
        .bind(doc.is_processed)
        .bind(doc.tax_analysis_ready)
        .bind(doc.cibil_analysis_ready)
        .bind(&doc.last_error)
        .bind(doc.processed_at)
        .bind(doc.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn lock_active_tax_input(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
    ) -> DbResult<Option<TaxInput>> {
        let sql = format!(
            "SELECT {TAX_INPUT_COLUMNS} FROM tax_inputs WHERE user_id = $1 AND is_active FOR UPDATE"
        );
        sqlx::query_as::<_, TaxInputRow>(&sql)
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?
            .map(TaxInput::try_from)
            .transpose()
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn insert_user(&self, user: User) -> DbResult<User> {
        let sql = format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.phone)
            .bind(&user.profile_photo)
            .bind(&user.password_hash)
            .bind(user.created_at)
            .bind(user.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_write(e, "Email is already registered"))
    }

    async fn find_user(&self, id: Uuid) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_user(&self, user: User) -> DbResult<User> {
        let sql = format!(
            "UPDATE users SET name = $2, phone = $3, profile_photo = $4, updated_at = $5
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.phone)
            .bind(&user.profile_photo)
            .bind(user.updated_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("User not found"))
    }
}

#[async_trait]
impl OnboardingRepository for PgStore {
    async fn find_onboarding(&self, user_id: Uuid) -> DbResult<Option<OnboardingData>> {
        sqlx::query_as::<_, OnboardingRow>(
            "SELECT id, user_id, current_step, completed_steps, is_completed, personal_info,
                    financial_info, financial_goals, documents, completed_at, created_at, updated_at
             FROM onboarding_data WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(OnboardingData::try_from)
        .transpose()
    }

    async fn save_onboarding(&self, data: OnboardingData) -> DbResult<OnboardingData> {
        let steps: Vec<&str> = data.completed_steps.iter().map(|s| s.as_str()).collect();
        sqlx::query(
            "INSERT INTO onboarding_data
                (id, user_id, current_step, completed_steps, is_completed, personal_info,
                 financial_info, financial_goals, documents, completed_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (user_id) DO UPDATE SET
                current_step = EXCLUDED.current_step,
                completed_steps = EXCLUDED.completed_steps,
                is_completed = EXCLUDED.is_completed,
                personal_info = EXCLUDED.personal_info,
                financial_info = EXCLUDED.financial_info,
                financial_goals = EXCLUDED.financial_goals,
                documents = EXCLUDED.documents,
                completed_at = EXCLUDED.completed_at,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(data.id)
        .bind(data.user_id)
        .bind(data.current_step.as_str())
        .bind(steps)
        .bind(data.is_completed)
        .bind(&data.personal_info)
        .bind(&data.financial_info)
        .bind(&data.financial_goals)
        .bind(&data.documents)
        .bind(data.completed_at)
        .bind(data.created_at)
        .bind(data.updated_at)
        .execute(&self.pool)
        .await?;

        self.find_onboarding(data.user_id)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Onboarding record not found"))
    }
}

#[async_trait]
impl DocumentRepository for PgStore {
    async fn insert_documents(
        &self,
        documents: Vec<FinancialDocument>,
    ) -> DbResult<Vec<FinancialDocument>> {
        let mut tx = self.pool.begin().await?;
        for doc in &documents {
            sqlx::query(
                "INSERT INTO financial_documents
                    (id, user_id, file_name, file_type, file_size, content, content_hash,
                     document_type, status, is_processed, tax_analysis_ready,
                     cibil_analysis_ready, last_error, uploaded_at, updated_at, processed_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
            )
            .bind(doc.id)
            .bind(doc.user_id)
            .bind(&doc.file_name)
            .bind(&doc.file_type)
            .bind(doc.file_size)
            .bind(doc.content.as_deref().unwrap_or_default())
            .bind(&doc.content_hash)
            .bind(doc.document_type.as_str())
            .bind(doc.status.as_str())
            .bind(doc.is_processed)
            .bind(doc.tax_analysis_ready)
            .bind(doc.cibil_analysis_ready)
            .bind(&doc.last_error)
            .bind(doc.uploaded_at)
            .bind(doc.updated_at)
            .bind(doc.processed_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(documents.into_iter().map(FinancialDocument::without_content).collect())
    }

    async fn list_documents(
        &self,
        user_id: Uuid,
        filter: DocumentFilter,
        page: Pagination,
    ) -> DbResult<Page<FinancialDocument>> {
        const FILTER: &str = "user_id = $1
             AND ($2::text IS NULL OR document_type = $2)
             AND ($3::text IS NULL OR status = $3)";
        let document_type = filter.document_type.map(|t| t.as_str());
        let status = filter.status.map(|s| s.as_str());

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM financial_documents WHERE {FILTER}"))
                .bind(user_id)
                .bind(document_type)
                .bind(status)
                .fetch_one(&self.pool)
                .await?;

        let (limit, offset) = limit_offset(page);
        let sql = format!(
            "SELECT {} FROM financial_documents WHERE {FILTER}
             ORDER BY uploaded_at DESC, id DESC LIMIT $4 OFFSET $5",
            document_columns(false)
        );
        let items = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(user_id)
            .bind(document_type)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(FinancialDocument::try_from)
            .collect::<DbResult<Vec<_>>>()?;

        Ok(Page::new(items, page, total.max(0) as u64))
    }

    async fn all_documents(&self, user_id: Uuid) -> DbResult<Vec<FinancialDocument>> {
        let sql = format!(
            "SELECT {} FROM financial_documents WHERE user_id = $1 ORDER BY uploaded_at DESC, id DESC",
            document_columns(false)
        );
        sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(FinancialDocument::try_from)
            .collect()
    }

    async fn find_document(
        &self,
        user_id: Uuid,
        id: Uuid,
        include_content: bool,
    ) -> DbResult<Option<FinancialDocument>> {
        let sql = format!(
            "SELECT {} FROM financial_documents WHERE id = $1 AND user_id = $2",
            document_columns(include_content)
        );
        sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(FinancialDocument::try_from)
            .transpose()
    }

    async fn list_analyses(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> DbResult<Vec<DocumentAnalysis>> {
        let sql = format!(
            "SELECT {ANALYSIS_COLUMNS} FROM document_analyses
             WHERE document_id = $1 AND user_id = $2 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, AnalysisRow>(&sql)
            .bind(document_id)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(DocumentAnalysis::try_from)
            .collect()
    }

    async fn latest_analysis(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> DbResult<Option<DocumentAnalysis>> {
        let sql = format!(
            "SELECT {ANALYSIS_COLUMNS} FROM document_analyses
             WHERE document_id = $1 AND user_id = $2 ORDER BY created_at DESC, id DESC LIMIT 1"
        );
        sqlx::query_as::<_, AnalysisRow>(&sql)
            .bind(document_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(DocumentAnalysis::try_from)
            .transpose()
    }

    async fn delete_document(&self, user_id: Uuid, id: Uuid) -> DbResult<bool> {
        // document_analyses rows go with it via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM financial_documents WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_processing(&self, user_id: Uuid, id: Uuid) -> DbResult<FinancialDocument> {
        let sql = format!(
            "UPDATE financial_documents SET status = 'processing', updated_at = now()
             WHERE id = $1 AND user_id = $2 RETURNING {}",
            document_columns(false)
        );
        sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Document not found"))?
            .try_into()
    }

    async fn mark_error(&self, user_id: Uuid, id: Uuid, error: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE financial_documents SET status = 'error', last_error = $3, updated_at = now()
             WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Document not found"));
        }
        Ok(())
    }

    async fn record_analysis(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        analysis: NewDocumentAnalysis,
    ) -> DbResult<(FinancialDocument, DocumentAnalysis)> {
        let mut tx = self.pool.begin().await?;
        let mut document = Self::lock_document(&mut tx, user_id, document_id).await?;
        analysis.apply_to(&mut document);
        Self::store_document_state(&mut tx, &document).await?;

        let record = analysis.into_record(document_id, user_id);
        sqlx::query(
            "INSERT INTO document_analyses
                (id, document_id, user_id, analysis_type, document_type, confidence_level,
                 extracted_tax, extracted_credit, recommendations, insights, raw_response, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(record.id)
        .bind(record.document_id)
        .bind(record.user_id)
        .bind(record.analysis_type.as_str())
        .bind(&record.document_type)
        .bind(record.confidence_level)
        .bind(Json(&record.extracted_tax))
        .bind(Json(&record.extracted_credit))
        .bind(Json(&record.recommendations))
        .bind(&record.insights)
        .bind(&record.raw_response)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((document, record))
    }
}

#[async_trait]
impl TaxInputRepository for PgStore {
    async fn find_active_tax_input(&self, user_id: Uuid) -> DbResult<Option<TaxInput>> {
        let sql = format!("SELECT {TAX_INPUT_COLUMNS} FROM tax_inputs WHERE user_id = $1 AND is_active");
        sqlx::query_as::<_, TaxInputRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(TaxInput::try_from)
            .transpose()
    }

    async fn replace_active_tax_input(&self, input: TaxInput, overwrite: bool) -> DbResult<TaxInput> {
        const CONFLICT: &str = "Active tax inputs already exist";
        let mut tx = self.pool.begin().await?;

        if let Some(active) = Self::lock_active_tax_input(&mut tx, input.user_id).await? {
            if !overwrite {
                return Err(DatabaseError::Conflict(CONFLICT.to_string()));
            }
            sqlx::query("UPDATE tax_inputs SET is_active = false, updated_at = now() WHERE id = $1")
                .bind(active.id)
                .execute(&mut *tx)
                .await?;
        }

        let f = &input.figures;
        sqlx::query(&format!(
            "INSERT INTO tax_inputs ({TAX_INPUT_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"
        ))
        .bind(input.id)
        .bind(input.user_id)
        .bind(&input.financial_year)
        .bind(f.annual_income)
        .bind(f.section_80c)
        .bind(f.section_80d)
        .bind(f.section_24b)
        .bind(f.section_80ccd1b)
        .bind(f.section_80tta)
        .bind(f.hra_claimed)
        .bind(Json(&f.other_deductions))
        .bind(input.preferred_regime.as_str())
        .bind(input.source_document_id)
        .bind(input.last_calculation.as_ref().map(Json))
        .bind(input.is_active)
        .bind(input.created_at)
        .bind(input.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| DatabaseError::from_write(e, CONFLICT))?;

        tx.commit().await?;
        Ok(input)
    }

    async fn update_active_tax_input(
        &self,
        user_id: Uuid,
        update: &TaxInputUpdate,
    ) -> DbResult<TaxInput> {
        let mut tx = self.pool.begin().await?;
        let mut input = Self::lock_active_tax_input(&mut tx, user_id)
            .await?
            .ok_or_else(|| DatabaseError::not_found("No active tax inputs"))?;
        update.apply(&mut input);

        let f = &input.figures;
        sqlx::query(
            "UPDATE tax_inputs SET
                financial_year = $2, annual_income = $3, section_80c = $4, section_80d = $5,
                section_24b = $6, section_80ccd1b = $7, section_80tta = $8, hra_claimed = $9,
                other_deductions = $10, preferred_regime = $11, last_calculation = $12,
                updated_at = $13
             WHERE id = $1",
        )
        .bind(input.id)
        .bind(&input.financial_year)
        .bind(f.annual_income)
        .bind(f.section_80c)
        .bind(f.section_80d)
        .bind(f.section_24b)
        .bind(f.section_80ccd1b)
        .bind(f.section_80tta)
        .bind(f.hra_claimed)
        .bind(Json(&f.other_deductions))
        .bind(input.preferred_regime.as_str())
        .bind(input.last_calculation.as_ref().map(Json))
        .bind(input.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(input)
    }

    async fn deactivate_tax_input(&self, user_id: Uuid) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE tax_inputs SET is_active = false, updated_at = now()
             WHERE user_id = $1 AND is_active",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CibilRepository for PgStore {
    async fn insert_cibil_analysis(&self, analysis: CibilAnalysis) -> DbResult<CibilAnalysis> {
        sqlx::query(&format!(
            "INSERT INTO cibil_analyses ({CIBIL_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
        ))
        .bind(analysis.id)
        .bind(analysis.user_id)
        .bind(Json(&analysis.profile))
        .bind(&analysis.analysis)
        .bind(&analysis.response_source)
        .bind(&analysis.session_id)
        .bind(analysis.created_at)
        .execute(&self.pool)
        .await?;
        Ok(analysis)
    }

    async fn list_cibil_analyses(
        &self,
        user_id: Uuid,
        page: Pagination,
    ) -> DbResult<Page<CibilAnalysis>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cibil_analyses WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query_as::<_, CibilRow>(&format!(
            "SELECT {CIBIL_COLUMNS} FROM cibil_analyses WHERE user_id = $1
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(Page::new(
            rows.into_iter().map(CibilAnalysis::from).collect(),
            page,
            total.max(0) as u64,
        ))
    }

    async fn latest_cibil_analysis(&self, user_id: Uuid) -> DbResult<Option<CibilAnalysis>> {
        Ok(sqlx::query_as::<_, CibilRow>(&format!(
            "SELECT {CIBIL_COLUMNS} FROM cibil_analyses WHERE user_id = $1
             ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(CibilAnalysis::from))
    }
}

#[async_trait]
impl SnapshotRepository for PgStore {
    async fn replace_active_snapshot(
        &self,
        snapshot: DashboardSnapshot,
    ) -> DbResult<DashboardSnapshot> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE dashboard_snapshots SET is_active = false WHERE user_id = $1 AND is_active")
            .bind(snapshot.user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!(
            "INSERT INTO dashboard_snapshots ({SNAPSHOT_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(snapshot.id)
        .bind(snapshot.user_id)
        .bind(Json(&snapshot.financial_summary))
        .bind(Json(&snapshot.tax_insights))
        .bind(Json(&snapshot.credit_insights))
        .bind(Json(&snapshot.document_insights))
        .bind(Json(&snapshot.agent_health))
        .bind(snapshot.is_active)
        .bind(snapshot.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| DatabaseError::from_write(e, "A newer snapshot was created concurrently"))?;
        tx.commit().await?;
        Ok(snapshot)
    }

    async fn find_active_snapshot(&self, user_id: Uuid) -> DbResult<Option<DashboardSnapshot>> {
        Ok(sqlx::query_as::<_, SnapshotRow>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM dashboard_snapshots WHERE user_id = $1 AND is_active"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(DashboardSnapshot::from))
    }

    async fn list_snapshots(
        &self,
        user_id: Uuid,
        page: Pagination,
    ) -> DbResult<Page<DashboardSnapshot>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM dashboard_snapshots WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query_as::<_, SnapshotRow>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM dashboard_snapshots WHERE user_id = $1
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(Page::new(
            rows.into_iter().map(DashboardSnapshot::from).collect(),
            page,
            total.max(0) as u64,
        ))
    }
}

#[async_trait]
impl ChatRepository for PgStore {
    async fn append_chat_turns(&self, turns: Vec<ChatTurn>) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        for turn in &turns {
            sqlx::query(&format!(
                "INSERT INTO chat_messages ({CHAT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
            ))
            .bind(turn.id)
            .bind(turn.user_id)
            .bind(turn.role.as_str())
            .bind(&turn.content)
            .bind(&turn.session_id)
            .bind(&turn.query_type)
            .bind(turn.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_chat_turns(&self, user_id: Uuid, limit: u32) -> DbResult<Vec<ChatTurn>> {
        let rows = sqlx::query_as::<_, ChatRow>(&format!(
            "SELECT {CHAT_COLUMNS} FROM (
                 SELECT seq, {CHAT_COLUMNS} FROM chat_messages WHERE user_id = $1
                 ORDER BY seq DESC LIMIT $2
             ) recent ORDER BY seq"
        ))
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ChatTurn::try_from).collect()
    }

    async fn clear_chat_turns(&self, user_id: Uuid) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
