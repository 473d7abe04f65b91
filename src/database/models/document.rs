use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::cibil::CreditProfile;
use crate::types::{AnalysisType, DocumentStatus, DocumentType};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialDocument {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    /// Base64 payload; only loaded when explicitly requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub content_hash: String,
    pub document_type: DocumentType,
    pub status: DocumentStatus,
    pub is_processed: bool,
    pub tax_analysis_ready: bool,
    pub cibil_analysis_ready: bool,
    pub last_error: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl FinancialDocument {
    pub fn without_content(mut self) -> Self {
        self.content = None;
        self
    }
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub content: String,
    pub content_hash: String,
    pub document_type: DocumentType,
}

impl NewDocument {
    pub fn into_record(self, user_id: Uuid) -> FinancialDocument {
        let now = Utc::now();
        FinancialDocument {
            id: Uuid::new_v4(),
            user_id,
            file_name: self.file_name,
            file_type: self.file_type,
            file_size: self.file_size,
            content: Some(self.content),
            content_hash: self.content_hash,
            document_type: self.document_type,
            status: DocumentStatus::Uploaded,
            is_processed: false,
            tax_analysis_ready: false,
            cibil_analysis_ready: false,
            last_error: None,
            uploaded_at: now,
            updated_at: now,
            processed_at: None,
        }
    }
}

/// Tax figures as extracted from a document, before any clamping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTaxFigures {
    #[serde(rename = "annualIncome")]
    pub annual_income: f64,
    #[serde(rename = "section80C")]
    pub section_80c: f64,
    #[serde(rename = "section80D")]
    pub section_80d: f64,
    #[serde(rename = "section24B")]
    pub section_24b: f64,
    #[serde(rename = "hraClaimed")]
    pub hra_claimed: f64,
    #[serde(rename = "otherDeductions", default)]
    pub other_deductions: BTreeMap<String, f64>,
}

/// Immutable result of one analysis round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAnalysis {
    pub id: Uuid,
    pub document_id: Uuid,
    pub user_id: Uuid,
    pub analysis_type: AnalysisType,
    /// Category reported by the analyser; free-form.
    pub document_type: String,
    /// Extraction confidence in `0.0..=1.0`.
    pub confidence_level: f64,
    pub extracted_tax: ExtractedTaxFigures,
    pub extracted_credit: CreditProfile,
    pub recommendations: Vec<String>,
    pub insights: Option<String>,
    pub raw_response: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDocumentAnalysis {
    pub analysis_type: AnalysisType,
    pub document_type: String,
    pub confidence_level: f64,
    pub extracted_tax: ExtractedTaxFigures,
    pub extracted_credit: CreditProfile,
    pub recommendations: Vec<String>,
    pub insights: Option<String>,
    pub raw_response: Value,
    pub tax_ready: bool,
    pub cibil_ready: bool,
}

impl NewDocumentAnalysis {
    pub fn into_record(self, document_id: Uuid, user_id: Uuid) -> DocumentAnalysis {
        DocumentAnalysis {
            id: Uuid::new_v4(),
            document_id,
            user_id,
            analysis_type: self.analysis_type,
            document_type: self.document_type,
            confidence_level: self.confidence_level.clamp(0.0, 1.0),
            extracted_tax: self.extracted_tax,
            extracted_credit: self.extracted_credit,
            recommendations: self.recommendations,
            insights: self.insights,
            raw_response: self.raw_response,
            created_at: Utc::now(),
        }
    }

    /// Applies the processed-state transition to the owning document.
    /// Readiness flags only ever move from false to true.
    pub fn apply_to(&self, document: &mut FinancialDocument) {
        let now = Utc::now();
        document.status = DocumentStatus::Processed;
        document.is_processed = true;
        document.tax_analysis_ready |= self.tax_ready;
        document.cibil_analysis_ready |= self.cibil_ready;
        document.last_error = None;
        document.processed_at = Some(now);
        document.updated_at = now;
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentWithAnalyses {
    #[serde(flatten)]
    pub document: FinancialDocument,
    pub analyses: Vec<DocumentAnalysis>,
}

/// Optional filters for the document listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentFilter {
    pub document_type: Option<DocumentType>,
    pub status: Option<DocumentStatus>,
}

impl DocumentFilter {
    pub fn matches(&self, doc: &FinancialDocument) -> bool {
        self.document_type.map_or(true, |t| doc.document_type == t)
            && self.status.map_or(true, |s| doc.status == s)
    }
}
