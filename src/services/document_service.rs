use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::UploadConfig;
use crate::database::models::{
    DocumentAnalysis, DocumentFilter, DocumentWithAnalyses, FinancialDocument, NewDocument,
    NewDocumentAnalysis,
};
use crate::database::repository::DocumentRepository;
use crate::database::pagination::{DEFAULT_LIMIT, DEFAULT_PAGE};
use crate::database::{Page, Pagination, Store};
use crate::error::ApiError;
use crate::gateway::{AnalysisGateway, DocumentAnalysisResult, DocumentUpload};
use crate::state::AppState;
use crate::types::{AnalysisType, DocumentStatus, DocumentType};

/// Extensions accepted for upload and the MIME types that go with them.
const ALLOWED_TYPES: &[(&str, &[&str])] = &[
    ("pdf", &["application/pdf"]),
    ("csv", &["text/csv", "application/csv"]),
    ("xls", &["application/vnd.ms-excel"]),
    (
        "xlsx",
        &["application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"],
    ),
    ("txt", &["text/plain"]),
    ("png", &["image/png"]),
    ("jpg", &["image/jpeg", "image/jpg"]),
    ("jpeg", &["image/jpeg", "image/jpg"]),
];

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadFile {
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    #[validate(length(min = 1, max = 255))]
    pub file_type: String,
    #[validate(range(min = 0))]
    pub file_size: i64,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UploadRequest {
    #[validate(length(min = 1, message = "at least one file is required"), nested)]
    pub files: Vec<UploadFile>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DocumentListQuery {
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: u32,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: u32,
    pub document_type: Option<DocumentType>,
    pub status: Option<DocumentStatus>,
}

fn default_page() -> u32 {
    DEFAULT_PAGE
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DocumentQuery {
    #[serde(default)]
    pub include_content: bool,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub analysis_type: AnalysisType,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeOutcome {
    pub document: FinancialDocument,
    pub analysis: DocumentAnalysis,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn extension(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

pub fn is_allowed_type(file_name: &str, mime_type: &str) -> bool {
    let mime = mime_type.trim().to_ascii_lowercase();
    let Some(ext) = extension(file_name) else {
        return false;
    };
    ALLOWED_TYPES
        .iter()
        .find(|(allowed, _)| *allowed == ext)
        .map_or(false, |(_, mimes)| mimes.contains(&mime.as_str()))
}

/// Best-effort category from the file name, falling back on the MIME type.
pub fn derive_document_type(file_name: &str, mime_type: &str) -> DocumentType {
    let name = file_name.to_ascii_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| name.contains(n));

    if has(&["form16", "form-16", "form_16", "form 16"]) {
        DocumentType::Form16
    } else if has(&["salary", "payslip", "pay_slip", "pay-slip"]) {
        DocumentType::SalarySlip
    } else if has(&["cibil", "credit"]) {
        DocumentType::CreditReport
    } else if has(&["investment", "80c", "elss", "ppf", "insurance"]) {
        DocumentType::InvestmentProof
    } else if has(&["bank", "statement"]) {
        DocumentType::BankStatement
    } else {
        match mime_type.trim().to_ascii_lowercase().as_str() {
            "text/csv" | "application/csv" | "application/vnd.ms-excel"
            | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                DocumentType::BankStatement
            }
            _ => DocumentType::Other,
        }
    }
}

/// Accepts raw base64 or a `data:<mime>;base64,` URL.
fn strip_data_url(content: &str) -> &str {
    let trimmed = content.trim();
    match trimmed.strip_prefix("data:") {
        Some(rest) => rest.split_once(";base64,").map_or(trimmed, |(_, data)| data),
        None => trimmed,
    }
}

/// Checks one file and turns it into an insertable record.
pub fn prepare_upload(file: UploadFile, limits: &UploadConfig) -> Result<NewDocument, ApiError> {
    let name = file.file_name.trim().to_string();
    if !is_allowed_type(&name, &file.file_type) {
        return Err(ApiError::bad_request(format!(
            "Unsupported file type for '{name}' ({}); allowed: PDF, CSV, XLS, XLSX, TXT, PNG, JPEG",
            file.file_type
        )));
    }

    let max = limits.max_file_size_bytes;
    if file.file_size as u64 > max as u64 {
        return Err(ApiError::bad_request(format!(
            "'{name}' exceeds the maximum file size of {max} bytes"
        )));
    }

    let encoded = strip_data_url(&file.content);
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| ApiError::bad_request(format!("'{name}' is not valid base64: {e}")))?;
    if bytes.len() > max {
        return Err(ApiError::bad_request(format!(
            "'{name}' exceeds the maximum file size of {max} bytes"
        )));
    }
    if bytes.len() as i64 != file.file_size {
        return Err(ApiError::bad_request(format!(
            "'{name}' declares {} bytes but contains {}",
            file.file_size,
            bytes.len()
        )));
    }

    Ok(NewDocument {
        document_type: derive_document_type(&name, &file.file_type),
        file_type: file.file_type.trim().to_ascii_lowercase(),
        file_size: file.file_size,
        content_hash: sha256_hex(&bytes),
        content: encoded.to_string(),
        file_name: name,
    })
}

fn into_new_analysis(analysis_type: AnalysisType, result: DocumentAnalysisResult) -> NewDocumentAnalysis {
    let extraction = result.extraction;
    NewDocumentAnalysis {
        analysis_type,
        document_type: extraction.financial_summary.document_type.clone(),
        confidence_level: extraction.confidence(),
        tax_ready: extraction.tax_ready(),
        cibil_ready: extraction.cibil_ready(),
        recommendations: extraction.recommendations(),
        insights: extraction.ai_insights.clone(),
        extracted_credit: extraction.cibil_agent_format.clone().into(),
        extracted_tax: extraction.tax_agent_format.into(),
        raw_response: result.raw,
    }
}

pub struct DocumentService {
    store: Arc<dyn Store>,
    gateway: Arc<dyn AnalysisGateway>,
    limits: UploadConfig,
}

impl DocumentService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            gateway: state.gateway.clone(),
            limits: state.config.uploads.clone(),
        }
    }

    pub async fn upload(
        &self,
        user_id: Uuid,
        request: UploadRequest,
    ) -> Result<Vec<FinancialDocument>, ApiError> {
        let max_files = self.limits.max_files_per_batch;
        if request.files.len() > max_files {
            return Err(ApiError::bad_request(format!(
                "At most {max_files} files may be uploaded at once"
            )));
        }

        // Every file must pass before anything is stored.
        let records = request
            .files
            .into_iter()
            .map(|file| prepare_upload(file, &self.limits).map(|doc| doc.into_record(user_id)))
            .collect::<Result<Vec<_>, _>>()?;

        let stored = self.store.insert_documents(records).await?;
        info!(%user_id, count = stored.len(), "Documents uploaded");
        Ok(stored)
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        query: DocumentListQuery,
    ) -> Result<Page<FinancialDocument>, ApiError> {
        let filter = DocumentFilter {
            document_type: query.document_type,
            status: query.status,
        };
        Ok(self
            .store
            .list_documents(user_id, filter, Pagination::new(query.page, query.limit))
            .await?)
    }

    pub async fn get(
        &self,
        user_id: Uuid,
        id: Uuid,
        include_content: bool,
    ) -> Result<DocumentWithAnalyses, ApiError> {
        let document = self.find(user_id, id, include_content).await?;
        let analyses = self.store.list_analyses(user_id, id).await?;
        Ok(DocumentWithAnalyses { document, analyses })
    }

    pub async fn analyses(&self, user_id: Uuid, id: Uuid) -> Result<Vec<DocumentAnalysis>, ApiError> {
        self.find(user_id, id, false).await?;
        Ok(self.store.list_analyses(user_id, id).await?)
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), ApiError> {
        if !self.store.delete_document(user_id, id).await? {
            return Err(document_not_found());
        }
        info!(%user_id, document_id = %id, "Document deleted");
        Ok(())
    }

    /// Forwards the stored file for extraction and records the outcome.
    pub async fn analyze(
        &self,
        user_id: Uuid,
        id: Uuid,
        request: AnalyzeRequest,
    ) -> Result<AnalyzeOutcome, ApiError> {
        let document = self.find(user_id, id, true).await?;
        let bytes = STANDARD
            .decode(document.content.as_deref().unwrap_or_default())
            .map_err(|e| ApiError::internal_server_error(format!("stored content is corrupt: {e}")))?;

        self.store.mark_processing(user_id, id).await?;

        let upload = DocumentUpload {
            file_name: document.file_name.clone(),
            mime_type: document.file_type.clone(),
            bytes,
        };
        let result = match self.gateway.analyze_document(upload).await {
            Ok(result) => result,
            Err(err) => {
                warn!(%user_id, document_id = %id, error = %err, "Document analysis failed");
                self.store.mark_error(user_id, id, &err.to_string()).await?;
                return Err(err.into());
            }
        };

        let new_analysis = into_new_analysis(request.analysis_type, result);
        let (document, analysis) = match self.store.record_analysis(user_id, id, new_analysis).await {
            Ok(recorded) => recorded,
            Err(err) => {
                warn!(%user_id, document_id = %id, error = %err, "Storing document analysis failed");
                if let Err(mark_err) = self
                    .store
                    .mark_error(user_id, id, &format!("Failed to store analysis: {err}"))
                    .await
                {
                    warn!(%user_id, document_id = %id, error = %mark_err, "Could not mark document as failed");
                }
                return Err(err.into());
            }
        };

        info!(
            %user_id,
            document_id = %id,
            analysis_type = %analysis.analysis_type,
            confidence = analysis.confidence_level,
            "Document analysed"
        );
        Ok(AnalyzeOutcome { document, analysis })
    }

    async fn find(
        &self,
        user_id: Uuid,
        id: Uuid,
        include_content: bool,
    ) -> Result<FinancialDocument, ApiError> {
        self.store
            .find_document(user_id, id, include_content)
            .await?
            .ok_or_else(document_not_found)
    }
}

fn document_not_found() -> ApiError {
    ApiError::not_found("Document not found")
}
