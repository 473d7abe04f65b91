// handlers/protected/documents/mod.rs - Financial document handlers

pub mod analyze; // POST /api/documents/:id/analyze
pub mod record;  // GET /api/documents, GET|DELETE /api/documents/:id, GET /api/documents/:id/analyses
pub mod upload;  // POST /api/documents/upload

pub use analyze::analyze_post;
pub use record::{analyses_get, document_delete, document_get, list_get};
pub use upload::upload_post;
