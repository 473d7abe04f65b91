// handlers/protected/tax/mod.rs - Tax inputs and tax calculation handlers

pub mod calculate; // POST /api/tax/calculate, /api/tax/optimize, /api/tax/query
pub mod inputs;    // /api/tax-inputs, POST /api/tax-inputs/from-document

pub use calculate::{calculate_post, optimize_post, query_post};
pub use inputs::{from_document_post, inputs_delete, inputs_get, inputs_post, inputs_put};
