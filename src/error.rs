//! Error types for the transfer enrichment pipeline
//!
//! One top-level error per failure category a batch can hit, plus the
//! narrower errors raised by the store, the price service and the
//! downstream job system.

use thiserror::Error;

/// Top-level error for a batch or a job
#[derive(Error, Debug)]
pub enum ProcessorError {
    /// Malformed job message. The message is reported verbatim as the job failure.
    #[error("{0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Valuation error: {0}")]
    Valuation(#[from] ValuationError),

    /// Corrupt upstream data or a broken precondition. Never retried.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

impl ProcessorError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed document {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Document not found: {collection}/{id}")]
    DocumentNotFound { collection: String, id: String },

    #[error("Cannot set {field} on {document}: parent is not an object")]
    FieldConflict { document: String, field: String },

    #[error("Invalid document id: {0}")]
    InvalidId(String),

    /// Some updates of an unordered bulk failed; the others were applied.
    #[error("Bulk write failed for {} document(s) ({applied} applied): {}", failed.len(), failed.join(", "))]
    BulkWrite { failed: Vec<String>, applied: usize },
}

#[derive(Error, Debug)]
pub enum ValuationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Price service returned status {status} for {currency}")]
    Status { status: u16, currency: String },

    #[error("Unreadable price response for {currency}: {source}")]
    Decode {
        currency: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("No {asset} price in {currency} response")]
    MissingPrice { asset: String, currency: String },
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Could not encode job: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Job system rejected {kind} job with status {status}")]
    Status { kind: String, status: u16 },
}
