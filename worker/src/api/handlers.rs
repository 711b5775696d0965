/// Axum handlers for the job intake

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use transfer_enrichment::{ConnectTransactionsJob, JobOutcome, ProcessorError, TransactionService};

/// Shared application state
pub type AppState = Arc<TransactionService>;

/// Failure reported back to the queue bridge
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<ProcessorError> for ApiError {
    fn from(err: ProcessorError) -> Self {
        match err {
            ProcessorError::Validation(_) => ApiError::BadRequest(err.to_string()),
            ProcessorError::NotFound(_) => ApiError::NotFound(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub outcome: JobOutcome,
}

/// POST /jobs/addresses.connectTransactions
/// Runs one job to completion; the queue bridge acknowledges on 200
pub async fn connect_transactions_handler(
    State(service): State<AppState>,
    Json(job): Json<ConnectTransactionsJob>,
) -> Result<Json<JobResponse>, ApiError> {
    let outcome = service.handle_connect_transactions(job).await?;
    Ok(Json(JobResponse {
        status: "done",
        outcome,
    }))
}

/// GET /health
pub async fn health_check() -> &'static str {
    "ok"
}
