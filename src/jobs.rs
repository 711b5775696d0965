//! Job queue messages and downstream job dispatch
//!
//! Incoming work arrives as `addresses.connectTransactions` jobs. After a
//! batch is stored, follow-up `wallet.update` and `addresses.update` jobs
//! are handed to a `JobDispatcher`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{DispatchError, ProcessorError};

/// Topic this worker consumes
pub const CONNECT_TRANSACTIONS: &str = "addresses.connectTransactions";
/// Emitted once per wallet whose derivation state was stored
pub const WALLET_UPDATE: &str = "wallet.update";
/// Emitted once per processed job with the job's addresses
pub const ADDRESSES_UPDATE: &str = "addresses.update";

/// `addresses.connectTransactions` payload as delivered by the queue.
///
/// Every field is optional here so that a malformed job can be reported
/// with the name of the missing field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectTransactionsJob {
    pub addresses: Option<Vec<String>>,
    pub user_id: Option<String>,
    pub wallet_id: Option<String>,
}

/// A `ConnectTransactionsJob` with every required field present
#[derive(Debug, Clone, PartialEq)]
pub struct ValidJob {
    pub addresses: Vec<String>,
    pub user_id: String,
    pub wallet_id: String,
}

impl ConnectTransactionsJob {
    pub fn validate(self) -> Result<ValidJob, ProcessorError> {
        let addresses = self.addresses.ok_or_else(|| {
            log::error!("Got job without addresses");
            ProcessorError::validation("No addresses to work on.")
        })?;
        let user_id = self.user_id.filter(|id| !id.is_empty()).ok_or_else(|| {
            log::error!("Job without user id.");
            ProcessorError::validation("Invalid User Id.")
        })?;
        let wallet_id = self.wallet_id.filter(|id| !id.is_empty()).ok_or_else(|| {
            log::error!("Job without wallet id.");
            ProcessorError::validation("No Wallet Id provided.")
        })?;

        Ok(ValidJob {
            addresses,
            user_id,
            wallet_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletUpdateJob {
    pub wallet_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressesUpdateJob {
    pub addresses: Vec<String>,
    pub user_id: String,
}

/// Sink for follow-up jobs
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn add_job(&self, kind: &str, data: Value) -> Result<(), DispatchError>;
}

/// Creates jobs through the job queue's JSON API (`POST {base}/job`)
pub struct HttpJobDispatcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpJobDispatcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl JobDispatcher for HttpJobDispatcher {
    async fn add_job(&self, kind: &str, data: Value) -> Result<(), DispatchError> {
        let url = format!("{}/job", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "type": kind, "data": data }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DispatchError::Status {
                kind: kind.to_string(),
                status: response.status().as_u16(),
            });
        }

        log::debug!("Queued {} job", kind);
        Ok(())
    }
}
