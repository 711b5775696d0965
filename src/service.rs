//! Job handling
//!
//! Turns one `addresses.connectTransactions` job into a pipeline run:
//! validate, load the user's affected transactions, process them, then
//! request an `addresses.update` for the job's addresses.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::DispatchError;
use crate::jobs::{AddressesUpdateJob, ConnectTransactionsJob, JobDispatcher, ADDRESSES_UPDATE};
use crate::pipeline::TransactionProcessor;
use crate::store::Store;
use crate::valuation::CurrencyValuation;
use crate::Result;

/// Result of a job that did not fail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum JobOutcome {
    /// No stored transaction references the job's addresses
    NoTransactions,
    #[serde(rename_all = "camelCase")]
    Processed {
        transactions: usize,
        wallets: usize,
        wallet_updates: usize,
    },
}

/// Runs `addresses.connectTransactions` jobs one at a time.
///
/// Jobs overlapping on a wallet would each read its `lastUsed` before the
/// other commits, so a whole job holds `job_lock` from validation to the
/// last follow-up job.
pub struct TransactionService {
    store: Arc<dyn Store>,
    processor: TransactionProcessor,
    dispatcher: Option<Arc<dyn JobDispatcher>>,
    job_lock: Mutex<()>,
}

impl TransactionService {
    pub fn new(
        store: Arc<dyn Store>,
        valuation: Option<CurrencyValuation>,
        dispatcher: Option<Arc<dyn JobDispatcher>>,
    ) -> Self {
        let processor = TransactionProcessor::new(store.clone(), valuation, dispatcher.clone());
        Self {
            store,
            processor,
            dispatcher,
            job_lock: Mutex::new(()),
        }
    }

    pub async fn handle_connect_transactions(
        &self,
        job: ConnectTransactionsJob,
    ) -> Result<JobOutcome> {
        let _running = self.job_lock.lock().await;
        let job = job.validate()?;
        log::info!(
            "Processing transactions for {} address(es) of wallet {}",
            job.addresses.len(),
            job.wallet_id
        );

        let transactions = self
            .store
            .find_transactions_touching(&job.user_id, &job.addresses)
            .await
            .map_err(|e| {
                log::error!("Loading transactions failed: {}", e);
                e
            })?;

        if transactions.is_empty() {
            log::warn!("No transactions found for addresses");
            return Ok(JobOutcome::NoTransactions);
        }

        let summary = self.processor.process(&job.user_id, transactions).await?;

        match &self.dispatcher {
            Some(dispatcher) => {
                let update = AddressesUpdateJob {
                    addresses: job.addresses,
                    user_id: job.user_id,
                };
                let data = serde_json::to_value(&update).map_err(DispatchError::from)?;
                dispatcher.add_job(ADDRESSES_UPDATE, data).await?;
            }
            None => log::warn!("No job dispatcher configured. Not triggering address update job."),
        }

        Ok(JobOutcome::Processed {
            transactions: summary.transactions,
            wallets: summary.wallets,
            wallet_updates: summary.notifications,
        })
    }
}
