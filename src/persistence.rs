//! Batch persistence
//!
//! Writes enriched transactions and advanced wallet state as two
//! independent operations. There is no cross-collection atomicity: if one
//! side fails the other may already be stored, and redelivery of the job
//! recomputes the same values.

use futures::future::try_join_all;
use std::sync::Arc;

use crate::error::{DispatchError, ProcessorError};
use crate::jobs::{JobDispatcher, WalletUpdateJob, WALLET_UPDATE};
use crate::model::{Chain, Transaction, TransactionUpdate, Wallet};
use crate::store::Store;

/// Counts of what a commit wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub transactions: usize,
    pub wallets: usize,
    pub notifications: usize,
}

#[derive(Clone)]
pub struct PersistenceCoordinator {
    store: Arc<dyn Store>,
    dispatcher: Option<Arc<dyn JobDispatcher>>,
}

impl PersistenceCoordinator {
    pub fn new(store: Arc<dyn Store>, dispatcher: Option<Arc<dyn JobDispatcher>>) -> Self {
        Self { store, dispatcher }
    }

    /// Store transactions and wallets concurrently and wait for both.
    ///
    /// Either failure becomes the batch error; the transaction error wins
    /// when both fail.
    pub async fn commit(
        &self,
        transactions: &[Transaction],
        wallets: &[Wallet],
    ) -> Result<CommitSummary, ProcessorError> {
        let (saved, notified) = tokio::join!(
            self.save_transactions(transactions),
            self.save_wallets(wallets)
        );

        if let Err(e) = &notified {
            log::error!("Wallet save failed: {}", e);
        }
        let transactions = saved.map_err(|e| {
            log::error!("Transaction save failed: {}", e);
            e
        })?;
        let notifications = notified?;

        Ok(CommitSummary {
            transactions,
            wallets: wallets.len(),
            notifications,
        })
    }

    /// One unordered bulk of field updates keyed by transaction id
    pub async fn save_transactions(
        &self,
        transactions: &[Transaction],
    ) -> Result<usize, ProcessorError> {
        log::debug!("Saving {} transaction(s)", transactions.len());
        let updates: Vec<TransactionUpdate> = transactions.iter().map(TransactionUpdate::from).collect();
        Ok(self.store.bulk_update_transactions(updates).await?)
    }

    /// Write `lastUsed` of both chains for every wallet, then request a
    /// `wallet.update` for each. Returns the number of jobs dispatched.
    pub async fn save_wallets(&self, wallets: &[Wallet]) -> Result<usize, ProcessorError> {
        if wallets.is_empty() {
            return Err(ProcessorError::invariant("No wallets affected"));
        }

        let writes = wallets.iter().flat_map(|wallet| {
            Chain::ALL.into_iter().map(move |chain| {
                let last_used = wallet.derivation_params.last_used(chain);
                log::debug!("Setting {} {} lastUsed to {}", wallet.id, chain, last_used);
                self.store.set_wallet_last_used(&wallet.id, chain, last_used)
            })
        });
        try_join_all(writes).await?;

        let Some(dispatcher) = &self.dispatcher else {
            log::warn!("No job dispatcher configured. Not triggering further wallet update jobs.");
            return Ok(0);
        };

        for wallet in wallets {
            let job = WalletUpdateJob {
                wallet_id: wallet.id.clone(),
                user_id: wallet.user_id.clone(),
            };
            let data = serde_json::to_value(&job).map_err(DispatchError::from)?;
            dispatcher.add_job(WALLET_UPDATE, data).await?;
        }
        Ok(wallets.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::model::{Address, AddressId, TransferDetails, WalletId};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Store whose writes fail on demand and that records successful writes
    #[derive(Default)]
    struct WriteStore {
        fail_transactions: bool,
        fail_wallets: bool,
        applied: Mutex<Vec<String>>,
        wallet_writes: Mutex<Vec<(String, Chain, i64)>>,
    }

    #[async_trait]
    impl Store for WriteStore {
        async fn find_transactions_touching(
            &self,
            _user_id: &str,
            _addresses: &[String],
        ) -> Result<Vec<Transaction>, StoreError> {
            Ok(Vec::new())
        }

        async fn find_addresses(
            &self,
            _user_id: &str,
            _addresses: &[String],
        ) -> Result<Vec<Address>, StoreError> {
            Ok(Vec::new())
        }

        async fn find_address_ids(
            &self,
            _user_id: &str,
            _addresses: &[String],
        ) -> Result<HashMap<String, AddressId>, StoreError> {
            Ok(HashMap::new())
        }

        async fn find_wallets(
            &self,
            _user_id: &str,
            _wallet_ids: &[WalletId],
        ) -> Result<Vec<Wallet>, StoreError> {
            Ok(Vec::new())
        }

        async fn find_address_by_id(&self, _id: &str) -> Result<Option<Address>, StoreError> {
            Ok(None)
        }

        async fn find_wallet_by_id(&self, _id: &str) -> Result<Option<Wallet>, StoreError> {
            Ok(None)
        }

        async fn bulk_update_transactions(
            &self,
            updates: Vec<TransactionUpdate>,
        ) -> Result<usize, StoreError> {
            if self.fail_transactions {
                return Err(StoreError::BulkWrite {
                    failed: updates.into_iter().map(|u| u.id).collect(),
                    applied: 0,
                });
            }
            let mut applied = self.applied.lock().unwrap();
            applied.extend(updates.iter().map(|u| u.id.clone()));
            Ok(updates.len())
        }

        async fn set_wallet_last_used(
            &self,
            wallet_id: &str,
            chain: Chain,
            last_used: i64,
        ) -> Result<(), StoreError> {
            if self.fail_wallets {
                return Err(StoreError::DocumentNotFound {
                    collection: "bitcoinwallets".into(),
                    id: wallet_id.into(),
                });
            }
            self.wallet_writes
                .lock()
                .unwrap()
                .push((wallet_id.to_string(), chain, last_used));
            Ok(())
        }
    }

    fn wallet(id: &str, main: i64, change: i64) -> Wallet {
        let mut wallet = Wallet {
            id: id.into(),
            user_id: "u1".into(),
            label: id.into(),
            derivation_params: Default::default(),
        };
        wallet.derivation_params.main.last_used = main;
        wallet.derivation_params.change.last_used = change;
        wallet
    }

    fn transaction(id: &str) -> Transaction {
        Transaction {
            id: id.into(),
            user_id: "u1".into(),
            date: Utc::now(),
            details: TransferDetails::default(),
            representation: None,
            base_volume: None,
            updated_at: None,
            hidden: true,
        }
    }

    #[tokio::test]
    async fn test_wallet_save_writes_both_chains() {
        let store = Arc::new(WriteStore::default());
        let coordinator = PersistenceCoordinator::new(store.clone(), None);

        let summary = coordinator
            .commit(&[transaction("t1")], &[wallet("w1", 7, 2)])
            .await
            .unwrap();
        assert_eq!(summary.transactions, 1);
        assert_eq!(summary.wallets, 1);
        assert_eq!(summary.notifications, 0);

        let mut writes = store.wallet_writes.lock().unwrap().clone();
        writes.sort_by_key(|(_, chain, _)| chain.as_str());
        assert_eq!(
            writes,
            vec![
                ("w1".to_string(), Chain::Change, 2),
                ("w1".to_string(), Chain::Main, 7),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_wallets_is_invariant_violation() {
        let coordinator = PersistenceCoordinator::new(Arc::new(WriteStore::default()), None);
        let err = coordinator.save_wallets(&[]).await.unwrap_err();
        assert!(matches!(err, ProcessorError::InvariantViolation(_)));
    }

    #[tokio::test]
    async fn test_transaction_error_wins_when_both_fail() {
        let store = Arc::new(WriteStore {
            fail_transactions: true,
            fail_wallets: true,
            ..Default::default()
        });
        let coordinator = PersistenceCoordinator::new(store, None);

        let err = coordinator
            .commit(&[transaction("t1")], &[wallet("w1", 1, 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessorError::Store(StoreError::BulkWrite { .. })));
    }

    #[tokio::test]
    async fn test_wallet_error_fails_commit() {
        let store = Arc::new(WriteStore {
            fail_wallets: true,
            ..Default::default()
        });
        let coordinator = PersistenceCoordinator::new(store.clone(), None);

        let err = coordinator
            .commit(&[transaction("t1")], &[wallet("w1", 1, 1)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::Store(StoreError::DocumentNotFound { .. })
        ));

        // The transaction save runs alongside and is not rolled back
        assert_eq!(*store.applied.lock().unwrap(), vec!["t1".to_string()]);
        assert!(store.wallet_writes.lock().unwrap().is_empty());
    }
}
