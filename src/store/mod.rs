//! Document store access
//!
//! - `Store` trait over the `transfers`, `bitcoinaddresses` and
//!   `bitcoinwallets` collections
//! - File system backend (one JSON document per record)

mod file_system;

pub use file_system::FsStore;

use crate::error::StoreError;
use crate::model::{Address, AddressId, Chain, Transaction, TransactionUpdate, Wallet, WalletId};
use async_trait::async_trait;
use std::collections::HashMap;

/// Store collections, named as they are in the document store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Transfers,
    Addresses,
    Wallets,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Transfers => "transfers",
            Collection::Addresses => "bitcoinaddresses",
            Collection::Wallets => "bitcoinwallets",
        }
    }
}

/// Narrow interface the pipeline needs from the document store.
///
/// Implementations are shared process-wide and must be safe for concurrent
/// use by the stages of one batch.
#[async_trait]
pub trait Store: Send + Sync {
    /// Transactions of `user_id` with at least one input or output in `addresses`
    async fn find_transactions_touching(
        &self,
        user_id: &str,
        addresses: &[String],
    ) -> Result<Vec<Transaction>, StoreError>;

    /// Address records of `user_id` whose address string is in `addresses`
    async fn find_addresses(
        &self,
        user_id: &str,
        addresses: &[String],
    ) -> Result<Vec<Address>, StoreError>;

    /// Address string to address id for the same selection as `find_addresses`
    async fn find_address_ids(
        &self,
        user_id: &str,
        addresses: &[String],
    ) -> Result<HashMap<String, AddressId>, StoreError>;

    async fn find_wallets(
        &self,
        user_id: &str,
        wallet_ids: &[WalletId],
    ) -> Result<Vec<Wallet>, StoreError>;

    async fn find_address_by_id(&self, id: &str) -> Result<Option<Address>, StoreError>;

    async fn find_wallet_by_id(&self, id: &str) -> Result<Option<Wallet>, StoreError>;

    /// Apply an unordered bulk of transaction field updates.
    ///
    /// Every update is attempted. Returns the number applied, or
    /// `StoreError::BulkWrite` naming the ids that failed.
    async fn bulk_update_transactions(
        &self,
        updates: Vec<TransactionUpdate>,
    ) -> Result<usize, StoreError>;

    /// Set `derivationParams.<chain>.lastUsed` of one wallet
    async fn set_wallet_last_used(
        &self,
        wallet_id: &str,
        chain: Chain,
        last_used: i64,
    ) -> Result<(), StoreError>;
}
