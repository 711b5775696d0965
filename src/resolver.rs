//! Address and wallet resolution
//!
//! Maps the raw address strings touched by a batch to the user's address
//! records and the wallets owning them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{ProcessorError, StoreError};
use crate::model::{Address, AddressId, Transaction, Wallet, WalletRef};
use crate::store::Store;

/// Address and wallet records matched for one batch
#[derive(Debug, Clone)]
pub struct ResolvedAddresses {
    pub addresses: Vec<Address>,
    pub wallets: Vec<Wallet>,
}

/// Distinct address strings across all inputs and outputs of `transactions`,
/// in first-seen order. Addresses are compared case-sensitively.
pub fn affected_addresses(transactions: &[Transaction]) -> Vec<String> {
    let mut seen = HashSet::new();
    transactions
        .iter()
        .flat_map(|tx| tx.details.entries())
        .filter(|entry| seen.insert(entry.note.as_str()))
        .map(|entry| entry.note.clone())
        .collect()
}

#[derive(Clone)]
pub struct AddressResolver {
    store: Arc<dyn Store>,
}

impl AddressResolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Load the user's address records for `addresses` and the wallets they belong to.
    ///
    /// Fails with `NotFound` when no wallet matches.
    pub async fn resolve(
        &self,
        user_id: &str,
        addresses: &[String],
    ) -> Result<ResolvedAddresses, ProcessorError> {
        log::debug!("Getting affected addresses");
        let records = self.store.find_addresses(user_id, addresses).await.map_err(|e| {
            log::error!("Address lookup failed: {}", e);
            e
        })?;

        let mut wallet_ids: Vec<String> = Vec::new();
        for record in &records {
            if !wallet_ids.contains(&record.wallet_id) {
                wallet_ids.push(record.wallet_id.clone());
            }
        }
        log::debug!("Getting affected wallets: {:?}", wallet_ids);

        let wallets = self.store.find_wallets(user_id, &wallet_ids).await.map_err(|e| {
            log::error!("Wallet lookup failed: {}", e);
            e
        })?;

        if wallets.is_empty() {
            return Err(ProcessorError::not_found(format!(
                "No wallets found for {} address(es) of user {}",
                addresses.len(),
                user_id
            )));
        }
        log::debug!("Found {} affected wallet(s)", wallets.len());

        Ok(ResolvedAddresses {
            addresses: records,
            wallets,
        })
    }

    /// Raw address string to address id, for the same user and address set
    pub async fn address_ids(
        &self,
        user_id: &str,
        addresses: &[String],
    ) -> Result<HashMap<String, AddressId>, ProcessorError> {
        let mapping = self.store.find_address_ids(user_id, addresses).await.map_err(|e| {
            log::error!("Address mapping failed: {}", e);
            e
        })?;
        Ok(mapping)
    }

    /// Follow `node_id -> address -> wallet`.
    ///
    /// A missing address or wallet yields `None` (unknown counter-party);
    /// only store failures are errors.
    pub async fn wallet_for_node(
        &self,
        node_id: Option<&str>,
    ) -> Result<Option<WalletRef>, StoreError> {
        let Some(node_id) = node_id else {
            return Ok(None);
        };
        let Some(address) = self.store.find_address_by_id(node_id).await? else {
            return Ok(None);
        };
        let wallet = self.store.find_wallet_by_id(&address.wallet_id).await?;
        Ok(wallet.map(|w| w.to_ref()))
    }
}
