//! Wallet derivation bookkeeping
//!
//! Advances `derivationParams.<chain>.lastUsed` of the batch's wallets as
//! addresses are seen in transactions. Values only ever move up.

use std::collections::HashMap;

use crate::error::ProcessorError;
use crate::model::{Address, Chain, Wallet, WalletId};

/// Outcome of recording one address use
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerChange {
    /// Address is outside any derivation sequence
    Skipped,
    /// Order was not above the wallet's current `lastUsed`
    Unchanged,
    Advanced {
        wallet_id: WalletId,
        chain: Chain,
        from: i64,
        to: i64,
    },
}

/// In-memory wallet state for one batch
#[derive(Debug, Clone)]
pub struct WalletLedger {
    addresses: HashMap<String, Address>,
    wallets: Vec<Wallet>,
}

impl WalletLedger {
    pub fn new(addresses: Vec<Address>, wallets: Vec<Wallet>) -> Self {
        let addresses = addresses
            .into_iter()
            .map(|a| (a.address.clone(), a))
            .collect();
        Self { addresses, wallets }
    }

    /// Record that `address` appears in a transaction of the batch.
    ///
    /// Sets the owning wallet's `lastUsed` on the address's chain to
    /// `max(lastUsed, order)`. Non-sequenced addresses (order -1) are skipped.
    /// Missing derivation metadata or an unknown wallet is an invariant violation.
    pub fn record_use(&mut self, address: &str) -> Result<LedgerChange, ProcessorError> {
        let record = self.addresses.get(address).ok_or_else(|| {
            ProcessorError::invariant(format!("address {} was not resolved for this batch", address))
        })?;

        let params = record.derivation_params.as_ref().ok_or_else(|| {
            ProcessorError::invariant(format!("address {} has no derivation params", address))
        })?;

        if !params.is_sequenced() {
            log::debug!("Skipping derivation param update for single address {}", address);
            return Ok(LedgerChange::Skipped);
        }

        let chain = params.chain.ok_or_else(|| {
            ProcessorError::invariant(format!("address {} has no derivation chain", address))
        })?;
        let order = params.order.ok_or_else(|| {
            ProcessorError::invariant(format!("address {} has no derivation order", address))
        })?;

        let wallet = self
            .wallets
            .iter_mut()
            .find(|w| w.id == record.wallet_id)
            .ok_or_else(|| {
                ProcessorError::invariant(format!(
                    "wallet {} of address {} is not loaded",
                    record.wallet_id, address
                ))
            })?;

        let current = wallet.derivation_params.last_used(chain);
        if order <= current {
            return Ok(LedgerChange::Unchanged);
        }

        *wallet.derivation_params.last_used_mut(chain) = order;
        log::debug!(
            "Updated wallet {} {} lastUsed {} -> {}",
            wallet.id,
            chain,
            current,
            order
        );

        Ok(LedgerChange::Advanced {
            wallet_id: wallet.id.clone(),
            chain,
            from: current,
            to: order,
        })
    }

    pub fn wallets(&self) -> &[Wallet] {
        &self.wallets
    }

    pub fn into_wallets(self) -> Vec<Wallet> {
        self.wallets
    }
}
