//! Transaction enrichment pipeline
//!
//! A batch moves through the stages as an explicit value:
//!
//! 1. resolve: affected addresses -> address records and owning wallets
//! 2. connect: set `nodeId` on known entries, advance wallet bookkeeping
//! 3. classify: attach wallets, compute representation and base volume
//! 4. commit: store transactions and wallets, notify wallet updates
//!
//! Each stage consumes the previous stage's output; the first error ends
//! the batch before anything is written.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::classifier::{classify, TransactionClassifier};
use crate::Result;
use crate::jobs::JobDispatcher;
use crate::ledger::WalletLedger;
use crate::model::{AddressId, Transaction, Wallet};
use crate::persistence::{CommitSummary, PersistenceCoordinator};
use crate::resolver::{affected_addresses, AddressResolver};
use crate::store::Store;
use crate::valuation::CurrencyValuation;

/// Input of one batch: a user's transactions and the moment processing began
#[derive(Debug, Clone)]
pub struct BatchContext {
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub affected_addresses: Vec<String>,
    pub transactions: Vec<Transaction>,
}

impl BatchContext {
    pub fn new(user_id: impl Into<String>, transactions: Vec<Transaction>) -> Self {
        Self {
            user_id: user_id.into(),
            started_at: Utc::now(),
            affected_addresses: affected_addresses(&transactions),
            transactions,
        }
    }
}

/// Batch after address resolution
#[derive(Debug)]
pub struct ResolvedBatch {
    pub context: BatchContext,
    pub ledger: WalletLedger,
    pub address_ids: HashMap<String, AddressId>,
}

/// Batch after node ids are set and wallet bookkeeping is advanced
#[derive(Debug)]
pub struct ConnectedBatch {
    pub context: BatchContext,
    pub ledger: WalletLedger,
}

/// Batch ready to be written
#[derive(Debug, Clone)]
pub struct EnrichedBatch {
    pub transactions: Vec<Transaction>,
    pub wallets: Vec<Wallet>,
}

#[derive(Clone)]
pub struct TransactionProcessor {
    resolver: AddressResolver,
    classifier: TransactionClassifier,
    valuation: Option<CurrencyValuation>,
    persistence: PersistenceCoordinator,
}

impl TransactionProcessor {
    /// Without a valuation the processor runs in unvalued mode and leaves
    /// `baseVolume` unset. Without a dispatcher no `wallet.update` jobs are sent.
    pub fn new(
        store: Arc<dyn Store>,
        valuation: Option<CurrencyValuation>,
        dispatcher: Option<Arc<dyn JobDispatcher>>,
    ) -> Self {
        let resolver = AddressResolver::new(store.clone());
        Self {
            classifier: TransactionClassifier::new(resolver.clone()),
            resolver,
            valuation,
            persistence: PersistenceCoordinator::new(store, dispatcher),
        }
    }

    /// Run every stage over one user's batch of transactions
    pub async fn process(
        &self,
        user_id: &str,
        transactions: Vec<Transaction>,
    ) -> Result<CommitSummary> {
        let context = BatchContext::new(user_id, transactions);
        log::info!(
            "Processing {} transaction(s) touching {} address(es)",
            context.transactions.len(),
            context.affected_addresses.len()
        );

        let result = async {
            let resolved = self.resolve(context).await?;
            let connected = connect_nodes(resolved)?;
            let enriched = self.enrich(connected).await?;
            self.persistence
                .commit(&enriched.transactions, &enriched.wallets)
                .await
        }
        .await;

        if let Err(e) = &result {
            log::error!("Batch for user {} failed: {}", user_id, e);
        }
        result
    }

    pub async fn resolve(&self, context: BatchContext) -> Result<ResolvedBatch> {
        let resolved = self
            .resolver
            .resolve(&context.user_id, &context.affected_addresses)
            .await?;
        let address_ids = self
            .resolver
            .address_ids(&context.user_id, &context.affected_addresses)
            .await?;

        Ok(ResolvedBatch {
            context,
            ledger: WalletLedger::new(resolved.addresses, resolved.wallets),
            address_ids,
        })
    }

    /// Annotate, classify and value each transaction, one after another
    pub async fn enrich(&self, batch: ConnectedBatch) -> Result<EnrichedBatch> {
        let ConnectedBatch { context, ledger } = batch;
        let mut transactions = context.transactions;

        for transaction in &mut transactions {
            self.classifier.annotate(&mut transaction.details).await?;

            let representation = classify(&transaction.details);
            transaction.base_volume = match &self.valuation {
                Some(valuation) => Some(
                    valuation
                        .base_volume(representation.amount, transaction.date)
                        .await?,
                ),
                None => None,
            };
            transaction.representation = Some(representation);
            transaction.updated_at = Some(context.started_at);
        }

        Ok(EnrichedBatch {
            transactions,
            wallets: ledger.into_wallets(),
        })
    }
}

/// Set `nodeId` on every entry whose address belongs to the user and record
/// the address use in the ledger. Entries of unknown addresses lose any
/// previous `nodeId`.
pub fn connect_nodes(batch: ResolvedBatch) -> Result<ConnectedBatch> {
    log::debug!("Connecting nodes.");
    let ResolvedBatch {
        mut context,
        mut ledger,
        address_ids,
    } = batch;

    for transaction in &mut context.transactions {
        let details = &mut transaction.details;
        for entry in details.inputs.iter_mut().chain(details.outputs.iter_mut()) {
            entry.node_id = address_ids.get(&entry.note).cloned();
            if entry.node_id.is_some() {
                ledger.record_use(&entry.note)?;
            }
        }
    }

    Ok(ConnectedBatch { context, ledger })
}
