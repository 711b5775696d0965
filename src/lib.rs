//! Transfer Enrichment: wallet-aware interpretation of transfer records
//!
//! Enriches raw cryptocurrency transfers with the ownership context of a
//! user's wallets and stores a stable, human-readable representation of
//! each transfer.
//!
//! # Architecture
//!
//! - **Address Resolver**: maps raw address strings to the user's address records and wallets
//! - **Wallet Ledger**: advances each wallet's derivation `lastUsed` bookkeeping
//! - **Transaction Classifier**: attaches wallets to inputs/outputs and derives fee, amount, labels and type
//! - **Currency Valuation**: fiat value of the transfer amount at the transfer date
//! - **Persistence Coordinator**: writes transactions and wallets, requests follow-up jobs
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use transfer_enrichment::{ConnectTransactionsJob, FsStore, TransactionService};
//!
//! let store = Arc::new(FsStore::new());
//! let service = TransactionService::new(store, None, None);
//!
//! let outcome = service
//!     .handle_connect_transactions(ConnectTransactionsJob {
//!         addresses: Some(vec!["1BoatSLRHtKNngkdXEeobR76b53LETtpyT".into()]),
//!         user_id: Some("user-1".into()),
//!         wallet_id: Some("wallet-1".into()),
//!     })
//!     .await?;
//! ```

// Public modules
pub mod classifier;
pub mod error;
pub mod jobs;
pub mod ledger;
pub mod model;
pub mod persistence;
pub mod pipeline;
pub mod resolver;
pub mod service;
pub mod store;
pub mod valuation;

// Re-exports for convenience
pub use classifier::{classify, TransactionClassifier};
pub use error::{DispatchError, ProcessorError, StoreError, ValuationError};
pub use jobs::{
    ConnectTransactionsJob, HttpJobDispatcher, JobDispatcher, ValidJob, ADDRESSES_UPDATE,
    CONNECT_TRANSACTIONS, WALLET_UPDATE,
};
pub use ledger::{LedgerChange, WalletLedger};
pub use model::{
    Address, AddressDerivation, BaseVolume, Chain, InOutput, Representation, Transaction,
    TransferDetails, TransferType, Wallet, WalletRef,
};
pub use persistence::{CommitSummary, PersistenceCoordinator};
pub use pipeline::{BatchContext, TransactionProcessor};
pub use resolver::{affected_addresses, AddressResolver};
pub use service::{JobOutcome, TransactionService};
pub use store::{Collection, FsStore, Store};
pub use valuation::{CurrencyValuation, HttpPriceClient, PriceSource};

// Common result type
pub type Result<T> = std::result::Result<T, ProcessorError>;
