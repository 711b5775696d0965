//! Transfer Worker
//!
//! Wires the enrichment pipeline to its environment: configuration, the
//! file-system store, the price service, the downstream job system and the
//! HTTP intake through which `addresses.connectTransactions` jobs arrive.

pub mod api;
pub mod config;

use std::sync::Arc;

use transfer_enrichment::{
    CurrencyValuation, FsStore, HttpJobDispatcher, HttpPriceClient, JobDispatcher,
    TransactionService,
};

pub use api::server::{create_router, start_server};
pub use config::WorkerConfig;

/// Build the job service described by `config`
pub fn build_service(config: &WorkerConfig) -> TransactionService {
    let store = Arc::new(FsStore::new_with_base_dir(config.data_dir.clone()));
    log::info!("Using data directory {}", store.base_dir().display());

    let valuation = config.price_api_url.as_ref().map(|url| {
        CurrencyValuation::new(
            Arc::new(HttpPriceClient::new(url.as_str())),
            config.price_asset_code.clone(),
            config.reporting_currencies.clone(),
        )
    });

    let dispatcher = config
        .jobs_api_url
        .as_ref()
        .map(|url| Arc::new(HttpJobDispatcher::new(url.as_str())) as Arc<dyn JobDispatcher>);

    TransactionService::new(store, valuation, dispatcher)
}
