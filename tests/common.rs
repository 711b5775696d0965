//! Common test utilities for transfer enrichment integration tests
//!
//! - `TestEnvironment`: temp-dir backed `FsStore` seeded with one user's wallets and addresses
//! - Builders for wallet, address and transfer documents
//! - `RecordingDispatcher`: job dispatcher that keeps every job it is given
//! - `FixedPrices` and an axum-served mock price service

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use transfer_enrichment::model::{ChainState, WalletDerivation};
use transfer_enrichment::{
    Address, AddressDerivation, Chain, Collection, CurrencyValuation, DispatchError, FsStore, InOutput,
    JobDispatcher, PriceSource, Transaction, TransferDetails, ValuationError, Wallet,
};

pub const USER: &str = "user-1";
pub const SAVINGS: &str = "wallet-savings";
pub const SPENDING: &str = "wallet-spending";

pub fn init_logger() {
    env_logger::builder().is_test(true).try_init().ok();
}

/// A store in a temporary directory, removed on drop
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub store: Arc<FsStore>,
}

impl TestEnvironment {
    pub fn new() -> anyhow::Result<Self> {
        init_logger();
        let temp_dir = TempDir::new()?;
        log::debug!("Test store at {:?}", temp_dir.path());
        let store = Arc::new(FsStore::new_with_base_dir(temp_dir.path().to_path_buf()));
        Ok(Self { temp_dir, store })
    }

    /// Two wallets of `USER` with a handful of addresses:
    ///
    /// | address          | wallet   | chain  | order |
    /// |------------------|----------|--------|-------|
    /// | savings-main-5   | Savings  | main   | 5     |
    /// | savings-change-2 | Savings  | change | 2     |
    /// | savings-imported | Savings  | -      | -1    |
    /// | spending-main-1  | Spending | main   | 1     |
    ///
    /// Savings starts at main 3 / change 4, Spending at main 0 / change 0.
    pub fn seeded() -> anyhow::Result<Self> {
        let env = Self::new()?;
        env.put_wallet(&wallet(SAVINGS, "Savings", 3, 4))?;
        env.put_wallet(&wallet(SPENDING, "Spending", 0, 0))?;
        env.put_address(&address(
            "addr-savings-main-5",
            "savings-main-5",
            SAVINGS,
            Some(AddressDerivation::sequenced(Chain::Main, 5)),
        ))?;
        env.put_address(&address(
            "addr-savings-change-2",
            "savings-change-2",
            SAVINGS,
            Some(AddressDerivation::sequenced(Chain::Change, 2)),
        ))?;
        env.put_address(&address(
            "addr-savings-imported",
            "savings-imported",
            SAVINGS,
            Some(AddressDerivation::non_sequenced()),
        ))?;
        env.put_address(&address(
            "addr-spending-main-1",
            "spending-main-1",
            SPENDING,
            Some(AddressDerivation::sequenced(Chain::Main, 1)),
        ))?;
        Ok(env)
    }

    pub fn put_wallet(&self, wallet: &Wallet) -> anyhow::Result<()> {
        self.store.insert(Collection::Wallets, &wallet.id, wallet)?;
        Ok(())
    }

    pub fn put_address(&self, address: &Address) -> anyhow::Result<()> {
        self.store.insert(Collection::Addresses, &address.id, address)?;
        Ok(())
    }

    pub fn put_transaction(&self, transaction: &Transaction) -> anyhow::Result<()> {
        self.store.insert(Collection::Transfers, &transaction.id, transaction)?;
        Ok(())
    }

    /// Write a raw transfer document, e.g. one carrying ingestion-only fields
    pub fn put_raw_transaction(&self, id: &str, document: &Value) -> anyhow::Result<()> {
        self.store.insert(Collection::Transfers, id, document)?;
        Ok(())
    }

    pub fn wallet(&self, id: &str) -> anyhow::Result<Wallet> {
        self.store
            .load(Collection::Wallets, id)?
            .ok_or_else(|| anyhow::anyhow!("wallet {} not stored", id))
    }

    pub fn transaction(&self, id: &str) -> anyhow::Result<Transaction> {
        self.store
            .load(Collection::Transfers, id)?
            .ok_or_else(|| anyhow::anyhow!("transaction {} not stored", id))
    }

    pub fn raw_transaction(&self, id: &str) -> anyhow::Result<Value> {
        self.store
            .load(Collection::Transfers, id)?
            .ok_or_else(|| anyhow::anyhow!("transaction {} not stored", id))
    }
}

pub fn wallet(id: &str, label: &str, main: i64, change: i64) -> Wallet {
    Wallet {
        id: id.to_string(),
        user_id: USER.to_string(),
        label: label.to_string(),
        derivation_params: WalletDerivation {
            main: ChainState { last_used: main },
            change: ChainState { last_used: change },
        },
    }
}

pub fn address(
    id: &str,
    address: &str,
    wallet_id: &str,
    derivation: Option<AddressDerivation>,
) -> Address {
    Address {
        id: id.to_string(),
        address: address.to_string(),
        user_id: USER.to_string(),
        wallet_id: wallet_id.to_string(),
        derivation_params: derivation,
    }
}

pub fn transfer_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 3, 14, 12, 30, 0).unwrap()
}

fn entries(list: &[(&str, f64)]) -> Vec<InOutput> {
    list.iter()
        .map(|(note, amount)| InOutput::new(*note, *amount))
        .collect()
}

pub fn transaction(id: &str, inputs: &[(&str, f64)], outputs: &[(&str, f64)]) -> Transaction {
    Transaction {
        id: id.to_string(),
        user_id: USER.to_string(),
        date: transfer_date(),
        details: TransferDetails {
            inputs: entries(inputs),
            outputs: entries(outputs),
        },
        representation: None,
        base_volume: None,
        updated_at: None,
        hidden: true,
    }
}

/// Dispatcher that records `(kind, data)` of every job
#[derive(Default)]
pub struct RecordingDispatcher {
    jobs: Mutex<Vec<(String, Value)>>,
}

impl RecordingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Shared handle in the form the pipeline takes
    pub fn handle(self: &Arc<Self>) -> Option<Arc<dyn JobDispatcher>> {
        let dispatcher: Arc<dyn JobDispatcher> = self.clone();
        Some(dispatcher)
    }

    pub fn jobs(&self) -> Vec<(String, Value)> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn jobs_of(&self, kind: &str) -> Vec<Value> {
        self.jobs()
            .into_iter()
            .filter(|(k, _)| k == kind)
            .map(|(_, data)| data)
            .collect()
    }
}

#[async_trait]
impl JobDispatcher for RecordingDispatcher {
    async fn add_job(&self, kind: &str, data: Value) -> Result<(), DispatchError> {
        self.jobs.lock().unwrap().push((kind.to_string(), data));
        Ok(())
    }
}

/// Valuation over fixed prices of the `XBT` asset in EUR then USD
pub fn fixed_valuation(prices: &[(&str, f64)]) -> CurrencyValuation {
    CurrencyValuation::new(
        FixedPrices::new(prices),
        "XBT",
        vec!["EUR".to_string(), "USD".to_string()],
    )
}

/// In-memory price source; currencies without a price fail with `Status 404`
pub struct FixedPrices {
    prices: HashMap<String, f64>,
}

impl FixedPrices {
    pub fn new(prices: &[(&str, f64)]) -> Arc<Self> {
        Arc::new(Self {
            prices: prices.iter().map(|(c, p)| (c.to_string(), *p)).collect(),
        })
    }
}

#[async_trait]
impl PriceSource for FixedPrices {
    async fn unit_price(
        &self,
        _asset: &str,
        currency: &str,
        _date: DateTime<Utc>,
    ) -> Result<f64, ValuationError> {
        self.prices
            .get(currency)
            .copied()
            .ok_or_else(|| ValuationError::Status {
                status: 404,
                currency: currency.to_string(),
            })
    }
}

/// Price source that answers slowly for transfers dated `slow_date` and
/// yields once for every other date
pub struct DelayedPrices {
    prices: Arc<FixedPrices>,
    slow_date: DateTime<Utc>,
    delay: Duration,
}

impl DelayedPrices {
    pub fn new(prices: &[(&str, f64)], slow_date: DateTime<Utc>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            prices: FixedPrices::new(prices),
            slow_date,
            delay,
        })
    }
}

#[async_trait]
impl PriceSource for DelayedPrices {
    async fn unit_price(
        &self,
        asset: &str,
        currency: &str,
        date: DateTime<Utc>,
    ) -> Result<f64, ValuationError> {
        if date == self.slow_date {
            tokio::time::sleep(self.delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.prices.unit_price(asset, currency, date).await
    }
}

/// Response body shape served by the mock price service
#[derive(Debug, Clone, Copy)]
pub enum PriceShape {
    /// `{"prices": [{"currency": "XBT", "price": 300.4}, ...]}`, entries per asset
    List,
    /// `{"prices": {"XBT": {"price": 300.4}}}`
    ByAsset,
}

/// A request seen by the mock price service
#[derive(Debug, Clone)]
pub struct PriceRequest {
    pub currency: String,
    pub date: Option<String>,
}

#[derive(Clone)]
struct PriceServerState {
    prices: Arc<HashMap<String, f64>>,
    shape: PriceShape,
    asset: String,
    requests: Arc<Mutex<Vec<PriceRequest>>>,
}

pub struct MockPriceServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<PriceRequest>>>,
}

impl MockPriceServer {
    /// Serve `GET /prices/v1/:currency` on an ephemeral local port.
    /// Currencies without a price answer 503.
    pub async fn start(prices: &[(&str, f64)], shape: PriceShape) -> anyhow::Result<Self> {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = PriceServerState {
            prices: Arc::new(prices.iter().map(|(c, p)| (c.to_string(), *p)).collect()),
            shape,
            asset: "XBT".to_string(),
            requests: requests.clone(),
        };

        let app = Router::new()
            .route("/prices/v1/:currency", get(price_handler))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("Mock price server stopped: {}", e);
            }
        });

        Ok(Self {
            base_url: format!("http://{}", addr),
            requests,
        })
    }

    pub fn requests(&self) -> Vec<PriceRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn price_handler(
    State(state): State<PriceServerState>,
    Path(currency): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    state.requests.lock().unwrap().push(PriceRequest {
        currency: currency.clone(),
        date: query.get("date").cloned(),
    });

    let price = state
        .prices
        .get(&currency)
        .copied()
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)?;

    let body = match state.shape {
        PriceShape::List => json!({
            "prices": [
                { "currency": "ETH", "price": price / 20.0 },
                { "currency": state.asset, "price": price },
            ]
        }),
        PriceShape::ByAsset => {
            let mut prices = serde_json::Map::new();
            prices.insert(state.asset.clone(), json!({ "price": price }));
            json!({ "prices": prices })
        }
    };
    Ok(Json(body))
}
