//! Fiat valuation of transfer amounts
//!
//! - `PriceSource` trait: unit price of an asset in a currency at a date
//! - `HttpPriceClient`: `GET {base}/prices/v1/{currency}?date={iso}`
//! - `CurrencyValuation`: converts an amount into every reporting currency

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ValuationError;
use crate::model::BaseVolume;

/// Asset code the price service uses for bitcoin
pub const DEFAULT_ASSET_CODE: &str = "XBT";

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Price of one unit of `asset` in `currency` as of `date`
    async fn unit_price(
        &self,
        asset: &str,
        currency: &str,
        date: DateTime<Utc>,
    ) -> Result<f64, ValuationError>;
}

/// Body of a `/prices/v1/{currency}` response.
///
/// The list shape (`[{ currency: <asset>, price }]`) is the canonical one. The map
/// shape (`{ <asset>: { price } }`) is accepted too, since both have been
/// served by the same endpoint.
#[derive(Debug, Deserialize)]
pub struct PriceResponse {
    pub prices: Prices,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Prices {
    List(Vec<CurrencyPrice>),
    ByAsset(HashMap<String, AssetPrice>),
}

#[derive(Debug, Deserialize)]
pub struct CurrencyPrice {
    pub currency: String,
    pub price: f64,
}

#[derive(Debug, Deserialize)]
pub struct AssetPrice {
    pub price: f64,
}

impl Prices {
    pub fn price_of(&self, asset: &str) -> Option<f64> {
        match self {
            Prices::List(prices) => prices
                .iter()
                .find(|p| p.currency == asset)
                .map(|p| p.price),
            Prices::ByAsset(prices) => {
                log::debug!("Price response uses the asset-keyed shape");
                prices.get(asset).map(|p| p.price)
            }
        }
    }
}

pub struct HttpPriceClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPriceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PriceSource for HttpPriceClient {
    async fn unit_price(
        &self,
        asset: &str,
        currency: &str,
        date: DateTime<Utc>,
    ) -> Result<f64, ValuationError> {
        let url = format!("{}/prices/v1/{}", self.base_url, currency);
        let date = date.to_rfc3339_opts(SecondsFormat::Millis, true);

        let response = self
            .client
            .get(&url)
            .query(&[("date", date.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ValuationError::Status {
                status: response.status().as_u16(),
                currency: currency.to_string(),
            });
        }

        let text = response.text().await?;
        let body: PriceResponse = serde_json::from_str(&text).map_err(|source| {
            ValuationError::Decode {
                currency: currency.to_string(),
                source,
            }
        })?;
        body.prices
            .price_of(asset)
            .ok_or_else(|| ValuationError::MissingPrice {
                asset: asset.to_string(),
                currency: currency.to_string(),
            })
    }
}

/// Converts native amounts into the configured reporting currencies
#[derive(Clone)]
pub struct CurrencyValuation {
    source: Arc<dyn PriceSource>,
    asset: String,
    currencies: Vec<String>,
}

impl CurrencyValuation {
    pub fn new(source: Arc<dyn PriceSource>, asset: impl Into<String>, currencies: Vec<String>) -> Self {
        Self {
            source,
            asset: asset.into(),
            currencies,
        }
    }

    /// Value `amount` in every reporting currency at `date`.
    ///
    /// Currencies are looked up one after another, in configured order.
    /// The first failure aborts; no partial volume is returned.
    pub async fn base_volume(
        &self,
        amount: f64,
        date: DateTime<Utc>,
    ) -> Result<BaseVolume, ValuationError> {
        let mut volume = BaseVolume::new();
        for currency in &self.currencies {
            let price = self.source.unit_price(&self.asset, currency, date).await?;
            volume.insert(currency.clone(), (amount * price).round() as i64);
        }
        Ok(volume)
    }
}
