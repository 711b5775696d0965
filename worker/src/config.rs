/// Worker configuration from environment variables
///
/// Controls where documents are stored, where jobs are received and which
/// outside services (price API, job system) the pipeline talks to.

use std::env;
use std::path::PathBuf;

use transfer_enrichment::valuation::DEFAULT_ASSET_CODE;

pub const DEFAULT_CURRENCIES: [&str; 2] = ["EUR", "USD"];

#[derive(Clone, Debug, PartialEq)]
pub struct WorkerConfig {
    /// Root directory of the file-system store
    pub data_dir: PathBuf,
    /// Job intake listen address
    pub bind_address: String,
    /// Base URL of the price service; valuation is off when unset
    pub price_api_url: Option<String>,
    /// Asset code looked up in price responses
    pub price_asset_code: String,
    /// Reporting currencies, in the order they appear in `baseVolume`
    pub reporting_currencies: Vec<String>,
    /// Base URL of the downstream job system; follow-up jobs are off when unset
    pub jobs_api_url: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_address: "0.0.0.0:3000".to_string(),
            price_api_url: None,
            price_asset_code: DEFAULT_ASSET_CODE.to_string(),
            reporting_currencies: DEFAULT_CURRENCIES.iter().map(|c| c.to_string()).collect(),
            jobs_api_url: None,
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `DATA_DIR`: store root (default `./data`)
    /// - `BIND_ADDRESS`: intake address (default `0.0.0.0:3000`)
    /// - `PRICE_API_URL`: price service base URL (optional)
    /// - `PRICE_ASSET_CODE`: asset code in price responses (default `XBT`)
    /// - `REPORTING_CURRENCIES`: comma separated (default `EUR,USD`)
    /// - `JOBS_API_URL`: job system base URL (optional)
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let price_api_url = var("PRICE_API_URL");
        match &price_api_url {
            Some(url) => log::info!("Valuing transfers with prices from {}", url),
            None => log::warn!("PRICE_API_URL not set, transfers will not be valued"),
        }

        let jobs_api_url = var("JOBS_API_URL");
        if jobs_api_url.is_none() {
            log::warn!("JOBS_API_URL not set, follow-up jobs will not be dispatched");
        }

        let reporting_currencies = match var("REPORTING_CURRENCIES") {
            Some(raw) => {
                let currencies = parse_currencies(&raw);
                if currencies.is_empty() {
                    log::warn!("REPORTING_CURRENCIES '{}' has no currencies, using defaults", raw);
                    defaults.reporting_currencies
                } else {
                    currencies
                }
            }
            None => defaults.reporting_currencies,
        };

        Self {
            data_dir: var("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            bind_address: var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            price_api_url,
            price_asset_code: var("PRICE_ASSET_CODE").unwrap_or(defaults.price_asset_code),
            reporting_currencies,
            jobs_api_url,
        }
    }
}

/// Split a comma separated currency list, keeping order and dropping
/// blanks and repeats
pub fn parse_currencies(raw: &str) -> Vec<String> {
    let mut currencies: Vec<String> = Vec::new();
    for code in raw.split(',').map(|c| c.trim().to_uppercase()) {
        if !code.is_empty() && !currencies.contains(&code) {
            currencies.push(code);
        }
    }
    currencies
}
