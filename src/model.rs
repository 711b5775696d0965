//! Typed records for the three store collections
//!
//! Field names follow the stored documents (`_id`, `userId`,
//! `derivationParams`, ...) so records read from and written to the store
//! without translation.

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub type AddressId = String;
pub type WalletId = String;
pub type TransactionId = String;

/// Derivation order of addresses that are not part of a derivation sequence
/// (e.g. manually imported addresses).
pub const NON_SEQUENCED_ORDER: i64 = -1;

/// Label used for counter-parties outside the user's wallets
pub const EXTERNAL_LABEL: &str = "External";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Main,
    Change,
}

impl Chain {
    pub const ALL: [Chain; 2] = [Chain::Main, Chain::Change];

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Main => "main",
            Chain::Change => "change",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of an address within its wallet's derivation.
///
/// Both fields are optional at the boundary; whether their absence is an
/// error is decided by the ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressDerivation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<Chain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

impl AddressDerivation {
    pub fn sequenced(chain: Chain, order: i64) -> Self {
        Self {
            chain: Some(chain),
            order: Some(order),
        }
    }

    pub fn non_sequenced() -> Self {
        Self {
            chain: None,
            order: Some(NON_SEQUENCED_ORDER),
        }
    }

    pub fn is_sequenced(&self) -> bool {
        self.order != Some(NON_SEQUENCED_ORDER)
    }
}

/// `bitcoinaddresses` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(rename = "_id")]
    pub id: AddressId,
    pub address: String,
    pub user_id: String,
    pub wallet_id: WalletId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation_params: Option<AddressDerivation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainState {
    pub last_used: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletDerivation {
    #[serde(default)]
    pub main: ChainState,
    #[serde(default)]
    pub change: ChainState,
}

impl WalletDerivation {
    pub fn last_used(&self, chain: Chain) -> i64 {
        match chain {
            Chain::Main => self.main.last_used,
            Chain::Change => self.change.last_used,
        }
    }

    pub fn last_used_mut(&mut self, chain: Chain) -> &mut i64 {
        match chain {
            Chain::Main => &mut self.main.last_used,
            Chain::Change => &mut self.change.last_used,
        }
    }
}

/// `bitcoinwallets` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    #[serde(rename = "_id")]
    pub id: WalletId,
    pub user_id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub derivation_params: WalletDerivation,
}

impl Wallet {
    pub fn to_ref(&self) -> WalletRef {
        WalletRef {
            id: self.id.clone(),
            label: self.label.clone(),
        }
    }
}

/// Wallet identity attached to an input or output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletRef {
    pub id: WalletId,
    pub label: String,
}

/// One input or output of a transfer.
///
/// `node_id` and `wallet` are only set when `note` is one of the user's
/// known addresses. Fields written by ingestion that this crate does not
/// model are kept in `extra` and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InOutput {
    pub note: String,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<AddressId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet: Option<WalletRef>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl InOutput {
    pub fn new(note: impl Into<String>, amount: f64) -> Self {
        Self {
            note: note.into(),
            amount,
            ..Default::default()
        }
    }

    pub fn wallet_id(&self) -> Option<&str> {
        self.wallet.as_ref().map(|w| w.id.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferDetails {
    #[serde(default)]
    pub inputs: Vec<InOutput>,
    #[serde(default)]
    pub outputs: Vec<InOutput>,
}

impl TransferDetails {
    /// All inputs followed by all outputs
    pub fn entries(&self) -> impl Iterator<Item = &InOutput> {
        self.inputs.iter().chain(self.outputs.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferType {
    Internal,
    Outgoing,
    Incoming,
    Orphaned,
}

/// Human-facing interpretation of a transfer, recomputed on every run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Representation {
    pub fee: f64,
    pub sender_labels: Vec<String>,
    pub recipient_labels: Vec<String>,
    #[serde(rename = "type")]
    pub transfer_type: TransferType,
    pub amount: f64,
}

/// `transfers` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(rename = "_id")]
    pub id: TransactionId,
    pub user_id: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub details: TransferDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub representation: Option<Representation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_volume: Option<BaseVolume>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub hidden: bool,
}

impl Transaction {
    /// Whether any input or output references one of `addresses`
    pub fn touches(&self, addresses: &[String]) -> bool {
        self.details
            .entries()
            .any(|entry| addresses.iter().any(|a| a == &entry.note))
    }
}

/// Fiat valuation of a transfer: currency code to rounded amount.
///
/// Keeps the order in which currencies were requested, both in memory and
/// when serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseVolume(Vec<(String, i64)>);

impl BaseVolume {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value for `currency`, keeping its original position if present
    pub fn insert(&mut self, currency: impl Into<String>, value: i64) {
        let currency = currency.into();
        match self.0.iter_mut().find(|(code, _)| *code == currency) {
            Some(slot) => slot.1 = value,
            None => self.0.push((currency, value)),
        }
    }

    pub fn get(&self, currency: &str) -> Option<i64> {
        self.0
            .iter()
            .find(|(code, _)| code == currency)
            .map(|(_, value)| *value)
    }

    pub fn currencies(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(code, _)| code.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(code, value)| (code.as_str(), *value))
    }
}

impl Serialize for BaseVolume {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (code, value) in &self.0 {
            map.serialize_entry(code, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for BaseVolume {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BaseVolumeVisitor;

        impl<'de> Visitor<'de> for BaseVolumeVisitor {
            type Value = BaseVolume;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of currency code to amount")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<BaseVolume, A::Error> {
                let mut volume = BaseVolume::new();
                while let Some((code, value)) = access.next_entry::<String, i64>()? {
                    volume.insert(code, value);
                }
                Ok(volume)
            }
        }

        deserializer.deserialize_map(BaseVolumeVisitor)
    }
}

/// Field updates written back to a `transfers` document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionUpdate {
    #[serde(skip)]
    pub id: TransactionId,
    pub inputs: Vec<InOutput>,
    pub outputs: Vec<InOutput>,
    pub updated_at: Option<DateTime<Utc>>,
    pub representation: Option<Representation>,
    pub base_volume: Option<BaseVolume>,
    pub hidden: bool,
}

impl From<&Transaction> for TransactionUpdate {
    fn from(transaction: &Transaction) -> Self {
        Self {
            id: transaction.id.clone(),
            inputs: transaction.details.inputs.clone(),
            outputs: transaction.details.outputs.clone(),
            updated_at: transaction.updated_at,
            representation: transaction.representation.clone(),
            base_volume: transaction.base_volume.clone(),
            hidden: false,
        }
    }
}
