use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use super::{Collection, Store};
use crate::error::StoreError;
use crate::model::{Address, AddressId, Chain, Transaction, TransactionUpdate, Wallet, WalletId};

/// Store backed by a directory tree: `<base>/<collection>/<id>.json`
#[derive(Clone)]
pub struct FsStore {
    base_path: PathBuf,
}

impl FsStore {
    /// Create a new store with the default base directory ("./data")
    pub fn new() -> Self {
        Self {
            base_path: PathBuf::from("./data"),
        }
    }

    /// Create a store with a custom base directory (for testing)
    pub fn new_with_base_dir(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Get the base directory path of the store
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_path
    }

    fn collection_dir(&self, collection: Collection) -> PathBuf {
        self.base_path.join(collection.name())
    }

    fn document_path(&self, collection: Collection, id: &str) -> Result<PathBuf, StoreError> {
        if id.is_empty() || id.contains(|c: char| c == '/' || c == '\\') || id.starts_with('.') {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.collection_dir(collection).join(format!("{}.json", id)))
    }

    /// Write a whole document, replacing any previous version
    pub fn insert<T: Serialize>(
        &self,
        collection: Collection,
        id: &str,
        document: &T,
    ) -> Result<(), StoreError> {
        let path = self.document_path(collection, id)?;
        fs::create_dir_all(self.collection_dir(collection))?;
        let json = serde_json::to_string_pretty(document)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load one typed document, or `None` if it does not exist
    pub fn load<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<T>, StoreError> {
        let path = self.document_path(collection, id)?;
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        let document = serde_json::from_str(&contents).map_err(|source| StoreError::Malformed {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(document))
    }

    /// Load every document of a collection, ordered by id
    fn load_all<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>, StoreError> {
        let dir = self.collection_dir(collection);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let contents = fs::read_to_string(&path)?;
            let document =
                serde_json::from_str(&contents).map_err(|source| StoreError::Malformed {
                    path: path.display().to_string(),
                    source,
                })?;
            documents.push(document);
        }
        Ok(documents)
    }

    /// Set fields of a stored document in place, leaving all other fields untouched
    fn update_fields(
        &self,
        collection: Collection,
        id: &str,
        fields: &[(&[&str], Value)],
    ) -> Result<(), StoreError> {
        let path = self.document_path(collection, id)?;
        if !path.exists() {
            return Err(StoreError::DocumentNotFound {
                collection: collection.name().to_string(),
                id: id.to_string(),
            });
        }

        let contents = fs::read_to_string(&path)?;
        let mut document: Value =
            serde_json::from_str(&contents).map_err(|source| StoreError::Malformed {
                path: path.display().to_string(),
                source,
            })?;

        for (field_path, value) in fields {
            set_field(&mut document, field_path, value.clone()).ok_or_else(|| {
                StoreError::FieldConflict {
                    document: format!("{}/{}", collection.name(), id),
                    field: field_path.join("."),
                }
            })?;
        }

        fs::write(path, serde_json::to_string_pretty(&document)?)?;
        Ok(())
    }

    fn apply_transaction_update(&self, update: &TransactionUpdate) -> Result<(), StoreError> {
        let fields: [(&[&str], Value); 6] = [
            (&["details", "inputs"][..], serde_json::to_value(&update.inputs)?),
            (&["details", "outputs"][..], serde_json::to_value(&update.outputs)?),
            (&["updatedAt"][..], serde_json::to_value(update.updated_at)?),
            (&["representation"][..], serde_json::to_value(&update.representation)?),
            (&["baseVolume"][..], serde_json::to_value(&update.base_volume)?),
            (&["hidden"][..], Value::Bool(update.hidden)),
        ];
        self.update_fields(Collection::Transfers, &update.id, &fields)
    }
}

impl Default for FsStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk `path` from the document root, creating missing objects, and set the leaf.
/// Returns `None` if an intermediate value exists but is not an object.
fn set_field(document: &mut Value, path: &[&str], value: Value) -> Option<()> {
    let (leaf, parents) = path.split_last()?;
    let mut current = document;
    for key in parents {
        current = current
            .as_object_mut()?
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    current.as_object_mut()?.insert(leaf.to_string(), value);
    Some(())
}

#[async_trait]
impl Store for FsStore {
    async fn find_transactions_touching(
        &self,
        user_id: &str,
        addresses: &[String],
    ) -> Result<Vec<Transaction>, StoreError> {
        let transactions: Vec<Transaction> = self.load_all(Collection::Transfers)?;
        Ok(transactions
            .into_iter()
            .filter(|tx| tx.user_id == user_id && tx.touches(addresses))
            .collect())
    }

    async fn find_addresses(
        &self,
        user_id: &str,
        addresses: &[String],
    ) -> Result<Vec<Address>, StoreError> {
        let records: Vec<Address> = self.load_all(Collection::Addresses)?;
        Ok(records
            .into_iter()
            .filter(|a| a.user_id == user_id && addresses.contains(&a.address))
            .collect())
    }

    async fn find_address_ids(
        &self,
        user_id: &str,
        addresses: &[String],
    ) -> Result<HashMap<String, AddressId>, StoreError> {
        let records = self.find_addresses(user_id, addresses).await?;
        Ok(records.into_iter().map(|a| (a.address, a.id)).collect())
    }

    async fn find_wallets(
        &self,
        user_id: &str,
        wallet_ids: &[WalletId],
    ) -> Result<Vec<Wallet>, StoreError> {
        let wallets: Vec<Wallet> = self.load_all(Collection::Wallets)?;
        Ok(wallets
            .into_iter()
            .filter(|w| w.user_id == user_id && wallet_ids.contains(&w.id))
            .collect())
    }

    async fn find_address_by_id(&self, id: &str) -> Result<Option<Address>, StoreError> {
        self.load(Collection::Addresses, id)
    }

    async fn find_wallet_by_id(&self, id: &str) -> Result<Option<Wallet>, StoreError> {
        self.load(Collection::Wallets, id)
    }

    async fn bulk_update_transactions(
        &self,
        updates: Vec<TransactionUpdate>,
    ) -> Result<usize, StoreError> {
        let mut applied = 0;
        let mut failed = Vec::new();

        for update in &updates {
            match self.apply_transaction_update(update) {
                Ok(()) => applied += 1,
                Err(e) => {
                    log::error!("Transaction update failed for {}: {}", update.id, e);
                    failed.push(update.id.clone());
                }
            }
        }

        if failed.is_empty() {
            Ok(applied)
        } else {
            Err(StoreError::BulkWrite { failed, applied })
        }
    }

    async fn set_wallet_last_used(
        &self,
        wallet_id: &str,
        chain: Chain,
        last_used: i64,
    ) -> Result<(), StoreError> {
        let field: &[&str] = &["derivationParams", chain.as_str(), "lastUsed"];
        self.update_fields(Collection::Wallets, wallet_id, &[(field, Value::from(last_used))])
    }
}
