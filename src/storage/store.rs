// CoinStore - Persistent key-value storage using sled
//
// Provides typed access for storing:
// - Coin (holder) registrations
// - Skills, skill snapshots and snapshot sets
// - Aggregate and versioned balances
// - Pay records, activity entries and unread flags

use crate::identity::HolderId;
use crate::ledger::{ActivityEntry, CorrelationId, PayRecord, UnreadFlag};
use crate::storage::keys;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::path::Path;
use thiserror::Error;

/// Errors from storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open database: {0}")]
    OpenFailed(String),

    #[error("Database operation failed: {0}")]
    DatabaseError(String),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Flush failed: {0}")]
    FlushFailed(String),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::DatabaseError(err.to_string())
    }
}

impl From<TransactionError<StoreError>> for StoreError {
    fn from(err: TransactionError<StoreError>) -> Self {
        match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => e.into(),
        }
    }
}

/// Statistics about the storage
#[derive(Clone, Debug)]
pub struct StorageStats {
    /// Number of keys in the database
    pub key_count: usize,
    /// Approximate disk size in bytes
    pub disk_size_bytes: u64,
}

/// Registration row for a holder and the coin it issues
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinRecord {
    name: HolderId,
    /// Total backed amount issued so far; marker issuances are not counted.
    /// Maintained by the stats worker.
    issued: u64,
    registered_at_ms: i64,
}

impl CoinRecord {
    fn new(name: HolderId) -> Self {
        Self {
            name,
            issued: 0,
            registered_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn name(&self) -> &HolderId {
        &self.name
    }

    pub fn issued(&self) -> u64 {
        self.issued
    }

    pub fn registered_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.registered_at_ms)
    }
}

/// Encode a row for storage
pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    postcard::to_allocvec(value).map_err(|e| StoreError::SerializationFailed(e.to_string()))
}

/// Decode a stored row
pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    postcard::from_bytes(bytes).map_err(|e| StoreError::DeserializationFailed(e.to_string()))
}

/// Persistent store for all ledger data
///
/// Uses sled for crash-safe, embedded storage. Cloning is cheap and every
/// clone shares the same database.
#[derive(Clone)]
pub struct CoinStore {
    db: sled::Db,
}

impl CoinStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Ok(Self { db })
    }

    /// Open a throwaway store that is removed when dropped
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Ok(Self { db })
    }

    pub(crate) fn db(&self) -> &sled::Db {
        &self.db
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::FlushFailed(e.to_string()))?;
        Ok(())
    }

    /// Get storage statistics
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            key_count: self.db.len(),
            disk_size_bytes: self.db.size_on_disk().unwrap_or(0),
        }
    }

    /// Next value of the store-wide monotonic id sequence
    pub fn generate_id(&self) -> Result<u64, StoreError> {
        Ok(self.db.generate_id()?)
    }

    // ========================================================================
    // TYPED ROW OPERATIONS
    // ========================================================================

    pub(crate) fn get_row<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, StoreError> {
        match self.db.get(key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn put_row<T: Serialize>(&self, key: &[u8], value: &T) -> Result<(), StoreError> {
        self.db.insert(key, encode(value)?)?;
        Ok(())
    }

    /// Insert a row only if the key is vacant.
    ///
    /// Returns `None` when the row was inserted, or the row that already
    /// occupies the key.
    pub(crate) fn insert_row_if_absent<T: Serialize + DeserializeOwned>(
        &self,
        key: &[u8],
        value: &T,
    ) -> Result<Option<T>, StoreError> {
        let proposed = encode(value)?;
        match self.db.compare_and_swap(key, None as Option<&[u8]>, Some(proposed))? {
            Ok(()) => Ok(None),
            Err(conflict) => match conflict.current {
                Some(current) => Ok(Some(decode(&current)?)),
                // Removed between the failed swap and now; rows here are never deleted
                None => Err(StoreError::DatabaseError(
                    "row vanished during insert reconciliation".to_string(),
                )),
            },
        }
    }

    pub(crate) fn scan_rows<T: DeserializeOwned>(&self, prefix: &[u8]) -> Result<Vec<T>, StoreError> {
        let mut rows = Vec::new();
        for result in self.db.scan_prefix(prefix) {
            let (_, value) = result?;
            rows.push(decode(&value)?);
        }
        Ok(rows)
    }

    // ========================================================================
    // HOLDER REGISTRY
    // ========================================================================

    /// Register a holder (and its coin). Returns false if already registered.
    pub fn register_holder(&self, holder: &HolderId) -> Result<bool, StoreError> {
        let existing = self.insert_row_if_absent(&keys::coin(holder), &CoinRecord::new(holder.clone()))?;
        Ok(existing.is_none())
    }

    /// Check whether a holder (equivalently, a coin) exists
    pub fn holder_exists(&self, holder: &HolderId) -> Result<bool, StoreError> {
        Ok(self.db.contains_key(keys::coin(holder))?)
    }

    /// Load a coin registration
    pub fn coin_record(&self, coin: &HolderId) -> Result<Option<CoinRecord>, StoreError> {
        self.get_row(&keys::coin(coin))
    }

    /// Add to a coin's issued total, returning the new total
    pub fn add_issued(&self, coin: &HolderId, amount: u64) -> Result<u64, StoreError> {
        let key = keys::coin(coin);
        let total = self.db.transaction(|tx| -> Result<u64, ConflictableTransactionError<StoreError>> {
            let mut record: CoinRecord = match tx.get(&key)? {
                Some(bytes) => decode(&bytes).map_err(ConflictableTransactionError::Abort)?,
                None => {
                    return Err(ConflictableTransactionError::Abort(StoreError::DatabaseError(
                        format!("coin {} is not registered", coin),
                    )))
                }
            };
            record.issued = record.issued.saturating_add(amount);
            let bytes = encode(&record).map_err(ConflictableTransactionError::Abort)?;
            tx.insert(key.as_slice(), bytes)?;
            Ok(record.issued)
        })?;
        Ok(total)
    }

    // ========================================================================
    // PAY RECORDS
    // ========================================================================

    /// All pay records in insertion order
    pub fn records(&self) -> Result<Vec<PayRecord>, StoreError> {
        self.scan_rows(keys::RECORD)
    }

    /// Number of pay records
    pub fn record_count(&self) -> usize {
        self.db.scan_prefix(keys::RECORD).count()
    }

    /// Records sharing one correlation id (one logical transfer)
    pub fn records_by_correlation(&self, correlation: &CorrelationId) -> Result<Vec<PayRecord>, StoreError> {
        let mut records = Vec::new();
        for result in self.db.scan_prefix(keys::record_correlation_prefix(correlation.as_bytes())) {
            let (key, _) = result?;
            let Some(record_id) = keys::trailing_id(&key) else {
                continue;
            };
            if let Some(record) = self.get_row(&keys::record(record_id))? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Records where the holder is payer or receiver, newest first
    pub fn records_for(&self, holder: &HolderId) -> Result<Vec<PayRecord>, StoreError> {
        let mut records: Vec<PayRecord> = self
            .records()?
            .into_iter()
            .filter(|r| r.payer() == holder || r.receiver() == holder)
            .collect();
        records.reverse();
        Ok(records)
    }

    // ========================================================================
    // ACTIVITY FEED
    // ========================================================================

    /// Activity entries for a holder, newest first
    pub fn activity(&self, owner: &HolderId) -> Result<Vec<ActivityEntry>, StoreError> {
        let mut entries: Vec<ActivityEntry> = self.scan_rows(&keys::activity_prefix(owner))?;
        entries.reverse();
        Ok(entries)
    }

    /// Whether the holder has unread activity
    pub fn has_unread(&self, owner: &HolderId) -> Result<bool, StoreError> {
        Ok(self
            .get_row::<UnreadFlag>(&keys::unread(owner))?
            .map(|flag| flag.has_news())
            .unwrap_or(false))
    }

    /// Clear the unread flag
    pub fn mark_read(&self, owner: &HolderId) -> Result<(), StoreError> {
        self.put_row(&keys::unread(owner), &UnreadFlag::new(owner.clone(), false))
    }
}
