// Versioned ledger - a holder's balance of a coin, broken out per backing version
//
// Rows are keyed (holder, coin, version id). Version ids grow with creation
// time and are stored big-endian, so a forward scan over one holder's coin
// visits versions oldest first.

use crate::identity::HolderId;
use crate::ledger::LedgerError;
use crate::snapshot::{BackingVersion, SetDigest, VersionId};
use crate::storage::{decode, encode, keys, CoinStore, StoreError};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionalTree};
use std::collections::VecDeque;
use std::fmt;
use std::ops::Bound;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionedKey {
    holder: HolderId,
    coin: HolderId,
    version: VersionId,
}

impl VersionedKey {
    pub fn new(holder: HolderId, coin: HolderId, version: VersionId) -> Self {
        Self { holder, coin, version }
    }

    pub fn holder(&self) -> &HolderId {
        &self.holder
    }

    pub fn coin(&self) -> &HolderId {
        &self.coin
    }

    pub fn version(&self) -> VersionId {
        self.version
    }

    pub(crate) fn storage_key(&self) -> Vec<u8> {
        keys::versioned(&self.holder, &self.coin, self.version.value())
    }
}

impl fmt::Display for VersionedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.holder, self.coin, self.version)
    }
}

/// Amount of one backing version of a coin held by a holder
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedBalance {
    key: VersionedKey,
    /// Digest of the backing version, used to re-identify it when spending
    digest: SetDigest,
    amount: i64,
}

impl VersionedBalance {
    pub(crate) fn new(key: VersionedKey, digest: SetDigest, amount: i64) -> Self {
        Self { key, digest, amount }
    }

    fn zero(key: VersionedKey, digest: SetDigest) -> Self {
        Self::new(key, digest, 0)
    }

    pub fn key(&self) -> &VersionedKey {
        &self.key
    }

    pub fn version(&self) -> VersionId {
        self.key.version
    }

    pub fn digest(&self) -> &SetDigest {
        &self.digest
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }
}

/// Whether a delta may drive a row below zero
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaGuard {
    /// Issuer rows of their own coin go negative by the amount outstanding
    Unchecked,
    /// Spending rows must stay at or above zero
    NonNegative,
}

/// A pending change to one versioned row
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionedDelta {
    pub key: VersionedKey,
    pub digest: SetDigest,
    pub delta: i64,
    pub guard: DeltaGuard,
}

struct Page {
    rows: Vec<VersionedBalance>,
    last_seen: Option<VersionId>,
    done: bool,
}

#[derive(Clone)]
pub struct VersionedLedger {
    store: CoinStore,
    page_size: usize,
}

impl VersionedLedger {
    pub fn new(store: CoinStore, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Current row for this backing version, or a zero-valued row.
    /// Like the aggregate ledger, the zero row is materialised by the commit.
    pub fn get_or_init(
        &self,
        holder: &HolderId,
        coin: &HolderId,
        version: &BackingVersion,
    ) -> Result<VersionedBalance, LedgerError> {
        let key = VersionedKey::new(holder.clone(), coin.clone(), version.id());
        Ok(self
            .get(&key)?
            .unwrap_or_else(|| VersionedBalance::zero(key, *version.digest())))
    }

    pub fn get(&self, key: &VersionedKey) -> Result<Option<VersionedBalance>, LedgerError> {
        Ok(self.store.get_row(&key.storage_key())?)
    }

    /// Spendable rows (amount > 0) in ascending version order, fetched lazily
    /// one page at a time.
    pub fn list_spendable(&self, holder: &HolderId, coin: &HolderId) -> SpendableRows<'_> {
        SpendableRows {
            ledger: self,
            holder: holder.clone(),
            coin: coin.clone(),
            cursor: None,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    /// One page of spendable rows with versions strictly after `after`
    pub fn spendable_page(
        &self,
        holder: &HolderId,
        coin: &HolderId,
        after: Option<VersionId>,
        limit: usize,
    ) -> Result<Vec<VersionedBalance>, LedgerError> {
        Ok(self.scan_page(holder, coin, after, limit)?.rows)
    }

    fn scan_page(
        &self,
        holder: &HolderId,
        coin: &HolderId,
        after: Option<VersionId>,
        limit: usize,
    ) -> Result<Page, LedgerError> {
        let prefix = keys::versioned_prefix(holder, coin);
        let start = match after {
            Some(version) => Bound::Excluded(keys::versioned(holder, coin, version.value())),
            None => Bound::Included(prefix.clone()),
        };
        let end = Bound::Excluded(keys::prefix_upper_bound(&prefix));

        let mut page = Page {
            rows: Vec::new(),
            last_seen: after,
            done: true,
        };
        for result in self.store.db().range((start, end)) {
            let (_, value) = result.map_err(StoreError::from)?;
            let row: VersionedBalance = decode(&value)?;
            page.last_seen = Some(row.version());
            if row.amount > 0 {
                page.rows.push(row);
                if page.rows.len() >= limit {
                    page.done = false;
                    break;
                }
            }
        }
        Ok(page)
    }

    /// Rows with amount > 0, newest version first
    pub fn list_for_display(&self, holder: &HolderId, coin: &HolderId) -> Result<Vec<VersionedBalance>, LedgerError> {
        let mut rows = Vec::new();
        for result in self.store.db().scan_prefix(keys::versioned_prefix(holder, coin)).rev() {
            let (_, value) = result.map_err(StoreError::from)?;
            let row: VersionedBalance = decode(&value)?;
            if row.amount > 0 {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Sum of every versioned row (including zero and negative rows)
    pub fn total(&self, holder: &HolderId, coin: &HolderId) -> Result<i64, LedgerError> {
        let rows: Vec<VersionedBalance> = self.store.scan_rows(&keys::versioned_prefix(holder, coin))?;
        Ok(rows.iter().map(|r| r.amount).sum())
    }

    /// Adjust one row in its own transaction
    pub fn apply_delta(&self, delta: &VersionedDelta) -> Result<VersionedBalance, LedgerError> {
        let row = self
            .store
            .db()
            .transaction(|tx| Self::apply_delta_tx(tx, delta))?;
        Ok(row)
    }

    pub(crate) fn apply_delta_tx(
        tx: &TransactionalTree,
        delta: &VersionedDelta,
    ) -> Result<VersionedBalance, ConflictableTransactionError<LedgerError>> {
        let storage_key = delta.key.storage_key();
        let mut row = match tx.get(&storage_key)? {
            Some(bytes) => decode::<VersionedBalance>(&bytes)
                .map_err(|e| ConflictableTransactionError::Abort(e.into()))?,
            None => VersionedBalance::zero(delta.key.clone(), delta.digest),
        };

        if row.digest != delta.digest {
            return Err(ConflictableTransactionError::Abort(LedgerError::DigestMismatch(
                delta.key.to_string(),
            )));
        }

        let amount = row.amount.checked_add(delta.delta).ok_or_else(|| {
            ConflictableTransactionError::Abort(LedgerError::Overflow(delta.key.to_string()))
        })?;
        if delta.guard == DeltaGuard::NonNegative && amount < 0 {
            return Err(ConflictableTransactionError::Abort(LedgerError::NegativeBalance {
                key: delta.key.to_string(),
                amount,
            }));
        }
        row.amount = amount;

        let bytes = encode(&row).map_err(|e| ConflictableTransactionError::Abort(e.into()))?;
        tx.insert(storage_key, bytes)?;
        Ok(row)
    }
}

/// Lazy oldest-first iterator over spendable rows
pub struct SpendableRows<'a> {
    ledger: &'a VersionedLedger,
    holder: HolderId,
    coin: HolderId,
    cursor: Option<VersionId>,
    buffer: VecDeque<VersionedBalance>,
    done: bool,
}

impl Iterator for SpendableRows<'_> {
    type Item = Result<VersionedBalance, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.done {
            match self
                .ledger
                .scan_page(&self.holder, &self.coin, self.cursor, self.ledger.page_size)
            {
                Ok(page) => {
                    self.cursor = page.last_seen;
                    self.done = page.done;
                    self.buffer.extend(page.rows);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
