// Aggregate ledger - one total per (holder, coin, marker flag)

use crate::identity::HolderId;
use crate::ledger::LedgerError;
use crate::storage::{decode, encode, keys, CoinStore, StoreError};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionalTree};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateKey {
    holder: HolderId,
    coin: HolderId,
    marker: bool,
}

impl AggregateKey {
    pub fn new(holder: HolderId, coin: HolderId, marker: bool) -> Self {
        Self { holder, coin, marker }
    }

    pub fn holder(&self) -> &HolderId {
        &self.holder
    }

    pub fn coin(&self) -> &HolderId {
        &self.coin
    }

    pub fn is_marker(&self) -> bool {
        self.marker
    }

    pub(crate) fn storage_key(&self) -> Vec<u8> {
        keys::aggregate(&self.holder, &self.coin, self.marker)
    }
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.marker { "marker" } else { "plain" };
        write!(f, "{}/{}/{}", self.holder, self.coin, kind)
    }
}

/// A holder's total balance of one coin
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateBalance {
    key: AggregateKey,
    amount: i64,
}

impl AggregateBalance {
    fn zero(key: AggregateKey) -> Self {
        Self { key, amount: 0 }
    }

    pub fn key(&self) -> &AggregateKey {
        &self.key
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }
}

#[derive(Clone)]
pub struct AggregateLedger {
    store: CoinStore,
}

impl AggregateLedger {
    pub fn new(store: CoinStore) -> Self {
        Self { store }
    }

    /// Current row, or a zero-valued row if the holder never held the coin.
    ///
    /// The zero row is not written here; the commit that first adjusts it
    /// creates it, so rejected transfers leave no rows behind.
    pub fn get_or_init(
        &self,
        holder: &HolderId,
        coin: &HolderId,
        marker: bool,
    ) -> Result<AggregateBalance, LedgerError> {
        let key = AggregateKey::new(holder.clone(), coin.clone(), marker);
        Ok(self
            .store
            .get_row(&key.storage_key())?
            .unwrap_or_else(|| AggregateBalance::zero(key)))
    }

    /// Whether a row has been written for this key
    pub fn exists(&self, key: &AggregateKey) -> Result<bool, LedgerError> {
        Ok(self
            .store
            .db()
            .contains_key(key.storage_key())
            .map_err(StoreError::from)?)
    }

    /// Balance amount (zero if the row does not exist)
    pub fn balance(&self, holder: &HolderId, coin: &HolderId, marker: bool) -> Result<i64, LedgerError> {
        Ok(self.get_or_init(holder, coin, marker)?.amount)
    }

    /// Every aggregate row for a holder
    pub fn holdings(&self, holder: &HolderId) -> Result<Vec<AggregateBalance>, LedgerError> {
        Ok(self.store.scan_rows(&keys::aggregate_prefix(holder))?)
    }

    /// Adjust a balance by `delta` in its own transaction.
    ///
    /// Negative results are not rejected; sufficiency is checked by the
    /// caller when it builds its plan.
    pub fn apply_delta(&self, key: &AggregateKey, delta: i64) -> Result<AggregateBalance, LedgerError> {
        let row = self
            .store
            .db()
            .transaction(|tx| Self::apply_delta_tx(tx, key, delta))?;
        Ok(row)
    }

    pub(crate) fn apply_delta_tx(
        tx: &TransactionalTree,
        key: &AggregateKey,
        delta: i64,
    ) -> Result<AggregateBalance, ConflictableTransactionError<LedgerError>> {
        let storage_key = key.storage_key();
        let mut row = match tx.get(&storage_key)? {
            Some(bytes) => decode::<AggregateBalance>(&bytes)
                .map_err(|e| ConflictableTransactionError::Abort(e.into()))?,
            None => AggregateBalance::zero(key.clone()),
        };

        row.amount = row.amount.checked_add(delta).ok_or_else(|| {
            ConflictableTransactionError::Abort(LedgerError::Overflow(key.to_string()))
        })?;

        let bytes = encode(&row).map_err(|e| ConflictableTransactionError::Abort(e.into()))?;
        tx.insert(storage_key, bytes)?;
        Ok(row)
    }
}
