// Atomic commit of everything one transfer writes
//
// A CommitSet collects aggregate deltas, versioned deltas, pay records,
// activity entries and unread flags. commit() applies the whole set in one
// sled transaction: either every row changes or none does.

use crate::identity::HolderId;
use crate::ledger::{
    ActivityEntry, AggregateKey, AggregateLedger, LedgerError, PayRecord, UnreadFlag, VersionedDelta,
    VersionedLedger,
};
use crate::storage::{encode, keys, CoinStore};
use sled::transaction::ConflictableTransactionError;
use tracing::debug;

#[derive(Clone, Debug, Default)]
pub struct CommitSet {
    aggregate: Vec<(AggregateKey, i64)>,
    versioned: Vec<VersionedDelta>,
    records: Vec<PayRecord>,
    activity: Vec<ActivityEntry>,
    unread: Vec<HolderId>,
}

impl CommitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_aggregate(&mut self, key: AggregateKey, delta: i64) {
        self.aggregate.push((key, delta));
    }

    pub fn add_versioned(&mut self, delta: VersionedDelta) {
        self.versioned.push(delta);
    }

    pub fn add_record(&mut self, record: PayRecord) {
        self.records.push(record);
    }

    pub fn add_activity(&mut self, entry: ActivityEntry) {
        self.activity.push(entry);
    }

    pub fn flag_unread(&mut self, owner: HolderId) {
        if !self.unread.contains(&owner) {
            self.unread.push(owner);
        }
    }

    pub fn aggregate_deltas(&self) -> &[(AggregateKey, i64)] {
        &self.aggregate
    }

    pub fn versioned_deltas(&self) -> &[VersionedDelta] {
        &self.versioned
    }

    pub fn records(&self) -> &[PayRecord] {
        &self.records
    }

    pub fn activity(&self) -> &[ActivityEntry] {
        &self.activity
    }

    pub fn unread(&self) -> &[HolderId] {
        &self.unread
    }

    pub fn is_empty(&self) -> bool {
        self.aggregate.is_empty()
            && self.versioned.is_empty()
            && self.records.is_empty()
            && self.activity.is_empty()
            && self.unread.is_empty()
    }

    pub fn into_records(self) -> Vec<PayRecord> {
        self.records
    }
}

/// Counts of what a commit wrote
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub aggregate_rows: usize,
    pub versioned_rows: usize,
    pub records: usize,
    pub record_batches: usize,
    pub activity_entries: usize,
}

/// Apply a commit set atomically.
///
/// Pay records are written in chunks of `record_batch_size`; every chunk is
/// part of the same transaction.
pub fn commit(store: &CoinStore, set: &CommitSet, record_batch_size: usize) -> Result<CommitSummary, LedgerError> {
    let batch_size = record_batch_size.max(1);

    // Encode outside the transaction: the closure may run more than once
    let mut record_rows = Vec::with_capacity(set.records.len());
    for record in &set.records {
        record_rows.push((
            keys::record(record.id()),
            keys::record_correlation(record.correlation().as_bytes(), record.id()),
            encode(record)?,
        ));
    }
    let mut activity_rows = Vec::with_capacity(set.activity.len());
    for entry in &set.activity {
        activity_rows.push((keys::activity(entry.owner(), entry.id()), encode(entry)?));
    }
    let mut unread_rows = Vec::with_capacity(set.unread.len());
    for owner in &set.unread {
        unread_rows.push((keys::unread(owner), encode(&UnreadFlag::new(owner.clone(), true))?));
    }

    let summary = store
        .db()
        .transaction(|tx| -> Result<CommitSummary, ConflictableTransactionError<LedgerError>> {
            let mut summary = CommitSummary::default();

            for (key, delta) in &set.aggregate {
                AggregateLedger::apply_delta_tx(tx, key, *delta)?;
                summary.aggregate_rows += 1;
            }

            for delta in &set.versioned {
                VersionedLedger::apply_delta_tx(tx, delta)?;
                summary.versioned_rows += 1;
            }

            for chunk in record_rows.chunks(batch_size) {
                for (record_key, correlation_key, bytes) in chunk {
                    tx.insert(record_key.as_slice(), bytes.as_slice())?;
                    tx.insert(correlation_key.as_slice(), &[] as &[u8])?;
                    summary.records += 1;
                }
                summary.record_batches += 1;
            }

            for (key, bytes) in &activity_rows {
                tx.insert(key.as_slice(), bytes.as_slice())?;
                summary.activity_entries += 1;
            }

            for (key, bytes) in &unread_rows {
                tx.insert(key.as_slice(), bytes.as_slice())?;
            }

            Ok(summary)
        })?;

    debug!(
        aggregate = summary.aggregate_rows,
        versioned = summary.versioned_rows,
        records = summary.records,
        batches = summary.record_batches,
        "commit applied"
    );
    Ok(summary)
}
