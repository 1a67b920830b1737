// TransferEngine - issuance and transfer of skill-backed coins
//
// Flow for one request:
// 1. Validate (self transfer, receiver, coin, amount) without locking
// 2. Try-lock payer and receiver together; busy is an immediate rejection
// 3. Build a CommitSet for the issuance, spend or marker path
// 4. Commit the set atomically
// 5. Publish a SettledTransfer event for the stats worker
// The pair guard is dropped on every exit path.

use crate::config::EngineConfig;
use crate::engine::plan::{plan_consumption, PlanError};
use crate::engine::TransferError;
use crate::identity::HolderId;
use crate::ledger::{
    commit, ActivityDirection, ActivityEntry, AggregateKey, AggregateLedger, CommitSet, CorrelationId,
    DeltaGuard, PayRecord, VersionedDelta, VersionedKey, VersionedLedger,
};
use crate::lock::{HolderLockManager, LockPurpose};
use crate::skills::SkillSource;
use crate::snapshot::{BackingVersion, SnapshotSetStore};
use crate::storage::CoinStore;
use crate::worker::SettledTransfer;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

// ============================================================================
// REQUEST / RECEIPT
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRequest {
    payer: HolderId,
    receiver: HolderId,
    coin: HolderId,
    amount: u64,
    marker: bool,
}

impl TransferRequest {
    pub fn new(payer: HolderId, receiver: HolderId, coin: HolderId, amount: u64) -> Self {
        Self {
            payer,
            receiver,
            coin,
            amount,
            marker: false,
        }
    }

    /// Mark the transfer as unbacked: only aggregate rows move
    pub fn with_marker(mut self, marker: bool) -> Self {
        self.marker = marker;
        self
    }

    pub fn payer(&self) -> &HolderId {
        &self.payer
    }

    pub fn receiver(&self) -> &HolderId {
        &self.receiver
    }

    pub fn coin(&self) -> &HolderId {
        &self.coin
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn is_marker(&self) -> bool {
        self.marker
    }

    /// The payer is minting their own coin
    pub fn is_issuance(&self) -> bool {
        self.coin == self.payer
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferKind {
    Issuance,
    Transfer,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Issuance => write!(f, "issuance"),
            TransferKind::Transfer => write!(f, "transfer"),
        }
    }
}

/// What a settled transfer wrote
#[derive(Clone, Debug)]
pub struct TransferReceipt {
    correlation: CorrelationId,
    kind: TransferKind,
    marker: bool,
    records: Vec<PayRecord>,
}

impl TransferReceipt {
    pub fn correlation(&self) -> &CorrelationId {
        &self.correlation
    }

    pub fn kind(&self) -> TransferKind {
        self.kind
    }

    pub fn is_marker(&self) -> bool {
        self.marker
    }

    /// Pay records, one per backing version drawn from (one for marker payments)
    pub fn records(&self) -> &[PayRecord] {
        &self.records
    }

    pub fn total(&self) -> u64 {
        self.records.iter().map(|r| r.amount()).sum()
    }
}

// ============================================================================
// ENGINE
// ============================================================================

#[derive(Clone)]
pub struct TransferEngine {
    store: CoinStore,
    snapshots: SnapshotSetStore,
    aggregate: AggregateLedger,
    versioned: VersionedLedger,
    locks: HolderLockManager,
    skills: Arc<dyn SkillSource>,
    config: EngineConfig,
    events: Option<mpsc::Sender<SettledTransfer>>,
}

impl TransferEngine {
    pub fn new(
        store: CoinStore,
        locks: HolderLockManager,
        skills: Arc<dyn SkillSource>,
        config: EngineConfig,
    ) -> Self {
        Self {
            snapshots: SnapshotSetStore::new(store.clone()),
            aggregate: AggregateLedger::new(store.clone()),
            versioned: VersionedLedger::new(store.clone(), config.page_size),
            store,
            locks,
            skills,
            config,
            events: None,
        }
    }

    /// Publish settled transfers on this channel
    pub fn with_events(mut self, events: mpsc::Sender<SettledTransfer>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn store(&self) -> &CoinStore {
        &self.store
    }

    pub fn snapshots(&self) -> &SnapshotSetStore {
        &self.snapshots
    }

    pub fn aggregate(&self) -> &AggregateLedger {
        &self.aggregate
    }

    pub fn versioned(&self) -> &VersionedLedger {
        &self.versioned
    }

    pub fn locks(&self) -> &HolderLockManager {
        &self.locks
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Settle one transfer, or reject it with nothing written
    #[tracing::instrument(
        name = "transfer",
        skip_all,
        fields(
            payer = %request.payer,
            receiver = %request.receiver,
            coin = %request.coin,
            amount = request.amount,
            marker = request.marker,
        )
    )]
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferReceipt, TransferError> {
        self.validate(&request)?;

        let _pair = self
            .locks
            .try_acquire_pair(&request.payer, &request.receiver, LockPurpose::Transfer)
            .map_err(|e| {
                debug!(busy = %e.holder(), "transfer rejected, holder busy");
                TransferError::from(e)
            })?;

        let kind = if request.is_issuance() {
            TransferKind::Issuance
        } else {
            TransferKind::Transfer
        };
        let correlation = CorrelationId::generate();
        let mut set = CommitSet::new();

        if request.marker {
            self.plan_marker(&request, correlation, &mut set)?;
        } else if request.is_issuance() {
            self.plan_issuance(&request, correlation, &mut set).await?;
        } else {
            self.plan_spend(&request, correlation, &mut set)?;
        }
        self.add_activity(&request, correlation, &mut set)?;

        let summary = commit(&self.store, &set, self.config.record_batch_size)?;
        let records = set.into_records();

        info!(
            %correlation,
            %kind,
            legs = records.len(),
            batches = summary.record_batches,
            "transfer settled"
        );

        self.publish(SettledTransfer {
            correlation,
            coin: request.coin.clone(),
            payer: request.payer.clone(),
            receiver: request.receiver.clone(),
            amount: request.amount,
            is_issue: kind == TransferKind::Issuance,
            is_marker: request.marker,
            legs: records.len(),
        });

        Ok(TransferReceipt {
            correlation,
            kind,
            marker: request.marker,
            records,
        })
    }

    fn validate(&self, request: &TransferRequest) -> Result<(), TransferError> {
        if request.payer == request.receiver {
            return Err(TransferError::SelfTransferRejected);
        }
        if !self.store.holder_exists(&request.receiver)? {
            return Err(TransferError::UnknownReceiver(request.receiver.clone()));
        }
        if !self.store.holder_exists(&request.coin)? {
            return Err(TransferError::UnknownCoin(request.coin.clone()));
        }
        if request.amount == 0 || request.amount > i64::MAX as u64 {
            return Err(TransferError::InvalidAmount(request.amount));
        }
        Ok(())
    }

    // ========================================================================
    // PLANS
    // ========================================================================

    /// Aggregate rows only; no backing version is resolved
    fn plan_marker(
        &self,
        request: &TransferRequest,
        correlation: CorrelationId,
        set: &mut CommitSet,
    ) -> Result<(), TransferError> {
        if !request.is_issuance() {
            self.check_aggregate(request, true)?;
        }
        self.add_aggregate_legs(request, true, set);
        set.add_record(self.pay_record(request, correlation, request.amount, None)?);
        Ok(())
    }

    /// Mint against the issuer's current skills
    async fn plan_issuance(
        &self,
        request: &TransferRequest,
        correlation: CorrelationId,
        set: &mut CommitSet,
    ) -> Result<(), TransferError> {
        let skills = self.skills.active_skills(&request.payer).await?;
        if skills.is_empty() {
            return Err(TransferError::NoActiveSkillsForIssuance(request.payer.clone()));
        }

        let mut members = Vec::with_capacity(skills.len());
        for skill in &skills {
            members.push(self.snapshots.snapshot_skill(skill)?);
        }
        let version = self.snapshots.resolve_or_create(&request.payer, &members)?;
        debug!(version = %version.id(), digest = %version.digest(), "issuance backed");

        let amount = request.amount as i64;
        self.add_aggregate_legs(request, false, set);
        set.add_versioned(VersionedDelta {
            key: VersionedKey::new(request.payer.clone(), request.coin.clone(), version.id()),
            digest: *version.digest(),
            delta: -amount,
            guard: DeltaGuard::Unchecked,
        });
        set.add_versioned(VersionedDelta {
            key: VersionedKey::new(request.receiver.clone(), request.coin.clone(), version.id()),
            digest: *version.digest(),
            delta: amount,
            guard: DeltaGuard::NonNegative,
        });
        set.add_record(self.pay_record(request, correlation, request.amount, Some(&version))?);
        Ok(())
    }

    /// Draw the amount from the payer's oldest backing versions first
    fn plan_spend(
        &self,
        request: &TransferRequest,
        correlation: CorrelationId,
        set: &mut CommitSet,
    ) -> Result<(), TransferError> {
        let available = self.check_aggregate(request, false)?;

        let rows = self.versioned.list_spendable(&request.payer, &request.coin);
        let plan = match plan_consumption(rows, request.amount) {
            Ok(plan) => plan,
            Err(PlanError::Insufficient { requested, covered }) => {
                warn!(
                    aggregate = available,
                    covered,
                    requested,
                    "versioned rows do not cover the aggregate balance"
                );
                return Err(TransferError::InsufficientBalance {
                    holder: request.payer.clone(),
                    coin: request.coin.clone(),
                    requested,
                    available: covered as i64,
                });
            }
            Err(PlanError::Source(e)) => return Err(e.into()),
        };

        // Coin returning to its issuer lands on the issuer's negative rows
        let receiver_guard = if request.receiver == request.coin {
            DeltaGuard::Unchecked
        } else {
            DeltaGuard::NonNegative
        };

        for leg in plan.legs() {
            // Every row being spent must still name a known backing version
            let version = self
                .snapshots
                .lookup_by_digest(&leg.digest)?
                .filter(|v| v.id() == leg.version)
                .ok_or_else(|| {
                    TransferError::InternalConsistencyViolation(format!(
                        "backing version {} ({}) of coin {} is missing",
                        leg.version, leg.digest, request.coin
                    ))
                })?;

            let amount = leg.amount as i64;
            set.add_versioned(VersionedDelta {
                key: VersionedKey::new(request.payer.clone(), request.coin.clone(), version.id()),
                digest: *version.digest(),
                delta: -amount,
                guard: DeltaGuard::NonNegative,
            });
            set.add_versioned(VersionedDelta {
                key: VersionedKey::new(request.receiver.clone(), request.coin.clone(), version.id()),
                digest: *version.digest(),
                delta: amount,
                guard: receiver_guard,
            });
            set.add_record(self.pay_record(request, correlation, leg.amount, Some(&version))?);
        }

        debug!(legs = plan.len(), "spend planned");
        self.add_aggregate_legs(request, false, set);
        Ok(())
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    /// Payer's aggregate for an existing coin must exist and cover the amount
    fn check_aggregate(&self, request: &TransferRequest, marker: bool) -> Result<i64, TransferError> {
        let key = AggregateKey::new(request.payer.clone(), request.coin.clone(), marker);
        let available = if self.aggregate.exists(&key)? {
            self.aggregate.balance(&request.payer, &request.coin, marker)?
        } else {
            0
        };
        if available < request.amount as i64 {
            return Err(TransferError::InsufficientBalance {
                holder: request.payer.clone(),
                coin: request.coin.clone(),
                requested: request.amount,
                available,
            });
        }
        Ok(available)
    }

    fn add_aggregate_legs(&self, request: &TransferRequest, marker: bool, set: &mut CommitSet) {
        let amount = request.amount as i64;
        set.add_aggregate(
            AggregateKey::new(request.payer.clone(), request.coin.clone(), marker),
            -amount,
        );
        set.add_aggregate(
            AggregateKey::new(request.receiver.clone(), request.coin.clone(), marker),
            amount,
        );
    }

    fn pay_record(
        &self,
        request: &TransferRequest,
        correlation: CorrelationId,
        amount: u64,
        version: Option<&BackingVersion>,
    ) -> Result<PayRecord, TransferError> {
        Ok(PayRecord::new(
            self.store.generate_id()?,
            correlation,
            request.coin.clone(),
            request.payer.clone(),
            request.receiver.clone(),
            amount,
            request.is_issuance(),
            request.marker,
            version.map(|v| v.id()),
        ))
    }

    fn add_activity(
        &self,
        request: &TransferRequest,
        correlation: CorrelationId,
        set: &mut CommitSet,
    ) -> Result<(), TransferError> {
        let amount = request.amount as i64;
        set.add_activity(ActivityEntry::new(
            self.store.generate_id()?,
            request.payer.clone(),
            ActivityDirection::Sent,
            -amount,
            request.receiver.clone(),
            request.coin.clone(),
            correlation,
        ));
        set.add_activity(ActivityEntry::new(
            self.store.generate_id()?,
            request.receiver.clone(),
            ActivityDirection::Received,
            amount,
            request.payer.clone(),
            request.coin.clone(),
            correlation,
        ));
        set.flag_unread(request.payer.clone());
        set.flag_unread(request.receiver.clone());
        Ok(())
    }

    fn publish(&self, event: SettledTransfer) {
        let Some(events) = &self.events else {
            return;
        };
        match events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(correlation = %event.correlation, "stats queue full, event dropped");
            }
            Err(TrySendError::Closed(event)) => {
                debug!(correlation = %event.correlation, "stats worker gone, event dropped");
            }
        }
    }
}
