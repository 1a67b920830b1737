// StatsWorker - background bookkeeping that runs after a transfer commits
//
// The engine publishes SettledTransfer events on a bounded channel. The
// worker adds backed issued amounts to the issuer's coin record, retrying sink
// failures with a fixed delay. Nothing here can fail or block a transfer.

use crate::config::WorkerConfig;
use crate::identity::HolderId;
use crate::ledger::CorrelationId;
use crate::storage::CoinStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Stats sink failed: {0}")]
    Sink(String),

    #[error("Stats worker task failed: {0}")]
    Join(String),
}

// ============================================================================
// EVENTS
// ============================================================================

/// Summary of one committed transfer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettledTransfer {
    pub correlation: CorrelationId,
    pub coin: HolderId,
    pub payer: HolderId,
    pub receiver: HolderId,
    pub amount: u64,
    pub is_issue: bool,
    pub is_marker: bool,
    /// Number of pay records the transfer wrote
    pub legs: usize,
}

// ============================================================================
// STATS SINK
// ============================================================================

/// Where the worker records issuance totals
#[async_trait]
pub trait StatsSink: Send + Sync {
    /// Add `amount` to the coin's issued total, returning the new total
    async fn record_issuance(&self, coin: &HolderId, amount: u64) -> Result<u64, WorkerError>;
}

#[async_trait]
impl StatsSink for CoinStore {
    async fn record_issuance(&self, coin: &HolderId, amount: u64) -> Result<u64, WorkerError> {
        self.add_issued(coin, amount)
            .map_err(|e| WorkerError::Sink(e.to_string()))
    }
}

/// In-memory sink for tests
pub struct MockStatsSink {
    failures_before_success: usize,
    call_count: AtomicUsize,
    totals: Mutex<HashMap<HolderId, u64>>,
}

impl MockStatsSink {
    pub fn new() -> Self {
        Self {
            failures_before_success: 0,
            call_count: AtomicUsize::new(0),
            totals: Mutex::new(HashMap::new()),
        }
    }

    /// Fail the first N calls, then succeed
    pub fn with_failures_then_success(mut self, failures: usize) -> Self {
        self.failures_before_success = failures;
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn total(&self, coin: &HolderId) -> u64 {
        self.totals
            .lock()
            .map(|totals| totals.get(coin).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl Default for MockStatsSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatsSink for MockStatsSink {
    async fn record_issuance(&self, coin: &HolderId, amount: u64) -> Result<u64, WorkerError> {
        let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);
        if call_num < self.failures_before_success {
            return Err(WorkerError::Sink("mock failure".to_string()));
        }
        let mut totals = self
            .totals
            .lock()
            .map_err(|_| WorkerError::Sink("mock sink poisoned".to_string()))?;
        let total = totals.entry(coin.clone()).or_insert(0);
        *total += amount;
        Ok(*total)
    }
}

// ============================================================================
// WORKER
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub events_received: u64,
    pub issuances_recorded: u64,
    pub amount_recorded: u64,
    pub retries: u64,
    pub failures: u64,
}

/// Handle to a running stats worker
pub struct StatsWorkerHandle {
    task: JoinHandle<WorkerStats>,
}

impl StatsWorkerHandle {
    /// Wait for the worker to drain its queue and stop.
    ///
    /// The worker stops once every sender has been dropped.
    pub async fn join(self) -> Result<WorkerStats, WorkerError> {
        self.task.await.map_err(|e| WorkerError::Join(e.to_string()))
    }
}

pub struct StatsWorker<S: StatsSink> {
    sink: Arc<S>,
    config: WorkerConfig,
    stats: WorkerStats,
}

impl<S: StatsSink + 'static> StatsWorker<S> {
    pub fn new(sink: Arc<S>, config: WorkerConfig) -> Self {
        Self {
            sink,
            config,
            stats: WorkerStats::default(),
        }
    }

    /// Spawn the worker on the current runtime with a queue of `capacity`
    pub fn spawn(self, capacity: usize) -> (mpsc::Sender<SettledTransfer>, StatsWorkerHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(self.run(rx));
        (tx, StatsWorkerHandle { task })
    }

    async fn run(mut self, mut rx: mpsc::Receiver<SettledTransfer>) -> WorkerStats {
        info!("stats worker started");
        while let Some(event) = rx.recv().await {
            self.handle(event).await;
        }
        info!(
            events = self.stats.events_received,
            issuances = self.stats.issuances_recorded,
            failures = self.stats.failures,
            "stats worker stopped"
        );
        self.stats
    }

    async fn handle(&mut self, event: SettledTransfer) {
        self.stats.events_received += 1;
        debug!(correlation = %event.correlation, coin = %event.coin, amount = event.amount, "settled transfer");

        // Marker issuances are unbacked and stay out of the issued total
        if !event.is_issue || event.is_marker {
            return;
        }

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.sink.record_issuance(&event.coin, event.amount).await {
                Ok(total) => {
                    self.stats.issuances_recorded += 1;
                    self.stats.amount_recorded += event.amount;
                    debug!(coin = %event.coin, total, attempts, "issuance recorded");
                    return;
                }
                Err(e) => {
                    if attempts > self.config.max_retries {
                        self.stats.failures += 1;
                        error!(coin = %event.coin, error = %e, attempts, "giving up on issuance stats");
                        return;
                    }
                    self.stats.retries += 1;
                    warn!(coin = %event.coin, error = %e, attempts, "issuance stats failed, retrying");
                }
            }

            if self.config.retry_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
            }
        }
    }
}
