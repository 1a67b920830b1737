// Append-only records written by every settled transfer

use crate::identity::HolderId;
use crate::snapshot::VersionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Groups every pay record produced by one logical transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId([u8; 16]);

impl CorrelationId {
    /// Generate a random correlation ID
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Audit row for one leg of a transfer. Never updated or deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayRecord {
    id: u64,
    correlation: CorrelationId,
    coin: HolderId,
    payer: HolderId,
    receiver: HolderId,
    amount: u64,
    is_issue: bool,
    is_marker: bool,
    /// Backing version this leg moved; none for marker payments
    version: Option<VersionId>,
    created_at_ms: i64,
}

impl PayRecord {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: u64,
        correlation: CorrelationId,
        coin: HolderId,
        payer: HolderId,
        receiver: HolderId,
        amount: u64,
        is_issue: bool,
        is_marker: bool,
        version: Option<VersionId>,
    ) -> Self {
        Self {
            id,
            correlation,
            coin,
            payer,
            receiver,
            amount,
            is_issue,
            is_marker,
            version,
            created_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn correlation(&self) -> &CorrelationId {
        &self.correlation
    }

    pub fn coin(&self) -> &HolderId {
        &self.coin
    }

    pub fn payer(&self) -> &HolderId {
        &self.payer
    }

    pub fn receiver(&self) -> &HolderId {
        &self.receiver
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn is_issue(&self) -> bool {
        self.is_issue
    }

    pub fn is_marker(&self) -> bool {
        self.is_marker
    }

    pub fn version(&self) -> Option<VersionId> {
        self.version
    }

    pub fn created_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.created_at_ms)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityDirection {
    Received,
    Sent,
}

/// Activity feed entry shown to a holder
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    id: u64,
    owner: HolderId,
    direction: ActivityDirection,
    /// Signed change to the owner's balance
    amount: i64,
    counterparty: HolderId,
    coin: HolderId,
    correlation: CorrelationId,
    created_at_ms: i64,
}

impl ActivityEntry {
    pub(crate) fn new(
        id: u64,
        owner: HolderId,
        direction: ActivityDirection,
        amount: i64,
        counterparty: HolderId,
        coin: HolderId,
        correlation: CorrelationId,
    ) -> Self {
        Self {
            id,
            owner,
            direction,
            amount,
            counterparty,
            coin,
            correlation,
            created_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn owner(&self) -> &HolderId {
        &self.owner
    }

    pub fn direction(&self) -> ActivityDirection {
        self.direction
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn counterparty(&self) -> &HolderId {
        &self.counterparty
    }

    pub fn coin(&self) -> &HolderId {
        &self.coin
    }

    pub fn correlation(&self) -> &CorrelationId {
        &self.correlation
    }

    pub fn created_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.created_at_ms)
    }

    /// One-line human readable description
    pub fn describe(&self) -> String {
        match self.direction {
            ActivityDirection::Sent => {
                format!("sent {} {} to {}", self.amount.unsigned_abs(), self.coin, self.counterparty)
            }
            ActivityDirection::Received => {
                format!("received {} {} from {}", self.amount, self.coin, self.counterparty)
            }
        }
    }
}

/// Per-holder "has unread activity" flag
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadFlag {
    owner: HolderId,
    has_news: bool,
}

impl UnreadFlag {
    pub(crate) fn new(owner: HolderId, has_news: bool) -> Self {
        Self { owner, has_news }
    }

    pub fn owner(&self) -> &HolderId {
        &self.owner
    }

    pub fn has_news(&self) -> bool {
        self.has_news
    }
}
