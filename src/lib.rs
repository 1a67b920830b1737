// skillcoin - personal coins backed by versioned skill bundles
//
// Every holder issues their own coin. Each issuance is backed by an immutable
// snapshot set of the issuer's skills (a backing version); balances are kept
// both as a per-coin total and broken out per backing version, and spending
// always consumes the oldest version first.

pub mod config;
pub mod engine;
pub mod identity;
pub mod ledger;
pub mod lock;
pub mod skills;
pub mod snapshot;
pub mod storage;
pub mod worker;

pub use config::{Config, ConfigError, EngineConfig, StorageConfig, WorkerConfig};
pub use engine::{TransferEngine, TransferError, TransferReceipt, TransferRequest};
pub use identity::{HolderId, HolderIdError};
pub use storage::{CoinStore, StoreError};
