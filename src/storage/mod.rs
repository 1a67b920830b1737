// Storage module - PERSISTENCE
// Handles persistent key-value storage using sled

pub(crate) mod keys;
mod store;

pub(crate) use store::{decode, encode};
pub use store::{CoinRecord, CoinStore, StorageStats, StoreError};
