//! Durable state for the ballast rebalancing bot.
//!
//! Everything that outlives a process lives here:
//! - `StateLock`: cross-process advisory file lock
//! - `TransactionLedger`: one JSON audit record per rebalance attempt
//! - `StateStore`: last-successful-rebalance marker, written atomically
//! - `BackupManager`: checksummed backups with retention cleanup

pub mod backup;
pub mod error;
pub mod ledger;
pub mod lock;
pub mod state;

pub use backup::BackupManager;
pub use error::{PersistenceError, PersistenceResult};
pub use ledger::{TransactionLedger, TransactionRecord, TransactionStatus};
pub use lock::{StateLock, StateLockGuard};
pub use state::{RebalanceStateMarker, StateStore};
