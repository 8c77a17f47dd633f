//! Transactions, MVCC visibility, and row locks.
//!
//! Transaction ids are monotonic u64 handed out by the
//! [`TransactionManager`]; 0 is invalid (a live `xmax` of 0 means "not
//! deleted") and 1 is reserved for bootstrap writes. Readers never block:
//! visibility comes from a [`Snapshot`] captured at `begin()` plus the
//! tuple's `xmin`/`xmax` stamps. Writers take per-row exclusive locks from
//! the [`LockManager`], held to transaction end (strict two-phase locking).

mod lock;
mod manager;
mod snapshot;
mod types;
mod visibility;

pub use lock::{LockError, LockKey, LockManager};
pub use manager::TransactionManager;
pub use snapshot::Snapshot;
pub use types::{TxError, TxId, TxState, UndoRecord, INVALID_TXID, BOOTSTRAP_TXID};
pub use visibility::SnapshotView;
