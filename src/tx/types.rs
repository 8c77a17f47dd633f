//! Transaction identifiers, states, and undo records.

use std::fmt;

use crate::catalog::Oid;
use crate::value::{Tuple, TupleId};

/// A transaction identifier. Monotonic u64, allocated centrally.
pub type TxId = u64;

/// The invalid transaction id; an `xmax` of 0 means "not deleted".
pub const INVALID_TXID: TxId = 0;

/// Reserved id for bootstrap writes that precede any user transaction.
pub const BOOTSTRAP_TXID: TxId = 1;

/// Lifecycle state of a transaction. The terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Active,
    Committed,
    Aborted,
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxState::Active => "active",
            TxState::Committed => "committed",
            TxState::Aborted => "aborted",
        };
        write!(f, "{name}")
    }
}

/// One entry of a transaction's undo log.
///
/// Each record carries what its inverse needs: the inserted tuple (so
/// abort can also unhook index entries), the deleted pre-image, or both
/// sides of an update.
#[derive(Debug, Clone)]
pub enum UndoRecord {
    /// Reverses an INSERT: tombstone `tid` and drop its index entries.
    Insert {
        table: Oid,
        tid: TupleId,
        tuple: Tuple,
    },
    /// Reverses a DELETE: clear the `xmax` stamp on `tid`.
    Delete {
        table: Oid,
        tid: TupleId,
        tuple: Tuple,
    },
    /// Reverses an UPDATE: resurrect the old version, tombstone the new.
    Update {
        table: Oid,
        old_tid: TupleId,
        new_tid: TupleId,
        old_tuple: Tuple,
        new_tuple: Tuple,
    },
}

/// Errors from transaction control.
#[derive(Debug)]
pub enum TxError {
    /// The transaction id is unknown to the manager.
    NotFound(TxId),
    /// An invalid state transition was attempted (e.g. double commit).
    InvalidTransition {
        txid: TxId,
        current: TxState,
        attempted: TxState,
    },
    /// COMMIT or ROLLBACK with no transaction in progress.
    NoActiveTransaction,
    /// The transaction has failed; only ROLLBACK is accepted.
    TransactionAborted,
}

impl fmt::Display for TxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxError::NotFound(txid) => write!(f, "transaction {} not found", txid),
            TxError::InvalidTransition {
                txid,
                current,
                attempted,
            } => write!(
                f,
                "transaction {} is {}, cannot become {}",
                txid, current, attempted
            ),
            TxError::NoActiveTransaction => {
                write!(f, "no transaction in progress")
            }
            TxError::TransactionAborted => write!(
                f,
                "current transaction is aborted, commands ignored until end of transaction block"
            ),
        }
    }
}

impl std::error::Error for TxError {}
