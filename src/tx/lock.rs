//! Per-row exclusive locks.
//!
//! Writers lock each row they mutate, keyed `(table, page, slot)`, and
//! hold every lock until commit or abort (strict two-phase locking on X
//! locks). Readers never lock; MVCC gives them consistency. Deadlocks are
//! broken by timeout: a lock that cannot be granted within the configured
//! wait fails the statement with a transient error.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::catalog::Oid;
use crate::value::TupleId;

use super::types::TxId;

/// Identifies one lockable row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockKey {
    pub table: Oid,
    pub page_num: u32,
    pub slot_num: u16,
}

impl LockKey {
    /// Creates a key for a row of a table.
    pub fn new(table: Oid, tid: TupleId) -> Self {
        Self {
            table,
            page_num: tid.page_num,
            slot_num: tid.slot_num,
        }
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "table {} row ({},{})",
            self.table, self.page_num, self.slot_num
        )
    }
}

/// Errors from lock acquisition.
#[derive(Debug)]
pub enum LockError {
    /// The lock could not be granted within the timeout; the conflict is
    /// treated as a deadlock and the statement fails transiently.
    Timeout {
        key: LockKey,
        holder: TxId,
        waited: Duration,
    },
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockError::Timeout {
                key,
                holder,
                waited,
            } => write!(
                f,
                "lock on {} held by transaction {} not granted after {:?}; \
                 possible deadlock",
                key, holder, waited
            ),
        }
    }
}

impl std::error::Error for LockError {}

/// The lock table.
pub struct LockManager {
    /// How long `acquire` waits for a conflicting lock. Zero = fail fast.
    timeout: Duration,
    table: Mutex<HashMap<LockKey, TxId>>,
    released: Condvar,
}

impl LockManager {
    /// Creates a lock manager with the given acquisition timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            table: Mutex::new(HashMap::new()),
            released: Condvar::new(),
        }
    }

    /// Acquires an exclusive lock on `key` for `txid`.
    ///
    /// Re-acquisition by the current holder is a no-op. Blocks up to the
    /// configured timeout, then fails with [`LockError::Timeout`].
    pub fn acquire(&self, key: LockKey, txid: TxId) -> Result<(), LockError> {
        let deadline = Instant::now() + self.timeout;
        let mut table = self.table.lock();

        loop {
            match table.get(&key) {
                None => {
                    table.insert(key, txid);
                    return Ok(());
                }
                Some(&holder) if holder == txid => return Ok(()),
                Some(&holder) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(LockError::Timeout {
                            key,
                            holder,
                            waited: self.timeout,
                        });
                    }
                    if self
                        .released
                        .wait_until(&mut table, deadline)
                        .timed_out()
                    {
                        // Re-check once after the timed-out wait; the lock
                        // may have been released at the deadline.
                        if !table.contains_key(&key) {
                            continue;
                        }
                        let holder = *table.get(&key).unwrap_or(&holder);
                        return Err(LockError::Timeout {
                            key,
                            holder,
                            waited: self.timeout,
                        });
                    }
                }
            }
        }
    }

    /// Releases every lock held by `txid` (commit or abort).
    pub fn release_all(&self, txid: TxId) {
        let mut table = self.table.lock();
        table.retain(|_, holder| *holder != txid);
        self.released.notify_all();
    }

    /// Number of locks currently held, for diagnostics.
    pub fn held_count(&self) -> usize {
        self.table.lock().len()
    }
}
