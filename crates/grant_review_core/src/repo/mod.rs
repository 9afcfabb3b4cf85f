//! Repository layer: SQLite persistence for the grant aggregate.
//!
//! # Responsibility
//! - Keep SQL details inside the core persistence boundary.
//! - Run every mutation as one `IMMEDIATE` transaction so check-then-act
//!   sequences see a snapshot no concurrent writer can change.
//!
//! # Invariants
//! - Role mutations consult the invariant guard inside their transaction.
//! - Storage failures inside a mutation surface as `TransactionAborted` and
//!   leave nothing committed.
//! - Read paths reject invalid persisted state instead of masking it.

pub mod grant_repo;
pub mod panel_repo;
pub mod review_repo;
pub mod role_repo;

use crate::error::{CoreError, CoreResult};
use log::warn;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use uuid::Uuid;

/// Runs `body` inside an `IMMEDIATE` transaction and commits on success.
///
/// The write lock is taken at `BEGIN`, so a concurrent writer waits for the
/// busy timeout instead of interleaving with the check inside `body`.
pub(crate) fn with_immediate_tx<T, F>(
    conn: &Connection,
    operation: &'static str,
    body: F,
) -> CoreResult<T>
where
    F: FnOnce(&Transaction<'_>) -> CoreResult<T>,
{
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(|err| abort(CoreError::from(err), operation))?;
    let value = body(&tx).map_err(|err| abort(err, operation))?;
    tx.commit()
        .map_err(|err| abort(CoreError::from(err), operation))?;
    Ok(value)
}

fn abort(err: CoreError, operation: &'static str) -> CoreError {
    let err = err.aborted(operation);
    if err.is_lock_contention() {
        warn!(
            "event=tx_lock_contention module=repo status=aborted operation={} error={}",
            operation, err
        );
    }
    err
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> CoreResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| CoreError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_flag(value: i64, column: &'static str) -> CoreResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(CoreError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
