//! Transaction Module
//!
//! Read-only snapshot transactions for verification queries.
//!
//! Every verification runs inside a transaction that is rolled back, never
//! committed. Planner overrides are issued with `SET LOCAL`, so they end with the
//! transaction and never leak into the session.

use crate::executor::{GuardError, GuardExecutor};
use may_postgres::types::ToSql;
use may_postgres::Row;
use rust_decimal::Decimal;

#[cfg(feature = "tracing")]
use crate::tracing_helpers;

/// Planner settings toggled to force (or allow) index-based access paths
///
/// Bitmap scans read the index too, so they are switched together with plain and
/// index-only scans.
pub const INDEX_SCAN_SETTINGS: [&str; 3] =
    ["enable_indexscan", "enable_indexonlyscan", "enable_bitmapscan"];

const BEGIN_SNAPSHOT: &str = "BEGIN TRANSACTION ISOLATION LEVEL REPEATABLE READ";

/// A snapshot transaction borrowed over an executor
///
/// Dropping an open transaction issues a best-effort `ROLLBACK`.
///
/// # Examples
///
/// ```no_run
/// use indexguard::{connect, GuardError, GuardExecutor, MayPostgresExecutor};
/// use indexguard::transaction::Transaction;
///
/// # fn main() -> Result<(), GuardError> {
/// # let client = connect("host=localhost dbname=mydb")
/// #     .map_err(|e| GuardError::Other(format!("Connection error: {e}")))?;
/// let executor = MayPostgresExecutor::new(client);
/// let txn = Transaction::begin(&executor)?;
/// txn.set_index_scans(false)?;
/// let rows = txn.query_count("SELECT count(*) FROM users")?;
/// txn.rollback()?;
/// # Ok(())
/// # }
/// ```
pub struct Transaction<'a> {
    executor: &'a dyn GuardExecutor,
    closed: bool,
}

impl<'a> Transaction<'a> {
    /// Start a repeatable-read transaction, so every statement sees one snapshot
    ///
    /// # Errors
    ///
    /// Returns `GuardError` if `BEGIN` fails.
    pub fn begin(executor: &'a dyn GuardExecutor) -> Result<Self, GuardError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::begin_transaction_span().entered();

        executor.execute(BEGIN_SNAPSHOT, &[])?;

        Ok(Self {
            executor,
            closed: false,
        })
    }

    /// Allow or forbid index, index-only and bitmap scans for the rest of the transaction
    ///
    /// # Errors
    ///
    /// Returns `GuardError` if any `SET LOCAL` fails.
    pub fn set_index_scans(&self, enabled: bool) -> Result<(), GuardError> {
        let value = if enabled { "on" } else { "off" };
        for setting in INDEX_SCAN_SETTINGS {
            self.execute(&format!("SET LOCAL {setting} = {value}"), &[])?;
        }
        Ok(())
    }

    /// Roll the transaction back, discarding the snapshot and every `SET LOCAL`
    ///
    /// # Errors
    ///
    /// Returns `GuardError` if `ROLLBACK` fails.
    pub fn rollback(mut self) -> Result<(), GuardError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::rollback_transaction_span().entered();

        self.closed = true;
        self.executor.execute("ROLLBACK", &[])?;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), GuardError> {
        if self.closed {
            return Err(GuardError::Transaction("Transaction is closed".to_string()));
        }
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.closed {
            // Best effort: drop cannot report errors
            if let Err(e) = self.executor.execute("ROLLBACK", &[]) {
                log::warn!("rollback of abandoned transaction failed: {e}");
            }
        }
    }
}

impl GuardExecutor for Transaction<'_> {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, GuardError> {
        self.ensure_open()?;
        self.executor.execute(query, params)
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, GuardError> {
        self.ensure_open()?;
        self.executor.query_all(query, params)
    }

    fn query_numeric(&self, query: &str) -> Result<Option<Decimal>, GuardError> {
        self.ensure_open()?;
        self.executor.query_numeric(query)
    }

    fn query_count(&self, query: &str) -> Result<i64, GuardError> {
        self.ensure_open()?;
        self.executor.query_count(query)
    }

    fn query_text_lines(&self, query: &str) -> Result<Vec<String>, GuardError> {
        self.ensure_open()?;
        self.executor.query_text_lines(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedExecutor;

    #[test]
    fn test_begin_and_rollback_statements() {
        let executor = ScriptedExecutor::new();
        let txn = Transaction::begin(&executor).unwrap();
        txn.set_index_scans(false).unwrap();
        txn.rollback().unwrap();

        assert_eq!(
            executor.statements(),
            vec![
                "BEGIN TRANSACTION ISOLATION LEVEL REPEATABLE READ",
                "SET LOCAL enable_indexscan = off",
                "SET LOCAL enable_indexonlyscan = off",
                "SET LOCAL enable_bitmapscan = off",
                "ROLLBACK",
            ]
        );
    }

    #[test]
    fn test_drop_rolls_back_open_transaction() {
        let executor = ScriptedExecutor::new();
        {
            let _txn = Transaction::begin(&executor).unwrap();
        }
        assert_eq!(executor.statements().last().map(String::as_str), Some("ROLLBACK"));
    }

    #[test]
    fn test_rollback_is_issued_once() {
        let executor = ScriptedExecutor::new();
        let txn = Transaction::begin(&executor).unwrap();
        txn.rollback().unwrap();
        let rollbacks = executor
            .statements()
            .iter()
            .filter(|s| s.as_str() == "ROLLBACK")
            .count();
        assert_eq!(rollbacks, 1);
    }

    #[test]
    fn test_failed_begin_returns_error() {
        let executor = ScriptedExecutor::new().fail_on("BEGIN", "connection reset");
        let result = Transaction::begin(&executor);
        assert!(result.is_err());
    }
}
