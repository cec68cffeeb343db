//! # Indexguard
//!
//! Read-only consistency auditor for PostgreSQL, built on `may_postgres`.
//!
//! For every B-tree index the auditor checksums the indexed expressions twice,
//! once with index scans disabled and once with them enabled, and compares the
//! results; declared-unique indexes are additionally checked for duplicate keys.
//! For every foreign key it counts referencing rows whose referenced row is
//! missing. Nothing is ever written: each index check runs in a snapshot that is
//! rolled back.
//!
//! ```no_run
//! use indexguard::{connect, AuditConfig, AuditRunner, MayPostgresExecutor, SilentListener};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuditConfig::load()?;
//! let executor = MayPostgresExecutor::new(connect(&config.database.connection_string())?);
//! let summary = AuditRunner::new(&executor, config.audit_options()).run(&mut SilentListener)?;
//! println!("{} failures", summary.failures());
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod connection;
pub mod definition;
pub mod executor;
pub mod runner;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
pub mod transaction;
pub mod verify;

#[cfg(feature = "tracing")]
mod tracing_helpers;

pub use config::AuditConfig;
pub use connection::{connect, ConnectionError, ConnectionParams};
pub use executor::{GuardError, GuardExecutor, MayPostgresExecutor};
pub use runner::{AuditListener, AuditOptions, AuditPhase, AuditRunner, AuditSummary, SilentListener};
pub use verify::{CheckReport, CheckedObject, Outcome, PlanUsage, SkipReason};
