//! Consistency verifiers
//!
//! [`IndexVerifier`] compares what the table holds with what a B-tree index
//! returns; [`ForeignKeyVerifier`] looks for referencing rows without a
//! referenced row. Both report findings as [`Outcome`] values and never abort
//! the process: stop-on-failure is signalled through the returned
//! [`ControlFlow`](std::ops::ControlFlow).

mod foreign_key;
mod index;
mod outcome;
mod sql;

pub use foreign_key::ForeignKeyVerifier;
pub use index::IndexVerifier;
pub use outcome::{CheckReport, CheckedObject, Outcome, PlanUsage, SkipReason};

/// Flags threaded through every verifier call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Return `Break` on the first failure
    pub stop_on_failure: bool,
    /// `EXPLAIN` the index-side checksum and report whether the index was used
    pub inspect_plan: bool,
}
