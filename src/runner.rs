//! Audit orchestration
//!
//! Walks indexes first, then foreign keys, one object at a time on a single
//! session. Size thresholds and access-method filtering happen here; the
//! verifiers only ever see objects they can check.

use crate::catalog::{self, ConstraintDescriptor, IndexDescriptor};
use crate::executor::{GuardError, GuardExecutor};
use crate::verify::{
    CheckReport, CheckedObject, ForeignKeyVerifier, IndexVerifier, Outcome, SkipReason, VerifyOptions,
};
use std::ops::ControlFlow;

/// Audit-wide settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditOptions {
    pub stop_on_failure: bool,
    pub inspect_plan: bool,
    /// Skip objects whose table is this many bytes or larger; 0 checks everything
    pub threshold_bytes: u64,
    /// Restrict the audit to one table (`regclass` syntax)
    pub table: Option<String>,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            stop_on_failure: false,
            inspect_plan: true,
            threshold_bytes: 0,
            table: None,
        }
    }
}

impl AuditOptions {
    fn verify_options(&self) -> VerifyOptions {
        VerifyOptions {
            stop_on_failure: self.stop_on_failure,
            inspect_plan: self.inspect_plan,
        }
    }

    fn above_threshold(&self, table_size: i64) -> Option<SkipReason> {
        if self.threshold_bytes == 0 {
            return None;
        }
        let size = u64::try_from(table_size).unwrap_or(0);
        (size >= self.threshold_bytes).then_some(SkipReason::AboveThreshold {
            table_size,
            threshold: self.threshold_bytes,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditPhase {
    Indexes,
    ForeignKeys,
}

/// Receives progress as the audit runs
pub trait AuditListener {
    fn phase_started(&mut self, _phase: AuditPhase) {}

    fn phase_finished(&mut self, _phase: AuditPhase) {}

    fn report(&mut self, report: &CheckReport);
}

/// Listener that ignores everything
pub struct SilentListener;

impl AuditListener for SilentListener {
    fn report(&mut self, _report: &CheckReport) {}
}

/// Every report produced by one audit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditSummary {
    pub reports: Vec<CheckReport>,
    /// Stop-on-failure cut the audit short
    pub halted: bool,
}

impl AuditSummary {
    pub fn failures(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_failure()).count()
    }

    pub fn skipped(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_skipped()).count()
    }

    pub fn checked(&self) -> usize {
        self.reports.len() - self.skipped()
    }

    pub fn has_failures(&self) -> bool {
        self.failures() > 0
    }

    /// Process exit status: 0 when nothing was found, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        i32::from(self.has_failures())
    }

    fn record(&mut self, report: CheckReport, listener: &mut dyn AuditListener) {
        listener.report(&report);
        self.reports.push(report);
    }
}

/// Runs the whole audit over one executor
///
/// # Examples
///
/// ```no_run
/// use indexguard::{connect, AuditOptions, AuditRunner, GuardError, MayPostgresExecutor, SilentListener};
///
/// # fn main() -> Result<(), GuardError> {
/// # let client = connect("host=localhost dbname=mydb")
/// #     .map_err(|e| GuardError::Other(format!("Connection error: {e}")))?;
/// let executor = MayPostgresExecutor::new(client);
/// let runner = AuditRunner::new(&executor, AuditOptions::default());
/// let summary = runner.run(&mut SilentListener)?;
/// std::process::exit(summary.exit_code());
/// # }
/// ```
pub struct AuditRunner<'a> {
    executor: &'a dyn GuardExecutor,
    options: AuditOptions,
}

impl<'a> AuditRunner<'a> {
    pub fn new(executor: &'a dyn GuardExecutor, options: AuditOptions) -> Self {
        Self { executor, options }
    }

    /// Enumerate objects from the catalog and check them
    ///
    /// Foreign keys are only enumerated once the index phase finished without halting.
    ///
    /// # Errors
    ///
    /// Returns `GuardError` if a catalog query fails. Per-object failures are
    /// reported in the summary instead.
    pub fn run(&self, listener: &mut dyn AuditListener) -> Result<AuditSummary, GuardError> {
        let table = self.options.table.as_deref();
        let mut summary = AuditSummary::default();

        let indexes = catalog::fetch_indexes(self.executor, table)?;
        if self.check_indexes(&indexes, listener, &mut summary).is_break() {
            return Ok(summary);
        }

        let constraints = catalog::fetch_foreign_keys(self.executor, table)?;
        let _ = self.check_foreign_keys(&constraints, listener, &mut summary);
        Ok(summary)
    }

    /// Check already enumerated objects
    pub fn run_descriptors(
        &self,
        indexes: &[IndexDescriptor],
        constraints: &[ConstraintDescriptor],
        listener: &mut dyn AuditListener,
    ) -> AuditSummary {
        let mut summary = AuditSummary::default();
        if self.check_indexes(indexes, listener, &mut summary).is_continue() {
            let _ = self.check_foreign_keys(constraints, listener, &mut summary);
        }
        summary
    }

    fn check_indexes(
        &self,
        indexes: &[IndexDescriptor],
        listener: &mut dyn AuditListener,
        summary: &mut AuditSummary,
    ) -> ControlFlow<()> {
        listener.phase_started(AuditPhase::Indexes);
        let verifier = IndexVerifier::new(self.executor, self.options.verify_options());

        for index in indexes {
            let skip = self.options.above_threshold(index.table_size).or_else(|| {
                (!index.is_btree()).then(|| SkipReason::NotBtree {
                    access_method: index.access_method.clone(),
                })
            });
            if let Some(reason) = skip {
                log::debug!("Table: {} - Index: {}, skipped: {reason:?}", index.table, index.index_name);
                summary.record(
                    CheckReport::new(CheckedObject::index(index, None), Outcome::Skipped(reason)),
                    listener,
                );
                continue;
            }

            if let ControlFlow::Break(()) = Self::record_flow(verifier.verify(index), listener, summary) {
                return ControlFlow::Break(());
            }
        }

        listener.phase_finished(AuditPhase::Indexes);
        ControlFlow::Continue(())
    }

    fn check_foreign_keys(
        &self,
        constraints: &[ConstraintDescriptor],
        listener: &mut dyn AuditListener,
        summary: &mut AuditSummary,
    ) -> ControlFlow<()> {
        listener.phase_started(AuditPhase::ForeignKeys);
        let verifier = ForeignKeyVerifier::new(self.executor, self.options.verify_options());

        for constraint in constraints {
            if let Some(reason) = self.options.above_threshold(constraint.table_size) {
                log::debug!(
                    "Table: {} - Constraint: {}, skipped: {reason:?}",
                    constraint.table,
                    constraint.constraint_name
                );
                summary.record(
                    CheckReport::new(CheckedObject::foreign_key(constraint, None), Outcome::Skipped(reason)),
                    listener,
                );
                continue;
            }

            if let ControlFlow::Break(()) = Self::record_flow(verifier.verify(constraint), listener, summary) {
                return ControlFlow::Break(());
            }
        }

        listener.phase_finished(AuditPhase::ForeignKeys);
        ControlFlow::Continue(())
    }

    fn record_flow(
        flow: ControlFlow<CheckReport, CheckReport>,
        listener: &mut dyn AuditListener,
        summary: &mut AuditSummary,
    ) -> ControlFlow<()> {
        match flow {
            ControlFlow::Continue(report) => {
                summary.record(report, listener);
                ControlFlow::Continue(())
            }
            ControlFlow::Break(report) => {
                log::warn!("stopping audit after failure on {}", report.object.name());
                summary.record(report, listener);
                summary.halted = true;
                ControlFlow::Break(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_inspect_plan() {
        let options = AuditOptions::default();
        assert!(options.inspect_plan);
        assert!(!options.stop_on_failure);
        assert_eq!(options, crate::AuditConfig::default().audit_options());
    }

    #[test]
    fn test_threshold_zero_is_unlimited() {
        let options = AuditOptions::default();
        assert_eq!(options.above_threshold(i64::MAX), None);
    }

    #[test]
    fn test_threshold_is_exclusive_upper_bound() {
        let options = AuditOptions {
            threshold_bytes: 8192,
            ..AuditOptions::default()
        };
        assert_eq!(options.above_threshold(8191), None);
        assert_eq!(
            options.above_threshold(8192),
            Some(SkipReason::AboveThreshold {
                table_size: 8192,
                threshold: 8192
            })
        );
    }

    #[test]
    fn test_empty_summary_exit_code() {
        let summary = AuditSummary::default();
        assert_eq!(summary.exit_code(), 0);
        assert_eq!(summary.checked(), 0);
        assert!(!summary.halted);
    }
}
