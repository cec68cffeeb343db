//! Index/table agreement check

use super::outcome::{CheckReport, CheckedObject, Outcome, PlanUsage};
use super::{sql, VerifyOptions};
use crate::catalog::IndexDescriptor;
use crate::definition::{parse_index_definition, ParsedIndexSpec};
use crate::executor::{GuardError, GuardExecutor};
use crate::transaction::Transaction;
use std::ops::ControlFlow;

#[cfg(feature = "tracing")]
use crate::tracing_helpers;

/// Compares a forced table-scan checksum with an index-driven one
///
/// Protocol, all inside one repeatable-read snapshot that is rolled back:
///
/// 1. index scans off → checksum (`S_table`)
/// 2. index scans on → optional `EXPLAIN`, checksum (`S_index`)
/// 3. unique indexes whose checksums agree: index scans off → duplicate-key count
pub struct IndexVerifier<'a> {
    executor: &'a dyn GuardExecutor,
    options: VerifyOptions,
}

impl<'a> IndexVerifier<'a> {
    pub fn new(executor: &'a dyn GuardExecutor, options: VerifyOptions) -> Self {
        Self { executor, options }
    }

    /// Check one B-tree index
    ///
    /// Returns `Break` when the outcome is a failure and stop-on-failure is set.
    pub fn verify(&self, index: &IndexDescriptor) -> ControlFlow<CheckReport, CheckReport> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::verify_object_span("index", &index.index_name).entered();

        self.check(index).into_flow(self.options.stop_on_failure)
    }

    fn check(&self, index: &IndexDescriptor) -> CheckReport {
        let spec = match parse_index_definition(&index.definition) {
            Ok(spec) => spec,
            Err(e) => {
                log::error!("{}: {e}", index.index_name);
                return CheckReport::new(CheckedObject::index(index, None), Outcome::ParseError(e.to_string()));
            }
        };

        let columns = spec.column_list();
        log::debug!(
            "Table: {} - Index: {} - Columns: {columns}, comparing data...",
            index.table,
            index.index_name
        );
        let object = CheckedObject::index(index, Some(columns));

        match self.compare(index, &spec) {
            Ok((outcome, plan_usage)) => {
                log::debug!("{}: {}", index.index_name, outcome.label());
                CheckReport {
                    object,
                    outcome,
                    plan_usage,
                }
            }
            Err(e) => {
                log::error!("{}: verification query failed: {e}", index.index_name);
                CheckReport::new(object, Outcome::QueryError(e.to_string()))
            }
        }
    }

    fn compare(
        &self,
        index: &IndexDescriptor,
        spec: &ParsedIndexSpec,
    ) -> Result<(Outcome, Option<PlanUsage>), GuardError> {
        let checksum_sql = sql::checksum_query(&index.table, spec);
        let txn = Transaction::begin(self.executor)?;

        txn.set_index_scans(false)?;
        let table_checksum = txn.query_numeric(&checksum_sql)?;

        txn.set_index_scans(true)?;
        let plan_usage = if self.options.inspect_plan {
            Some(Self::inspect_plan(&txn, &checksum_sql, &index.index_name)?)
        } else {
            None
        };
        let index_checksum = txn.query_numeric(&checksum_sql)?;

        let outcome = if table_checksum != index_checksum {
            Outcome::Mismatch {
                table_checksum,
                index_checksum,
            }
        } else if index.is_unique {
            txn.set_index_scans(false)?;
            let groups = txn.query_count(&sql::duplicate_key_query(&index.table, spec))?;
            if groups == 0 {
                Outcome::Clean
            } else {
                Outcome::DuplicatesFound { groups }
            }
        } else {
            Outcome::Match
        };

        txn.rollback()?;
        Ok((outcome, plan_usage))
    }

    fn inspect_plan(txn: &Transaction<'_>, checksum_sql: &str, index_name: &str) -> Result<PlanUsage, GuardError> {
        let plan = txn.query_text_lines(&sql::explain(checksum_sql))?;
        if sql::plan_uses_index(&plan, index_name) {
            Ok(PlanUsage::IndexScan)
        } else {
            log::warn!(
                "planner did not choose {index_name} for the index-side checksum; the comparison does not exercise the index"
            );
            Ok(PlanUsage::NotChosen)
        }
    }
}
