//! Dangling reference check for foreign key constraints

use super::outcome::{CheckReport, CheckedObject, Outcome};
use super::{sql, VerifyOptions};
use crate::catalog::ConstraintDescriptor;
use crate::definition::parse_foreign_key_definition;
use crate::executor::GuardExecutor;
use std::ops::ControlFlow;

#[cfg(feature = "tracing")]
use crate::tracing_helpers;

/// Counts referencing rows whose referenced row is missing
pub struct ForeignKeyVerifier<'a> {
    executor: &'a dyn GuardExecutor,
    options: VerifyOptions,
}

impl<'a> ForeignKeyVerifier<'a> {
    pub fn new(executor: &'a dyn GuardExecutor, options: VerifyOptions) -> Self {
        Self { executor, options }
    }

    /// Check one foreign key constraint
    ///
    /// Returns `Break` when the outcome is a failure and stop-on-failure is set.
    pub fn verify(&self, constraint: &ConstraintDescriptor) -> ControlFlow<CheckReport, CheckReport> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::verify_object_span("foreign_key", &constraint.constraint_name).entered();

        self.check(constraint).into_flow(self.options.stop_on_failure)
    }

    fn check(&self, constraint: &ConstraintDescriptor) -> CheckReport {
        let spec = match parse_foreign_key_definition(&constraint.definition) {
            Ok(spec) => spec,
            Err(e) => {
                log::error!("{}: {e}", constraint.constraint_name);
                return CheckReport::new(
                    CheckedObject::foreign_key(constraint, None),
                    Outcome::ParseError(e.to_string()),
                );
            }
        };

        log::debug!(
            "Table: {} - Constraint: {} - Columns: {} - Referenced table: {} - Columns: {}. Checking...",
            constraint.table,
            constraint.constraint_name,
            spec.origin_columns.join(", "),
            spec.destination_table,
            spec.destination_columns.join(", ")
        );

        let outcome = match self
            .executor
            .query_count(&sql::dangling_reference_query(&constraint.table, &spec))
        {
            Ok(0) => Outcome::Clean,
            Ok(rows) => Outcome::MissingReferences { rows },
            Err(e) => {
                log::error!("{}: verification query failed: {e}", constraint.constraint_name);
                Outcome::QueryError(e.to_string())
            }
        };

        CheckReport::new(CheckedObject::foreign_key(constraint, Some(spec)), outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::QualifiedName;
    use crate::test_helpers::ScriptedExecutor;

    fn constraint(definition: &str) -> ConstraintDescriptor {
        ConstraintDescriptor {
            table: QualifiedName::new("public", "orders"),
            constraint_name: "fk_orders_user".to_string(),
            definition: definition.to_string(),
            table_size: 8192,
        }
    }

    const FK: &str = "FOREIGN KEY (user_id) REFERENCES users(id)";

    #[test]
    fn test_no_dangling_rows_is_clean() {
        let executor = ScriptedExecutor::new().with_count(0);
        let report = ForeignKeyVerifier::new(&executor, VerifyOptions::default())
            .verify(&constraint(FK))
            .continue_value()
            .unwrap();
        assert_eq!(report.outcome, Outcome::Clean);
        assert_eq!(executor.statements().len(), 1);
    }

    #[test]
    fn test_dangling_rows_are_missing_references() {
        let executor = ScriptedExecutor::new().with_count(2);
        let report = ForeignKeyVerifier::new(&executor, VerifyOptions::default())
            .verify(&constraint(FK))
            .continue_value()
            .unwrap();
        assert_eq!(report.outcome, Outcome::MissingReferences { rows: 2 });
        match report.object {
            CheckedObject::ForeignKey { spec: Some(spec), .. } => {
                assert_eq!(spec.destination_table, "users");
            }
            other => panic!("unexpected object {other:?}"),
        }
    }

    #[test]
    fn test_stop_on_failure_breaks() {
        let executor = ScriptedExecutor::new().with_count(3);
        let verifier = ForeignKeyVerifier::new(
            &executor,
            VerifyOptions {
                stop_on_failure: true,
                inspect_plan: false,
            },
        );
        assert!(verifier.verify(&constraint(FK)).is_break());
    }

    #[test]
    fn test_column_count_mismatch_is_parse_error() {
        let executor = ScriptedExecutor::new();
        let report = ForeignKeyVerifier::new(&executor, VerifyOptions::default())
            .verify(&constraint("FOREIGN KEY (a, b) REFERENCES t(x)"))
            .continue_value()
            .unwrap();
        assert!(matches!(report.outcome, Outcome::ParseError(_)));
        assert!(executor.statements().is_empty());
    }

    #[test]
    fn test_query_error_is_reported() {
        let executor = ScriptedExecutor::new().fail_on("LEFT JOIN", "relation \"users\" does not exist");
        let report = ForeignKeyVerifier::new(&executor, VerifyOptions::default())
            .verify(&constraint(FK))
            .continue_value()
            .unwrap();
        assert!(matches!(report.outcome, Outcome::QueryError(ref m) if m.contains("does not exist")));
    }
}
