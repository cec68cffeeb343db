//! Terminal states of a single object check

use crate::catalog::{ConstraintDescriptor, IndexDescriptor, QualifiedName};
use crate::definition::ParsedForeignKeySpec;
use rust_decimal::Decimal;
use std::ops::ControlFlow;

/// Why an object was not verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Only B-tree indexes can be compared against a table scan
    NotBtree { access_method: String },
    /// Owning table is at or above the configured size threshold
    AboveThreshold { table_size: i64, threshold: u64 },
}

/// Whether the planner actually read the index for the index-side checksum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanUsage {
    IndexScan,
    /// The planner preferred another path; the comparison did not exercise the index
    NotChosen,
}

/// Result of checking one index or constraint
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Index and table checksums agree (non-unique index)
    Match,
    /// Index and table checksums differ
    Mismatch {
        table_checksum: Option<Decimal>,
        index_checksum: Option<Decimal>,
    },
    /// Unique index without duplicate keys, or foreign key without dangling rows
    Clean,
    /// Number of key groups that occur more than once under a unique index
    DuplicatesFound { groups: i64 },
    /// Number of referencing rows whose referenced row does not exist
    MissingReferences { rows: i64 },
    /// The definition could not be parsed
    ParseError(String),
    /// A verification statement failed
    QueryError(String),
    Skipped(SkipReason),
}

impl Outcome {
    /// Findings and per-object errors; these set a non-zero exit status
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Outcome::Mismatch { .. }
                | Outcome::DuplicatesFound { .. }
                | Outcome::MissingReferences { .. }
                | Outcome::ParseError(_)
                | Outcome::QueryError(_)
        )
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }

    /// Short stable label, used in logs
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Match => "match",
            Outcome::Mismatch { .. } => "mismatch",
            Outcome::Clean => "clean",
            Outcome::DuplicatesFound { .. } => "duplicates_found",
            Outcome::MissingReferences { .. } => "missing_references",
            Outcome::ParseError(_) => "parse_error",
            Outcome::QueryError(_) => "query_error",
            Outcome::Skipped(_) => "skipped",
        }
    }
}

/// The object a report is about, with whatever the parser could extract from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckedObject {
    Index {
        table: QualifiedName,
        index_name: String,
        /// Stripped key list; `None` when the definition did not parse or was not read
        columns: Option<String>,
    },
    ForeignKey {
        table: QualifiedName,
        constraint_name: String,
        spec: Option<ParsedForeignKeySpec>,
    },
}

impl CheckedObject {
    pub fn index(index: &IndexDescriptor, columns: Option<String>) -> Self {
        CheckedObject::Index {
            table: index.table.clone(),
            index_name: index.index_name.clone(),
            columns,
        }
    }

    pub fn foreign_key(constraint: &ConstraintDescriptor, spec: Option<ParsedForeignKeySpec>) -> Self {
        CheckedObject::ForeignKey {
            table: constraint.table.clone(),
            constraint_name: constraint.constraint_name.clone(),
            spec,
        }
    }

    pub fn table(&self) -> &QualifiedName {
        match self {
            CheckedObject::Index { table, .. } | CheckedObject::ForeignKey { table, .. } => table,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CheckedObject::Index { index_name, .. } => index_name,
            CheckedObject::ForeignKey { constraint_name, .. } => constraint_name,
        }
    }
}

/// One line of audit output
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub object: CheckedObject,
    pub outcome: Outcome,
    /// Only set for indexes whose plan was inspected
    pub plan_usage: Option<PlanUsage>,
}

impl CheckReport {
    pub fn new(object: CheckedObject, outcome: Outcome) -> Self {
        Self {
            object,
            outcome,
            plan_usage: None,
        }
    }

    /// `Break` when this report must halt the audit
    pub fn into_flow(self, stop_on_failure: bool) -> ControlFlow<CheckReport, CheckReport> {
        if stop_on_failure && self.outcome.is_failure() {
            ControlFlow::Break(self)
        } else {
            ControlFlow::Continue(self)
        }
    }
}
