//! Console output
//!
//! One line per checked object, framed by the start/end banners of each phase.

use colored::Colorize;
use indexguard::{AuditListener, AuditPhase, AuditSummary, CheckReport, CheckedObject, Outcome, PlanUsage, SkipReason};
use std::fmt::Display;
use std::io::Write;

pub struct ConsoleReporter<W: Write> {
    out: W,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Closing summary line
    pub fn finish(&mut self, summary: &AuditSummary) {
        let mut line = format!(
            "Checked {} object(s), skipped {}, {} failure(s)",
            summary.checked(),
            summary.skipped(),
            summary.failures()
        );
        if summary.halted {
            line.push_str(" - stopped after first failure");
        }
        let line = if summary.has_failures() {
            line.red().bold().to_string()
        } else {
            line.green().to_string()
        };
        self.write_line(&line);
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{line}") {
            log::error!("failed to write report output: {e}");
        }
    }
}

impl<W: Write> AuditListener for ConsoleReporter<W> {
    fn phase_started(&mut self, phase: AuditPhase) {
        self.write_line(&format!("*** START OF {} TEST ***", phase_title(phase)));
        self.write_line("");
    }

    fn phase_finished(&mut self, phase: AuditPhase) {
        self.write_line("");
        self.write_line(&format!("*** END OF {} TEST ***", phase_title(phase)));
    }

    fn report(&mut self, report: &CheckReport) {
        let line = render(report);
        self.write_line(&line);
    }
}

fn phase_title(phase: AuditPhase) -> &'static str {
    match phase {
        AuditPhase::Indexes => "INDEX/TABLE CONSISTENCY",
        AuditPhase::ForeignKeys => "FOREIGN KEYS CONSISTENCY",
    }
}

fn ok(text: &str) -> String {
    format!("{text} - {}.", "OK".green().bold())
}

fn fail(text: &str) -> String {
    format!("{text} - {}.", "FAIL".red().bold())
}

/// Render one report in the `Table: ... - Index: ...` layout
pub fn render(report: &CheckReport) -> String {
    let mut line = match &report.object {
        CheckedObject::Index {
            table,
            index_name,
            columns,
        } => {
            let subject = format!("Table: {table} - Index: {index_name}");
            match (&report.outcome, columns) {
                (Outcome::Skipped(reason), _) => format!("{subject}, {}", skip_text(reason)),
                (Outcome::ParseError(message), _) => {
                    format!("{subject}, {} ({message})", fail("malformed definition"))
                }
                (outcome, Some(columns)) => {
                    format!("{subject} - Columns: {columns}, comparing data... {}", index_verdict(outcome))
                }
                (outcome, None) => format!("{subject}, comparing data... {}", index_verdict(outcome)),
            }
        }
        CheckedObject::ForeignKey {
            table,
            constraint_name,
            spec,
        } => {
            let subject = format!("Table: {table} - Constraint: {constraint_name}");
            match (&report.outcome, spec) {
                (Outcome::Skipped(reason), _) => format!("{subject}, {}", skip_text(reason)),
                (Outcome::ParseError(message), _) => {
                    format!("{subject}, {} ({message})", fail("malformed definition"))
                }
                (outcome, Some(spec)) => format!(
                    "{subject} - Columns: {} - Referenced table: {} - Columns: {}. Checking... {}",
                    spec.origin_columns.join(", "),
                    spec.destination_table,
                    spec.destination_columns.join(", "),
                    foreign_key_verdict(outcome)
                ),
                (outcome, None) => format!("{subject}. Checking... {}", foreign_key_verdict(outcome)),
            }
        }
    };

    if report.plan_usage == Some(PlanUsage::NotChosen) {
        line.push(' ');
        line.push_str(&"(planner did not use the index)".yellow().to_string());
    }
    line
}

fn skip_text(reason: &SkipReason) -> String {
    match reason {
        SkipReason::NotBtree { access_method } => format!("is not btree ({access_method}), can't check."),
        SkipReason::AboveThreshold { .. } => "above size threshold, won't check.".to_string(),
    }
}

fn index_verdict(outcome: &Outcome) -> String {
    const UNIQUENESS: &str = "Index is unique or a PK, testing uniqueness...";
    match outcome {
        Outcome::Match => ok("index and table match"),
        Outcome::Clean => format!(
            "{} {UNIQUENESS} {}",
            ok("index and table match"),
            ok("no duplicate entries")
        ),
        Outcome::DuplicatesFound { groups } => format!(
            "{} {UNIQUENESS} {} ({groups} duplicated key(s))",
            ok("index and table match"),
            fail("duplicate entries found")
        ),
        Outcome::Mismatch {
            table_checksum,
            index_checksum,
        } => format!(
            "{} (table checksum {}, index checksum {})",
            fail("index and table don't match"),
            checksum_text(table_checksum.as_ref()),
            checksum_text(index_checksum.as_ref())
        ),
        Outcome::QueryError(message) => format!("{} ({message})", fail("query failed")),
        Outcome::MissingReferences { .. } | Outcome::ParseError(_) | Outcome::Skipped(_) => {
            outcome.label().to_string()
        }
    }
}

fn foreign_key_verdict(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Clean => ok("no missing entries in referenced table"),
        Outcome::MissingReferences { rows } => format!(
            "{} ({rows} row(s))",
            fail("missing entries in referenced table")
        ),
        Outcome::QueryError(message) => format!("{} ({message})", fail("query failed")),
        other => other.label().to_string(),
    }
}

fn checksum_text<T: Display>(checksum: Option<&T>) -> String {
    checksum.map_or_else(|| "NULL".to_string(), ToString::to_string)
}
