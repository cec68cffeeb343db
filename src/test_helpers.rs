//! Test helpers
//!
//! `ScriptedExecutor` records every statement it receives and answers scalar
//! queries from queues filled by the test. It cannot produce `may_postgres::Row`
//! values, so `query_all` always yields an empty result.

use crate::executor::{GuardError, GuardExecutor};
use may_postgres::types::ToSql;
use may_postgres::Row;
use rust_decimal::Decimal;
use std::cell::RefCell;
use std::collections::VecDeque;

#[derive(Default)]
pub struct ScriptedExecutor {
    statements: RefCell<Vec<String>>,
    numerics: RefCell<VecDeque<Option<Decimal>>>,
    counts: RefCell<VecDeque<i64>>,
    plans: RefCell<VecDeque<Vec<String>>>,
    failures: Vec<(String, String)>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next `query_numeric` call
    #[must_use]
    pub fn with_checksum(self, value: Option<i64>) -> Self {
        self.numerics.borrow_mut().push_back(value.map(Decimal::from));
        self
    }

    /// Queue the result of the next `query_count` call
    #[must_use]
    pub fn with_count(self, value: i64) -> Self {
        self.counts.borrow_mut().push_back(value);
        self
    }

    /// Queue the lines returned by the next `query_text_lines` call
    #[must_use]
    pub fn with_plan(self, lines: &[&str]) -> Self {
        self.plans
            .borrow_mut()
            .push_back(lines.iter().map(|l| (*l).to_string()).collect());
        self
    }

    /// Fail every statement containing `pattern` with a query error
    #[must_use]
    pub fn fail_on(mut self, pattern: &str, message: &str) -> Self {
        self.failures.push((pattern.to_string(), message.to_string()));
        self
    }

    /// Every statement received so far, in order
    pub fn statements(&self) -> Vec<String> {
        self.statements.borrow().clone()
    }

    /// Statements containing `pattern`
    pub fn statements_containing(&self, pattern: &str) -> Vec<String> {
        self.statements
            .borrow()
            .iter()
            .filter(|s| s.contains(pattern))
            .cloned()
            .collect()
    }

    fn record(&self, query: &str) -> Result<(), GuardError> {
        self.statements.borrow_mut().push(query.to_string());
        match self.failures.iter().find(|(pattern, _)| query.contains(pattern.as_str())) {
            Some((_, message)) => Err(GuardError::Query(message.clone())),
            None => Ok(()),
        }
    }
}

impl GuardExecutor for ScriptedExecutor {
    fn execute(&self, query: &str, _params: &[&dyn ToSql]) -> Result<u64, GuardError> {
        self.record(query)?;
        Ok(0)
    }

    fn query_all(&self, query: &str, _params: &[&dyn ToSql]) -> Result<Vec<Row>, GuardError> {
        self.record(query)?;
        Ok(Vec::new())
    }

    fn query_numeric(&self, query: &str) -> Result<Option<Decimal>, GuardError> {
        self.record(query)?;
        self.numerics
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| GuardError::Other(format!("no scripted numeric result for: {query}")))
    }

    fn query_count(&self, query: &str) -> Result<i64, GuardError> {
        self.record(query)?;
        self.counts
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| GuardError::Other(format!("no scripted count result for: {query}")))
    }

    fn query_text_lines(&self, query: &str) -> Result<Vec<String>, GuardError> {
        self.record(query)?;
        Ok(self.plans.borrow_mut().pop_front().unwrap_or_default())
    }
}
