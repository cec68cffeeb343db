//! `tracing` span helpers for database operations.
//!
//! Only compiled with the `tracing` feature. Spans carry a truncated copy of the
//! statement so long verification queries stay readable in span output.

use tracing::Span;

const STATEMENT_PREVIEW_CHARS: usize = 120;

fn preview(query: &str) -> String {
    let flattened: String = query.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() > STATEMENT_PREVIEW_CHARS {
        let mut out: String = flattened.chars().take(STATEMENT_PREVIEW_CHARS).collect();
        out.push('…');
        out
    } else {
        flattened
    }
}

pub fn execute_query_span(query: &str) -> Span {
    tracing::debug_span!("db.query", statement = %preview(query))
}

pub fn begin_transaction_span() -> Span {
    tracing::debug_span!("db.transaction.begin")
}

pub fn rollback_transaction_span() -> Span {
    tracing::debug_span!("db.transaction.rollback")
}

pub fn acquire_connection_span() -> Span {
    tracing::info_span!("db.connect")
}

pub fn verify_object_span(kind: &'static str, name: &str) -> Span {
    tracing::info_span!("audit.verify", kind, object = %name)
}
