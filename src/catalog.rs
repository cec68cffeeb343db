//! Catalog enumeration
//!
//! Reads the objects to audit from the system catalogs. Descriptors are plain
//! snapshots: verifiers re-derive everything they need from the rendered
//! definition strings.

use crate::executor::{GuardError, GuardExecutor};
use may_postgres::Row;
use std::fmt;

/// Access method name of B-tree indexes in `pg_am`
pub const BTREE_ACCESS_METHOD: &str = "btree";

/// A schema-qualified relation name, as stored in the catalog (unquoted)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub schema: String,
    pub name: String,
}

impl QualifiedName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// `"schema"."name"`, safe to splice into statement text
    #[must_use]
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Quote an identifier, doubling embedded double quotes
#[must_use]
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// One index as reported by `pg_index`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub table: QualifiedName,
    pub index_name: String,
    /// `pg_index.indkey` as text (`0` entries are expression columns)
    pub indkey: String,
    pub is_unique: bool,
    pub access_method: String,
    /// Heap size in bytes
    pub table_size: i64,
    /// `pg_get_indexdef(indexrelid, 0, true)`
    pub definition: String,
}

impl IndexDescriptor {
    pub fn is_btree(&self) -> bool {
        self.access_method == BTREE_ACCESS_METHOD
    }
}

/// One foreign key constraint as reported by `pg_constraint`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintDescriptor {
    pub table: QualifiedName,
    pub constraint_name: String,
    /// `pg_get_constraintdef(oid, true)`
    pub definition: String,
    pub table_size: i64,
}

const INDEX_QUERY: &str = r"
    SELECT
        pgn.nspname::text AS table_schema,
        pgct.relname::text AS table_name,
        pgci.relname::text AS index_name,
        pgi.indkey::text AS indkey,
        pgi.indisunique AS indisunique,
        pga.amname::text AS index_type,
        pg_relation_size(pgct.oid::regclass) AS table_size,
        pg_catalog.pg_get_indexdef(pgi.indexrelid, 0, true) AS index_definition
    FROM
        pg_index pgi
        INNER JOIN pg_class pgct ON pgct.oid = pgi.indrelid
        INNER JOIN pg_class pgci ON pgci.oid = pgi.indexrelid
        INNER JOIN pg_namespace pgn ON pgn.oid = pgct.relnamespace
        INNER JOIN pg_am pga ON pga.oid = pgci.relam
    WHERE
        pgn.nspname !~ '^(pg_.*|information_schema)$'
        AND ($1::text IS NULL OR pgct.oid = $1::text::regclass)
    ORDER BY table_name, index_name";

const FOREIGN_KEY_QUERY: &str = r"
    SELECT
        n.nspname::text AS table_schema,
        c.relname::text AS table_name,
        co.conname::text AS constraint_name,
        pg_catalog.pg_get_constraintdef(co.oid, true) AS constraint_definition,
        pg_relation_size(c.oid::regclass) AS table_size
    FROM
        pg_catalog.pg_class c
        INNER JOIN pg_catalog.pg_constraint co ON co.conrelid = c.oid AND co.contype = 'f'
        LEFT JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    WHERE
        c.relkind IN ('r', 'p')
        AND n.nspname !~ '^(pg_.*|information_schema)$'
        AND ($1::text IS NULL OR c.oid = $1::text::regclass)
    ORDER BY 1, 2, 3";

/// List every index outside the system schemas, optionally limited to one table
///
/// `table_filter` accepts anything `regclass` accepts (`orders`, `sales.orders`).
///
/// # Errors
///
/// Returns `GuardError` if the catalog query fails or a row cannot be decoded.
pub fn fetch_indexes(
    executor: &dyn GuardExecutor,
    table_filter: Option<&str>,
) -> Result<Vec<IndexDescriptor>, GuardError> {
    let rows = executor.query_all(INDEX_QUERY, &[&table_filter])?;
    log::debug!("catalog returned {} index(es)", rows.len());
    rows.iter().map(index_from_row).collect()
}

/// List every foreign key constraint outside the system schemas, optionally limited to one table
///
/// # Errors
///
/// Returns `GuardError` if the catalog query fails or a row cannot be decoded.
pub fn fetch_foreign_keys(
    executor: &dyn GuardExecutor,
    table_filter: Option<&str>,
) -> Result<Vec<ConstraintDescriptor>, GuardError> {
    let rows = executor.query_all(FOREIGN_KEY_QUERY, &[&table_filter])?;
    log::debug!("catalog returned {} foreign key(s)", rows.len());
    rows.iter().map(constraint_from_row).collect()
}

fn index_from_row(row: &Row) -> Result<IndexDescriptor, GuardError> {
    Ok(IndexDescriptor {
        table: QualifiedName::new(
            row.try_get::<_, String>("table_schema")?,
            row.try_get::<_, String>("table_name")?,
        ),
        index_name: row.try_get("index_name")?,
        indkey: row.try_get("indkey")?,
        is_unique: row.try_get("indisunique")?,
        access_method: row.try_get("index_type")?,
        table_size: row.try_get("table_size")?,
        definition: row.try_get("index_definition")?,
    })
}

fn constraint_from_row(row: &Row) -> Result<ConstraintDescriptor, GuardError> {
    Ok(ConstraintDescriptor {
        table: QualifiedName::new(
            row.try_get::<_, String>("table_schema")?,
            row.try_get::<_, String>("table_name")?,
        ),
        constraint_name: row.try_get("constraint_name")?,
        definition: row.try_get("constraint_definition")?,
        table_size: row.try_get("table_size")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedExecutor;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_qualified_name_quoted_and_display() {
        let name = QualifiedName::new("public", "Order Items");
        assert_eq!(name.quoted(), "\"public\".\"Order Items\"");
        assert_eq!(name.to_string(), "public.Order Items");
    }

    #[test]
    fn test_is_btree() {
        let mut index = IndexDescriptor {
            table: QualifiedName::new("public", "users"),
            index_name: "users_pkey".to_string(),
            indkey: "1".to_string(),
            is_unique: true,
            access_method: "btree".to_string(),
            table_size: 8192,
            definition: "CREATE UNIQUE INDEX users_pkey ON public.users USING btree (id)".to_string(),
        };
        assert!(index.is_btree());
        index.access_method = "gin".to_string();
        assert!(!index.is_btree());
    }

    #[test]
    fn test_fetch_queries_exclude_system_schemas() {
        let executor = ScriptedExecutor::new();
        assert!(fetch_indexes(&executor, None).unwrap().is_empty());
        assert!(fetch_foreign_keys(&executor, Some("public.orders")).unwrap().is_empty());

        let statements = executor.statements();
        assert_eq!(statements.len(), 2);
        assert!(statements
            .iter()
            .all(|s| s.contains("'^(pg_.*|information_schema)$'")));
        assert!(statements[0].contains("pg_get_indexdef"));
        assert!(statements[1].contains("contype = 'f'"));
    }

    #[test]
    fn test_fetch_propagates_query_errors() {
        let executor = ScriptedExecutor::new().fail_on("pg_index", "permission denied");
        assert!(fetch_indexes(&executor, None).is_err());
    }
}
