//! Verification statement text.
//!
//! Identifiers and expressions come from the database's own catalog and
//! definition renderer, never from user input. Table names from the catalog are
//! quoted here; expressions and referenced tables are already rendered in
//! quoted form by PostgreSQL.

use crate::catalog::{quote_ident, QualifiedName};
use crate::definition::{ParsedForeignKeySpec, ParsedIndexSpec};

/// Order-independent checksum over the index key expressions
///
/// Each row contributes the first 32 bits of `md5(concat(<keys>))` read as an
/// unsigned integer. The `ORDER BY` on the key list is what lets the planner
/// satisfy the scan from the index once index scans are allowed again.
pub(crate) fn checksum_query(table: &QualifiedName, spec: &ParsedIndexSpec) -> String {
    let columns = spec.column_list();
    let filter = if spec.filter_predicate.is_empty() {
        String::new()
    } else {
        format!("\n        {}", spec.filter_predicate)
    };
    format!(
        "SELECT sum(('x' || substring(row_hash, 1, 8))::bit(32)::bigint)::numeric AS checksum
FROM (
    SELECT md5(concat({columns})) AS row_hash
    FROM {table}{filter}
    ORDER BY {columns}
) AS hashed_rows",
        table = table.quoted(),
    )
}

/// Number of key groups occurring more than once
///
/// Keys with a `NULL` part are left out unless the index was built
/// `NULLS NOT DISTINCT`; `GROUP BY` already puts equal `NULL`s together.
pub(crate) fn duplicate_key_query(table: &QualifiedName, spec: &ParsedIndexSpec) -> String {
    let mut conditions: Vec<String> = Vec::with_capacity(spec.column_expressions.len() + 1);
    if let Some(predicate) = spec.predicate() {
        conditions.push(format!("({predicate})"));
    }
    if !spec.nulls_not_distinct {
        conditions.extend(
            spec.column_expressions
                .iter()
                .map(|expr| format!("({expr}) IS NOT NULL")),
        );
    }
    let filter = if conditions.is_empty() {
        String::new()
    } else {
        format!("\n    WHERE {}", conditions.join(" AND "))
    };
    format!(
        "SELECT count(*) AS duplicate_groups
FROM (
    SELECT 1
    FROM {table}{filter}
    GROUP BY {columns}
    HAVING count(*) > 1
) AS duplicate_keys",
        table = table.quoted(),
        columns = spec.column_list(),
    )
}

/// Referencing rows with every key column set and no referenced row
///
/// The first referenced column is tested for `NULL`: after the join it is null
/// exactly when no referenced row matched, since every join column is non-null
/// on the referencing side.
pub(crate) fn dangling_reference_query(table: &QualifiedName, spec: &ParsedForeignKeySpec) -> String {
    let join = spec
        .column_pairs()
        .map(|(origin, destination)| format!("origin.{origin} = referenced.{destination}"))
        .collect::<Vec<_>>()
        .join(" AND ");
    let origin_not_null = spec
        .origin_columns
        .iter()
        .map(|origin| format!("origin.{origin} IS NOT NULL"))
        .collect::<Vec<_>>()
        .join(" AND ");
    let probe = &spec.destination_columns[0];
    format!(
        "SELECT count(*) AS missing_references
FROM {table} AS origin
LEFT JOIN {destination} AS referenced ON {join}
WHERE {origin_not_null}
    AND referenced.{probe} IS NULL",
        table = table.quoted(),
        destination = spec.destination_table,
    )
}

pub(crate) fn explain(query: &str) -> String {
    format!("EXPLAIN {query}")
}

/// Whether any `EXPLAIN` line reads `index_name` through an index, index-only or bitmap index scan
pub(crate) fn plan_uses_index(plan: &[String], index_name: &str) -> bool {
    let candidates = [index_name.to_string(), quote_ident(index_name)];
    plan.iter().any(|line| {
        if !line.contains("Index") {
            return false;
        }
        let padded = format!(" {} ", line.split_whitespace().collect::<Vec<_>>().join(" "));
        candidates.iter().any(|name| {
            padded.contains(&format!(" using {name} ")) || padded.contains(&format!(" Scan on {name} "))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{parse_foreign_key_definition, parse_index_definition};

    fn users() -> QualifiedName {
        QualifiedName::new("public", "users")
    }

    #[test]
    fn test_checksum_query_projection_and_order() {
        let spec = parse_index_definition("CREATE INDEX i ON public.users USING btree (lower(email), id DESC)").unwrap();
        let sql = checksum_query(&users(), &spec);
        assert!(sql.contains("md5(concat(lower(email), id))"));
        assert!(sql.contains("FROM \"public\".\"users\""));
        assert!(sql.contains("ORDER BY lower(email), id"));
        assert!(!sql.contains("WHERE"));
        assert!(!sql.contains("DESC"));
    }

    #[test]
    fn test_checksum_query_partial_index() {
        let spec = parse_index_definition("CREATE INDEX i ON public.users USING btree (a) WHERE (active)").unwrap();
        let sql = checksum_query(&users(), &spec);
        assert!(sql.contains("WHERE (active)"));
        assert!(sql.find("WHERE").unwrap() < sql.find("ORDER BY").unwrap());
    }

    #[test]
    fn test_duplicate_key_query() {
        let spec = parse_index_definition(
            "CREATE UNIQUE INDEX i ON public.users USING btree (tenant_id, lower(email) text_pattern_ops) WHERE (deleted_at IS NULL)",
        )
        .unwrap();
        let sql = duplicate_key_query(&users(), &spec);
        assert!(sql.contains(
            "WHERE ((deleted_at IS NULL)) AND (tenant_id) IS NOT NULL AND (lower(email)) IS NOT NULL"
        ));
        assert!(sql.contains("GROUP BY tenant_id, lower(email)"));
        assert!(sql.contains("HAVING count(*) > 1"));
    }

    #[test]
    fn test_duplicate_key_query_nulls_not_distinct_counts_null_keys() {
        let spec = parse_index_definition(
            "CREATE UNIQUE INDEX i ON public.users USING btree (tenant_id, external_ref) NULLS NOT DISTINCT",
        )
        .unwrap();
        let sql = duplicate_key_query(&users(), &spec);
        assert!(!sql.contains("IS NOT NULL"));
        assert!(!sql.contains("WHERE"));
        assert!(sql.contains("FROM \"public\".\"users\"\n    GROUP BY tenant_id, external_ref"));

        let partial = parse_index_definition(
            "CREATE UNIQUE INDEX i ON public.users USING btree (external_ref) NULLS NOT DISTINCT WHERE (active)",
        )
        .unwrap();
        let sql = duplicate_key_query(&users(), &partial);
        assert!(sql.contains("WHERE ((active))\n"));
        assert!(!sql.contains("IS NOT NULL"));
    }

    #[test]
    fn test_dangling_reference_query_joins_every_pair() {
        let spec = parse_foreign_key_definition("FOREIGN KEY (a, b) REFERENCES other_table(x, y)").unwrap();
        let sql = dangling_reference_query(&QualifiedName::new("public", "orders"), &spec);
        assert!(sql.contains("FROM \"public\".\"orders\" AS origin"));
        assert!(sql.contains("LEFT JOIN other_table AS referenced ON origin.a = referenced.x AND origin.b = referenced.y"));
        assert!(sql.contains("WHERE origin.a IS NOT NULL AND origin.b IS NOT NULL"));
        assert!(sql.contains("referenced.x IS NULL"));
        assert!(!sql.contains(".id"));
    }

    #[test]
    fn test_plan_uses_index() {
        let plan = vec![
            "Aggregate  (cost=0.29..45.31 rows=1 width=32)".to_string(),
            "  ->  Index Only Scan using idx_users_email on users  (cost=0.29..30.29 rows=1000 width=32)".to_string(),
        ];
        assert!(plan_uses_index(&plan, "idx_users_email"));
        assert!(!plan_uses_index(&plan, "idx_users"));

        let bitmap = vec!["        ->  Bitmap Index Scan on \"Idx Mixed\"  (cost=0.00..4.30 rows=10 width=0)".to_string()];
        assert!(plan_uses_index(&bitmap, "Idx Mixed"));

        let seq = vec![
            "Aggregate  (cost=80.00..80.01 rows=1 width=32)".to_string(),
            "  ->  Sort  (cost=69.83..72.33 rows=1000 width=36)".to_string(),
            "        ->  Seq Scan on users  (cost=0.00..20.00 rows=1000 width=36)".to_string(),
        ];
        assert!(!plan_uses_index(&seq, "idx_users_email"));
    }
}
