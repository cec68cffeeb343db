//! Property tests for the definition scanners over generated, engine-shaped definitions

use indexguard::definition::{
    parse_foreign_key_definition, parse_index_definition, strip_operator_classes, MalformedReason,
};
use proptest::prelude::*;

fn identifier() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,10}".prop_filter("reserved word", |s| {
        !matches!(s.as_str(), "where" | "references" | "collate" | "include" | "with")
    })
}

/// A key expression and how PostgreSQL may decorate it in an index definition
fn key_element() -> impl Strategy<Value = (String, String)> {
    let expression = prop_oneof![
        identifier(),
        identifier().prop_map(|c| format!("lower({c})")),
        (identifier(), identifier()).prop_map(|(a, b)| format!("COALESCE({a}, {b})")),
    ];
    let opclass = prop_oneof![
        Just(String::new()),
        Just(" text_pattern_ops".to_string()),
        Just(" varchar_pattern_ops".to_string()),
    ];
    let ordering = prop_oneof![
        Just(String::new()),
        Just(" DESC".to_string()),
        Just(" ASC NULLS FIRST".to_string()),
        Just(" DESC NULLS LAST".to_string()),
    ];
    (expression, opclass, ordering).prop_map(|(expr, opclass, ordering)| {
        let rendered = format!("{expr}{opclass}{ordering}");
        (expr, rendered)
    })
}

fn index_definition() -> impl Strategy<Value = (String, Vec<String>, Option<String>)> {
    (
        any::<bool>(),
        identifier(),
        identifier(),
        prop::collection::vec(key_element(), 1..5),
        prop::option::of(identifier().prop_map(|c| format!("({c} IS NOT NULL)"))),
    )
        .prop_map(|(unique, name, table, elements, predicate)| {
            let (expected, rendered): (Vec<String>, Vec<String>) = elements.into_iter().unzip();
            let mut definition = format!(
                "CREATE {}INDEX {name} ON public.{table} USING btree ({})",
                if unique { "UNIQUE " } else { "" },
                rendered.join(", ")
            );
            if let Some(predicate) = &predicate {
                definition.push_str(" WHERE ");
                definition.push_str(predicate);
            }
            (definition, expected, predicate)
        })
}

fn foreign_key_definition() -> impl Strategy<Value = (String, Vec<String>, String, Vec<String>)> {
    (1usize..5)
        .prop_flat_map(|n| {
            (
                prop::collection::vec(identifier(), n),
                identifier(),
                prop::collection::vec(identifier(), n),
                prop_oneof![
                    Just(""),
                    Just(" ON DELETE CASCADE"),
                    Just(" ON UPDATE SET NULL ON DELETE RESTRICT"),
                    Just(" MATCH FULL DEFERRABLE INITIALLY DEFERRED"),
                    Just(" NOT VALID"),
                ],
            )
        })
        .prop_map(|(origin, table, destination, trailing)| {
            let definition = format!(
                "FOREIGN KEY ({}) REFERENCES {table}({}){trailing}",
                origin.join(", "),
                destination.join(", ")
            );
            (definition, origin, table, destination)
        })
}

proptest! {
    #[test]
    fn index_definition_yields_keys_and_predicate((definition, expected, predicate) in index_definition()) {
        let spec = parse_index_definition(&definition).unwrap();
        prop_assert_eq!(&spec.column_expressions, &expected);
        match predicate {
            Some(p) => prop_assert_eq!(spec.filter_predicate, format!("WHERE {p}")),
            None => prop_assert_eq!(spec.filter_predicate, ""),
        }
    }

    #[test]
    fn stripped_list_is_a_fixed_point((definition, expected, _predicate) in index_definition()) {
        let spec = parse_index_definition(&definition).unwrap();
        let stripped = strip_operator_classes(&spec.raw_column_definition);
        prop_assert_eq!(&stripped, &expected.join(", "));
        prop_assert_eq!(strip_operator_classes(&stripped), stripped);
    }

    #[test]
    fn foreign_key_column_lists_have_equal_length(
        (definition, origin, table, destination) in foreign_key_definition()
    ) {
        let spec = parse_foreign_key_definition(&definition).unwrap();
        prop_assert_eq!(spec.origin_columns.len(), spec.destination_columns.len());
        prop_assert_eq!(spec.origin_columns, origin);
        prop_assert_eq!(spec.destination_table, table);
        prop_assert_eq!(spec.destination_columns, destination);
    }

    #[test]
    fn extra_open_paren_is_unbalanced((definition, _expected, _predicate) in index_definition()) {
        let err = parse_index_definition(&format!("{definition} (")).unwrap_err();
        prop_assert_eq!(err.reason(), &MalformedReason::UnbalancedParentheses);
    }

    #[test]
    fn truncated_foreign_key_is_unbalanced((definition, _o, _t, _d) in foreign_key_definition()) {
        // drop everything from the closing paren of the referenced column list
        let cut = definition.rfind(')').unwrap();
        let err = parse_foreign_key_definition(&definition[..cut]).unwrap_err();
        prop_assert_eq!(err.reason(), &MalformedReason::UnbalancedParentheses);

        let err = parse_foreign_key_definition(&format!("{definition} (")).unwrap_err();
        prop_assert_eq!(err.reason(), &MalformedReason::UnbalancedParentheses);
    }
}
