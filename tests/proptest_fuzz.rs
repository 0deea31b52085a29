//! Property-based tests (fuzzing) for the criteria builders.
//!
//! Uses proptest to generate random criteria, paging windows and payloads
//! and verify the builders never panic and keep their invariants.
//!
//! Run with: `cargo test --test proptest_fuzz`

use std::collections::HashMap;

use indexmap::IndexMap;
use proptest::prelude::*;
use serde_json::Value;

use criteria_engine::document::{build_filter, build_pipeline, effective_pagination, Stage};
use criteria_engine::relational::{build_query_filters, translate_sort, RelatedEntity, RelationshipMap};
use criteria_engine::result::{page_number, total_pages};
use criteria_engine::{
    Criterion, DocumentSearchPayload, Operator, Pagination, RelationalSearchPayload, SearchConfig,
    SearchResult, SortOrder, SortSpec,
};

// =============================================================================
// Strategies for generating test data
// =============================================================================

fn operator_strategy() -> impl Strategy<Value = Operator> {
    prop::sample::select(Operator::ALL.to_vec())
}

/// Dotted paths over a small vocabulary so prefixes collide often
fn known_field_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(vec!["profile", "address", "name", "age"]), 1..4)
        .prop_map(|segments| segments.join("."))
}

fn criterion_strategy() -> impl Strategy<Value = Criterion> {
    (
        known_field_strategy(),
        operator_strategy(),
        prop::collection::vec("[a-z0-9]{0,6}", 0..4),
        prop::option::of(any::<bool>()),
    )
        .prop_map(|(field, operator, values, required)| Criterion {
            field,
            operator,
            value: values,
            required,
        })
}

fn relationships() -> RelationshipMap {
    let mut map = RelationshipMap::new();
    map.insert("profile".into(), RelatedEntity::new("profiles", "profile_id", "id"));
    map.insert("address".into(), RelatedEntity::new("addresses", "address_id", "id"));
    map
}

// =============================================================================
// Page math
// =============================================================================

proptest! {
    /// totalPages is the smallest page count covering every item
    #[test]
    fn prop_total_pages_covers_total(total in 0u64..1_000_000, count in 1u64..1000) {
        let pages = total_pages(total, count);
        prop_assert!(pages * count >= total);
        if pages > 0 {
            prop_assert!((pages - 1) * count < total);
        } else {
            prop_assert_eq!(total, 0);
        }
    }

    /// Page numbers are 1-based and consistent with the offset
    #[test]
    fn prop_page_number_contains_offset(offset in 0u64..1_000_000, count in 1u64..1000) {
        let page = page_number(offset, count);
        prop_assert!(page >= 1);
        prop_assert!((page - 1) * count <= offset);
        prop_assert!(offset < page * count);
    }

    /// Assembly never panics on arbitrary (possibly negative) paging
    #[test]
    fn prop_assemble_total(
        total in any::<u64>(),
        limit in prop::option::of(any::<i64>()),
        offset in prop::option::of(any::<i64>()),
    ) {
        let raw = criteria_engine::RawPage::<u8> { items: vec![], total };
        let result = SearchResult::assemble(raw, &Pagination { limit, offset }, 10);
        prop_assert!(result.page >= 1);
        if result.count == 0 {
            prop_assert_eq!(result.total_pages, 0);
        }
    }
}

// =============================================================================
// Pipeline clamping
// =============================================================================

proptest! {
    /// Effective paging always lands inside the configured bounds
    #[test]
    fn prop_clamp_bounds(
        limit in prop::option::of(any::<i64>()),
        offset in prop::option::of(any::<i64>()),
    ) {
        let config = SearchConfig::default();
        let (l, o) = effective_pagination(&Pagination { limit, offset }, &config);
        prop_assert!((1..=100).contains(&l));
        prop_assert!(o >= 0);
        if let Some(requested) = offset {
            prop_assert_eq!(o, requested.max(0));
        }
    }

    /// The pipeline always ends in exactly one facet stage
    #[test]
    fn prop_pipeline_ends_in_facet(
        criteria in prop::collection::vec(criterion_strategy(), 0..6),
        limit in prop::option::of(-10i64..1000),
    ) {
        let payload = DocumentSearchPayload::new(criteria)
            .with_pagination(Pagination { limit, offset: None });
        let stages = build_pipeline(&payload, &SearchConfig::default());
        let facets = stages.iter().filter(|s| matches!(s, Stage::Facet { .. })).count();
        prop_assert_eq!(facets, 1);
        let last_is_facet = matches!(stages.last(), Some(Stage::Facet { .. }));
        prop_assert!(last_is_facet);
    }
}

// =============================================================================
// Builder robustness
// =============================================================================

proptest! {
    /// The document filter builder never panics, even on unvalidated criteria
    #[test]
    fn fuzz_document_filter(criteria in prop::collection::vec(criterion_strategy(), 0..10)) {
        let _ = build_filter(&criteria);
    }

    /// The join-tree builder either succeeds or fails cleanly, and every
    /// dotted criterion it accepts is reachable in the tree
    #[test]
    fn fuzz_join_tree(criteria in prop::collection::vec(criterion_strategy(), 0..10)) {
        let rels = relationships();
        match build_query_filters(&criteria, &rels, true, &IndexMap::new(), &HashMap::new()) {
            Ok((_, tree)) => {
                for criterion in &criteria {
                    let (path, _) = criterion.split_path();
                    if !path.is_empty() {
                        prop_assert!(tree.find(&path).is_some());
                    }
                }
            }
            Err(e) => prop_assert!(e.is_configuration()),
        }
    }

    /// Sort translation preserves length and order
    #[test]
    fn prop_sort_order_preserved(fields in prop::collection::vec(known_field_strategy(), 0..8)) {
        let specs: Vec<SortSpec> = fields
            .iter()
            .enumerate()
            .map(|(i, f)| SortSpec {
                field: f.clone(),
                order: if i % 2 == 0 { SortOrder::Asc } else { SortOrder::Desc },
            })
            .collect();
        let terms = translate_sort(&specs);
        prop_assert_eq!(terms.len(), specs.len());
        for (term, spec) in terms.iter().zip(&specs) {
            prop_assert!(spec.field.ends_with(term.column.as_str()));
            prop_assert_eq!(term.order, spec.order);
        }
    }
}

// =============================================================================
// Deserialization Fuzz Tests
// =============================================================================

/// Generate arbitrary JSON values (including invalid structures)
fn arbitrary_json_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        ".*".prop_map(Value::String),
    ];

    leaf.prop_recursive(4, 64, 10, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..10).prop_map(Value::Array),
            prop::collection::hash_map(".*", inner, 0..10)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    /// Payload deserialization should handle arbitrary JSON gracefully
    #[test]
    fn fuzz_payloads_from_arbitrary_json(json in arbitrary_json_strategy()) {
        let _ = serde_json::from_value::<RelationalSearchPayload>(json.clone());
        let _ = serde_json::from_value::<DocumentSearchPayload>(json.clone());
        let _ = serde_json::from_value::<Criterion>(json);
    }

    /// Operator parsing never panics on arbitrary strings
    #[test]
    fn fuzz_operator_from_str(s in ".*") {
        let _ = s.parse::<Operator>();
    }
}
