// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Relational search execution.
//!
//! ```text
//! RelationalSearchPayload
//!       │
//!       ├─→ build_query_filters  → (where, include tree)
//!       ├─→ translate_sort       → order terms
//!       │
//!       ├─→ handle.count(where, include, distinct = joins present)
//!       └─→ handle.find_all(where, include, attributes, limit, offset, order, group)
//! ```
//!
//! The build is pure and completes before the first backend call, so a
//! configuration or validation error never reaches the handle.

use std::collections::HashMap;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::join_tree::{build_query_filters, JoinTree, RelatedEntity, RelationshipMap, WhereClause};
use super::sort::{check_joined, translate_sort, OrderTerm};
use crate::config::SearchConfig;
use crate::criteria::{validate_all, validate_sort, Criterion, Pagination, SortSpec};
use crate::error::{BackendError, SearchError};
use crate::result::RawPage;

/// Search request against a relational store.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelationalSearchPayload {
    pub criteria: Vec<Criterion>,
    pub pagination: Pagination,
    /// Relationship name → joinable entity
    pub related_entities: RelationshipMap,
    /// Root projection
    pub parent_selected_fields: Option<Vec<String>>,
    /// Dotted relationship path → projected fields. Each path is joined.
    pub nested_selected_fields: IndexMap<String, Vec<String>>,
    /// Default join strictness; falls back to [`SearchConfig::required_joins`]
    pub required_joins: Option<bool>,
    /// Falls back to [`SearchConfig::sub_query`]
    pub is_sub_query: Option<bool>,
    /// Relationship name → schema qualifier
    pub schema_mapping: HashMap<String, String>,
    /// Explicit ordering; an empty list disables ordering
    pub order_by: Option<Vec<SortSpec>>,
    /// Used only when `order_by` is absent
    pub default_order: Vec<SortSpec>,
    pub group_by: Vec<String>,
}

impl RelationalSearchPayload {
    #[must_use]
    pub fn new(criteria: Vec<Criterion>) -> Self {
        Self {
            criteria,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    #[must_use]
    pub fn relate(mut self, name: impl Into<String>, entity: RelatedEntity) -> Self {
        self.related_entities.insert(name.into(), entity);
        self
    }

    #[must_use]
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parent_selected_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn select_nested<I, S>(mut self, path: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nested_selected_fields
            .insert(path.into(), fields.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn required_joins(mut self, required: bool) -> Self {
        self.required_joins = Some(required);
        self
    }

    #[must_use]
    pub fn sub_query(mut self, sub_query: bool) -> Self {
        self.is_sub_query = Some(sub_query);
        self
    }

    #[must_use]
    pub fn schema(mut self, relationship: impl Into<String>, schema: impl Into<String>) -> Self {
        self.schema_mapping.insert(relationship.into(), schema.into());
        self
    }

    #[must_use]
    pub fn order_by(mut self, specs: Vec<SortSpec>) -> Self {
        self.order_by = Some(specs);
        self
    }

    #[must_use]
    pub fn default_order(mut self, specs: Vec<SortSpec>) -> Self {
        self.default_order = specs;
        self
    }

    #[must_use]
    pub fn group_by(mut self, fields: Vec<String>) -> Self {
        self.group_by = fields;
        self
    }
}

/// Output of the pure build step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationalQuery {
    #[serde(rename = "where")]
    pub where_clause: WhereClause,
    pub include: JoinTree,
    pub order: Vec<OrderTerm>,
}

/// Arguments for the count call.
#[derive(Debug, Clone, PartialEq)]
pub struct CountOptions {
    pub where_clause: WhereClause,
    pub include: JoinTree,
    /// Count distinct root rows (set whenever joins are present)
    pub distinct: bool,
}

/// Arguments for the fetch call.
#[derive(Debug, Clone, PartialEq)]
pub struct FindAllOptions {
    pub where_clause: WhereClause,
    pub include: JoinTree,
    pub attributes: Option<Vec<String>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub sub_query: bool,
    pub order: Vec<OrderTerm>,
    pub group: Vec<String>,
}

/// Queryable relational model.
#[async_trait]
pub trait RelationalHandle: Send + Sync {
    type Record: Send;

    async fn count(&self, options: &CountOptions) -> Result<u64, BackendError>;

    async fn find_all(&self, options: &FindAllOptions) -> Result<Vec<Self::Record>, BackendError>;
}

/// Validate the payload and build where clause, join tree and ordering.
pub fn build_query(
    payload: &RelationalSearchPayload,
    config: &SearchConfig,
) -> Result<RelationalQuery, SearchError> {
    validate_all(&payload.criteria)?;
    payload.pagination.validate()?;

    let required = payload.required_joins.unwrap_or(config.required_joins);
    let (where_clause, include) = build_query_filters(
        &payload.criteria,
        &payload.related_entities,
        required,
        &payload.nested_selected_fields,
        &payload.schema_mapping,
    )?;

    let specs = payload.order_by.as_deref().unwrap_or(&payload.default_order);
    validate_sort(specs)?;
    let order = translate_sort(specs);
    check_joined(&order, &include)?;

    debug!(
        where_clause = %serde_json::to_string(&where_clause).unwrap_or_default(),
        "Final where clause"
    );
    debug!(
        include = %serde_json::to_string(&include).unwrap_or_default(),
        joins = include.node_count(),
        "Final include options"
    );
    debug!(order = ?order, "Final sort order");

    Ok(RelationalQuery {
        where_clause,
        include,
        order,
    })
}

fn to_u64(value: Option<i64>) -> Option<u64> {
    value.and_then(|v| u64::try_from(v).ok())
}

/// Run a relational search: count, then fetch.
pub async fn search<H>(
    handle: &H,
    payload: &RelationalSearchPayload,
    config: &SearchConfig,
) -> Result<RawPage<H::Record>, SearchError>
where
    H: RelationalHandle + ?Sized,
{
    let query = build_query(payload, config)?;
    crate::metrics::record_join_nodes(query.include.node_count());

    let count_options = CountOptions {
        where_clause: query.where_clause.clone(),
        include: query.include.clone(),
        distinct: !query.include.is_empty(),
    };
    let total = handle.count(&count_options).await?;

    let find_options = FindAllOptions {
        where_clause: query.where_clause,
        include: query.include,
        attributes: payload.parent_selected_fields.clone(),
        limit: to_u64(payload.pagination.limit),
        offset: to_u64(payload.pagination.offset),
        sub_query: payload.is_sub_query.unwrap_or(config.sub_query),
        order: query.order,
        group: payload.group_by.clone(),
    };
    let items = handle.find_all(&find_options).await?;

    debug!(total, fetched = items.len(), "Relational search complete");
    Ok(RawPage { items, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{CriteriaBuilder, Criterion, Operator, SortOrder};
    use crate::relational::operators::SqlCondition;
    use parking_lot::Mutex;

    /// Records every call and returns canned results.
    #[derive(Default)]
    struct RecordingHandle {
        counts: Mutex<Vec<CountOptions>>,
        finds: Mutex<Vec<FindAllOptions>>,
        total: u64,
    }

    #[async_trait]
    impl RelationalHandle for RecordingHandle {
        type Record = u32;

        async fn count(&self, options: &CountOptions) -> Result<u64, BackendError> {
            self.counts.lock().push(options.clone());
            Ok(self.total)
        }

        async fn find_all(&self, options: &FindAllOptions) -> Result<Vec<u32>, BackendError> {
            self.finds.lock().push(options.clone());
            Ok(vec![1, 2])
        }
    }

    fn profile() -> RelatedEntity {
        RelatedEntity::new("profiles", "profile_id", "id")
    }

    #[tokio::test]
    async fn test_top_level_search_is_not_distinct() {
        let handle = RecordingHandle { total: 1, ..Default::default() };
        let payload = RelationalSearchPayload::new(CriteriaBuilder::new().eq("name", "John").build())
            .with_pagination(Pagination::new(10, 0));

        let page = search(&handle, &payload, &SearchConfig::default()).await.unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.items, vec![1, 2]);
        let counts = handle.counts.lock();
        assert_eq!(counts.len(), 1);
        assert!(!counts[0].distinct);
        assert_eq!(
            counts[0].where_clause.get("name"),
            Some(&SqlCondition::Eq("John".into()))
        );
        let finds = handle.finds.lock();
        assert_eq!(finds[0].limit, Some(10));
        assert_eq!(finds[0].offset, Some(0));
        assert!(!finds[0].sub_query);
    }

    #[tokio::test]
    async fn test_joined_search_counts_distinct_and_projects() {
        let handle = RecordingHandle { total: 2, ..Default::default() };
        let payload = RelationalSearchPayload::new(vec![
            Criterion::new("profile.age", Operator::Gt, ["30"]).required(true),
        ])
        .relate("profile", profile())
        .select_nested("profile", ["id", "age"])
        .select(["id", "name"]);

        search(&handle, &payload, &SearchConfig::default()).await.unwrap();

        let counts = handle.counts.lock();
        assert!(counts[0].distinct);
        let node = &counts[0].include.nodes()[0];
        assert_eq!(node.relationship, "profile");
        assert_eq!(node.attributes, Some(vec!["id".to_string(), "age".to_string()]));
        let finds = handle.finds.lock();
        assert_eq!(finds[0].attributes, Some(vec!["id".to_string(), "name".to_string()]));
        assert_eq!(finds[0].include, counts[0].include);
    }

    #[tokio::test]
    async fn test_unknown_relationship_never_reaches_backend() {
        let handle = RecordingHandle::default();
        let payload =
            RelationalSearchPayload::new(CriteriaBuilder::new().eq("company.name", "Acme").build());

        let err = search(&handle, &payload, &SearchConfig::default()).await.unwrap_err();

        assert!(err.is_configuration());
        assert!(handle.counts.lock().is_empty());
        assert!(handle.finds.lock().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_between_never_reaches_backend() {
        let handle = RecordingHandle::default();
        let payload =
            RelationalSearchPayload::new(vec![Criterion::new("price", Operator::Between, ["1"])]);

        let err = search(&handle, &payload, &SearchConfig::default()).await.unwrap_err();

        assert!(err.is_validation());
        assert!(handle.counts.lock().is_empty());
    }

    #[test]
    fn test_default_order_used_only_when_order_by_absent() {
        let config = SearchConfig::default();
        let payload = RelationalSearchPayload::new(vec![]).default_order(vec![SortSpec::desc("created_at")]);
        let query = build_query(&payload, &config).unwrap();
        assert_eq!(query.order.len(), 1);
        assert_eq!(query.order[0].order, SortOrder::Desc);

        let payload = payload.order_by(vec![]);
        let query = build_query(&payload, &config).unwrap();
        assert!(query.order.is_empty());
    }

    #[test]
    fn test_order_precedence_preserved() {
        let payload = RelationalSearchPayload::new(vec![])
            .order_by(vec![SortSpec::desc("b"), SortSpec::asc("a")]);
        let query = build_query(&payload, &SearchConfig::default()).unwrap();
        let columns: Vec<&str> = query.order.iter().map(|t| t.column.as_str()).collect();
        assert_eq!(columns, vec!["b", "a"]);
    }

    #[test]
    fn test_negative_pagination_rejected() {
        let payload = RelationalSearchPayload::new(vec![]).with_pagination(Pagination {
            limit: Some(-1),
            offset: None,
        });
        assert!(build_query(&payload, &SearchConfig::default()).unwrap_err().is_validation());
    }

    #[test]
    fn test_empty_sort_path_rejected() {
        let config = SearchConfig::default();
        let blank = RelationalSearchPayload::new(vec![]).order_by(vec![SortSpec::asc("")]);
        assert!(build_query(&blank, &config).unwrap_err().is_validation());

        let dangling = RelationalSearchPayload::new(vec![]).default_order(vec![SortSpec::desc("profile.")]);
        assert!(build_query(&dangling, &config).unwrap_err().is_validation());
    }

    #[test]
    fn test_required_joins_falls_back_to_config() {
        let config = SearchConfig {
            required_joins: false,
            ..Default::default()
        };
        let payload = RelationalSearchPayload::new(CriteriaBuilder::new().gt("profile.age", "30").build())
            .relate("profile", profile());
        let query = build_query(&payload, &config).unwrap();
        assert!(!query.include.nodes()[0].required);

        let query = build_query(&payload.required_joins(true), &config).unwrap();
        assert!(query.include.nodes()[0].required);
    }

    #[test]
    fn test_payload_deserializes_from_json() {
        let payload: RelationalSearchPayload = serde_json::from_str(
            r#"{
                "criteria": [{"field": "profile.age", "operator": "GT", "value": ["30"], "required": true}],
                "pagination": {"limit": 5, "offset": 10},
                "related_entities": {"profile": {"table": "profiles", "local_key": "profile_id", "foreign_key": "id"}},
                "order_by": [{"field": "name", "order": "ASC"}]
            }"#,
        )
        .unwrap();
        assert_eq!(payload.criteria[0].required, Some(true));
        assert_eq!(payload.pagination, Pagination::new(5, 10));
        assert!(payload.related_entities.contains_key("profile"));
        assert!(build_query(&payload, &SearchConfig::default()).is_ok());
    }
}
