// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQL-backed relational handle.
//!
//! Runs [`SqlRenderer`] output against an sqlx `Any` pool (SQLite or MySQL)
//! and decodes each row into a JSON object. Columns aliased with a dotted
//! path (`profile.address.city`) become nested objects:
//!
//! ```text
//! { "id": 1, "name": "John", "profile": { "age": 42, "address": { "city": "Oslo" } } }
//! ```
//!
//! One-to-many joins fold back into one record per root, keyed by the
//! hidden root key column, with the joined rows collected into an array:
//!
//! ```text
//! { "id": 1, "name": "John", "posts": [ { "title": "a" }, { "title": "b" } ] }
//! ```
//!
//! ## sqlx Any Driver Quirks
//!
//! The `Any` driver hands MySQL TEXT/LONGTEXT back as BLOB, so byte columns
//! are read as `Vec<u8>` and decoded as UTF-8 where possible.

use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Column, Row, ValueRef};
use tracing::debug;

use super::join_tree::{JoinNode, JoinTree};
use super::search::{CountOptions, FindAllOptions, RelationalHandle};
use super::sql::{RootEntity, SqlDialect, SqlParam, SqlRenderer, SqlStatement, ROOT_KEY_ALIAS};
use crate::error::BackendError;

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

pub struct SqlRelationalStore {
    pool: AnyPool,
    dialect: SqlDialect,
    root: RootEntity,
}

impl SqlRelationalStore {
    /// Connect a new pool for `root`.
    pub async fn connect(connection_string: &str, root: RootEntity) -> Result<Self, BackendError> {
        install_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(if connection_string.contains(":memory:") { 1 } else { 10 })
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .connect(connection_string)
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            dialect: SqlDialect::from_url(connection_string),
            root,
        })
    }

    /// Share an existing pool.
    pub fn from_pool(pool: AnyPool, dialect: SqlDialect, root: RootEntity) -> Self {
        Self { pool, dialect, root }
    }

    /// Get a clone of the connection pool for sharing with other stores.
    pub fn pool(&self) -> AnyPool {
        self.pool.clone()
    }

    pub fn root(&self) -> &RootEntity {
        &self.root
    }

    fn renderer(&self) -> SqlRenderer<'_> {
        SqlRenderer::new(&self.root, self.dialect)
    }

    async fn fetch(&self, stmt: &SqlStatement) -> Result<Vec<AnyRow>, BackendError> {
        debug!(sql = %stmt.to_inline(), "Executing statement");
        let mut query = sqlx::query(&stmt.sql);
        for param in &stmt.params {
            query = match param {
                SqlParam::Text(s) => query.bind(s.clone()),
                SqlParam::Integer(n) => query.bind(*n),
            };
        }
        Ok(query.fetch_all(&self.pool).await?)
    }
}

#[async_trait]
impl RelationalHandle for SqlRelationalStore {
    type Record = Value;

    async fn count(&self, options: &CountOptions) -> Result<u64, BackendError> {
        let stmt = self.renderer().count(options);
        let rows = self.fetch(&stmt).await?;
        let row = rows
            .first()
            .ok_or_else(|| BackendError::Query("count returned no rows".to_string()))?;
        let count: i64 = row.try_get("cnt")?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn find_all(&self, options: &FindAllOptions) -> Result<Vec<Value>, BackendError> {
        let stmt = self.renderer().find_all(options);
        let rows = self.fetch(&stmt).await?;
        let records = rows.iter().map(row_to_json).collect::<Result<Vec<_>, _>>()?;
        if options.include.has_many() {
            Ok(fold_rows(records, &options.include))
        } else {
            Ok(records.into_iter().map(Value::Object).collect())
        }
    }
}

fn column_value(row: &AnyRow, idx: usize) -> Result<Value, BackendError> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(Value::Null);
    }
    if let Ok(n) = row.try_get::<i64, _>(idx) {
        return Ok(Value::from(n));
    }
    if let Ok(f) = row.try_get::<f64, _>(idx) {
        return Ok(Value::from(f));
    }
    if let Ok(b) = row.try_get::<bool, _>(idx) {
        return Ok(Value::Bool(b));
    }
    if let Ok(s) = row.try_get::<String, _>(idx) {
        return Ok(Value::String(s));
    }
    // MySQL TEXT arrives as BLOB through the Any driver
    let bytes = row.try_get::<Vec<u8>, _>(idx)?;
    Ok(match String::from_utf8(bytes) {
        Ok(s) => Value::String(s),
        Err(e) => Value::Array(e.into_bytes().into_iter().map(Value::from).collect()),
    })
}

/// Insert `value` at a dotted path, creating intermediate objects.
fn insert_path(target: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                insert_path(map, rest, value);
            }
        }
    }
}

fn row_to_json(row: &AnyRow) -> Result<Map<String, Value>, BackendError> {
    let mut record = Map::new();
    for (idx, col) in row.columns().iter().enumerate() {
        insert_path(&mut record, col.name(), column_value(row, idx)?);
    }
    Ok(record)
}

/// Fold joined rows into one record per root key, in first-seen order.
fn fold_rows(rows: Vec<Map<String, Value>>, include: &JoinTree) -> Vec<Value> {
    let mut roots: IndexMap<String, Map<String, Value>> = IndexMap::new();
    let mut unkeyed = 0usize;
    for mut row in rows {
        let key = match row.remove(ROOT_KEY_ALIAS) {
            Some(key) => key.to_string(),
            None => {
                unkeyed += 1;
                format!("#{}", unkeyed)
            }
        };
        shape(&mut row, include.nodes());
        match roots.get_mut(&key) {
            Some(existing) => merge(existing, row, include.nodes()),
            None => {
                roots.insert(key, row);
            }
        }
    }
    roots.into_values().map(Value::Object).collect()
}

/// Turn each one-to-many node of a single row into a zero- or one-element array.
fn shape(record: &mut Map<String, Value>, nodes: &[JoinNode]) {
    for node in nodes {
        let Some(value) = record.get_mut(&node.relationship) else {
            continue;
        };
        if let Value::Object(child) = value {
            shape(child, &node.children);
        }
        if node.model.entity.many {
            let item = value.take();
            *value = if is_unmatched(&item, &node.children) {
                Value::Array(Vec::new())
            } else {
                Value::Array(vec![item])
            };
        }
    }
}

/// An outer join that found nothing: every own column and every child is empty.
fn is_unmatched(value: &Value, children: &[JoinNode]) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.iter().all(|(key, v)| {
            match children.iter().find(|c| &c.relationship == key) {
                Some(child) => match v {
                    Value::Array(items) => items.is_empty(),
                    other => is_unmatched(other, &child.children),
                },
                None => v.is_null(),
            }
        }),
        _ => false,
    }
}

fn merge(target: &mut Map<String, Value>, mut row: Map<String, Value>, nodes: &[JoinNode]) {
    for node in nodes {
        let Some(incoming) = row.remove(&node.relationship) else {
            continue;
        };
        match (target.get_mut(&node.relationship), incoming) {
            (Some(Value::Array(existing)), Value::Array(items)) => {
                for item in items {
                    merge_item(existing, item, &node.children);
                }
            }
            (Some(Value::Object(existing)), Value::Object(child)) => {
                merge(existing, child, &node.children);
            }
            _ => {}
        }
    }
}

/// Joined rows are identified by their own columns; nested joins merge into
/// the matching element.
fn merge_item(existing: &mut Vec<Value>, item: Value, children: &[JoinNode]) {
    let position = existing.iter().position(|e| same_row(e, &item, children));
    match (position, item) {
        (Some(idx), Value::Object(incoming)) => {
            if let Value::Object(target) = &mut existing[idx] {
                merge(target, incoming, children);
            }
        }
        (Some(_), _) => {}
        (None, item) => existing.push(item),
    }
}

fn same_row(a: &Value, b: &Value, children: &[JoinNode]) -> bool {
    let own = |v: &Value| -> Vec<(String, Value)> {
        match v {
            Value::Object(map) => map
                .iter()
                .filter(|(key, _)| !children.iter().any(|c| &c.relationship == *key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            other => vec![(String::new(), other.clone())],
        }
    };
    own(a) == own(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{Criterion, Operator};
    use crate::relational::join_tree::{build_query_filters, RelatedEntity, RelationshipMap};
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_insert_path_nests_objects() {
        let mut map = Map::new();
        insert_path(&mut map, "id", json!(1));
        insert_path(&mut map, "profile.age", json!(42));
        insert_path(&mut map, "profile.address.city", json!("Oslo"));
        assert_eq!(
            Value::Object(map),
            json!({"id": 1, "profile": {"age": 42, "address": {"city": "Oslo"}}})
        );
    }

    #[test]
    fn test_insert_path_replaces_scalar_with_object() {
        let mut map = Map::new();
        insert_path(&mut map, "profile", json!(null));
        insert_path(&mut map, "profile.age", json!(7));
        assert_eq!(Value::Object(map), json!({"profile": {"age": 7}}));
    }

    fn fan_out_tree() -> JoinTree {
        let mut rels = RelationshipMap::new();
        rels.insert(
            "posts".into(),
            RelatedEntity::new("posts", "id", "user_id").has_many(),
        );
        rels.insert(
            "tags".into(),
            RelatedEntity::new("tags", "id", "post_id").has_many(),
        );
        rels.insert("profile".into(), RelatedEntity::new("profiles", "profile_id", "id"));
        let criteria = vec![
            Criterion::new("posts.tags.label", Operator::Neq, ["x"]).required(false),
            Criterion::new("profile.city", Operator::Neq, ["x"]).required(false),
        ];
        let (_, tree) =
            build_query_filters(&criteria, &rels, false, &IndexMap::new(), &HashMap::new()).unwrap();
        tree
    }

    fn row(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_fold_rows_groups_by_root_key() {
        let rows = vec![
            row(json!({"__root_key": 1, "name": "John", "profile": {"city": "Oslo"},
                "posts": {"title": "a", "tags": {"label": "rust"}}})),
            row(json!({"__root_key": 1, "name": "John", "profile": {"city": "Oslo"},
                "posts": {"title": "a", "tags": {"label": "sql"}}})),
            row(json!({"__root_key": 1, "name": "John", "profile": {"city": "Oslo"},
                "posts": {"title": "b", "tags": {"label": null}}})),
            row(json!({"__root_key": 2, "name": "Jane", "profile": {"city": null},
                "posts": {"title": null, "tags": {"label": null}}})),
        ];

        let folded = fold_rows(rows, &fan_out_tree());

        assert_eq!(
            folded,
            vec![
                json!({"name": "John", "profile": {"city": "Oslo"}, "posts": [
                    {"title": "a", "tags": [{"label": "rust"}, {"label": "sql"}]},
                    {"title": "b", "tags": []},
                ]}),
                json!({"name": "Jane", "profile": {"city": null}, "posts": []}),
            ]
        );
    }

    #[test]
    fn test_fold_rows_without_key_keeps_every_row() {
        let rows = vec![
            row(json!({"name": "John", "posts": {"title": "a", "tags": {"label": null}}})),
            row(json!({"name": "John", "posts": {"title": "b", "tags": {"label": null}}})),
        ];
        assert_eq!(fold_rows(rows, &fan_out_tree()).len(), 2);
    }
}
