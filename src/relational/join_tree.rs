// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Relational Join-Tree Builder
//!
//! Turns a flat criteria list into a top-level [`WhereClause`] plus a nested
//! [`JoinTree`]:
//!
//! ```text
//! name = john              → where { name: Eq(john) }
//! profile.age > 30         → join profile { where { age: Gt(30) } }
//! profile.address.city     → join profile → join address { where { city: ... } }
//! ```
//!
//! Nodes are accumulated in an index arena while criteria and projection
//! paths are applied, then converted into an owned tree. Nothing is shared
//! between calls.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::operators::{SqlCondition, SQL_OPERATORS};
use crate::criteria::{split_path, Criterion};
use crate::error::{ConfigurationError, SearchError};

/// Relationship name → joinable entity. Names are resolved at any depth.
pub type RelationshipMap = HashMap<String, RelatedEntity>;

/// Descriptor of a joinable entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedEntity {
    /// Backing table
    pub table: String,
    /// Column on the parent side of the join
    pub local_key: String,
    /// Column on this entity's side of the join
    pub foreign_key: String,
    /// Known columns; selected when a join carries no explicit attributes
    #[serde(default)]
    pub columns: Vec<String>,
    /// One parent row may join many rows of this entity
    #[serde(default)]
    pub many: bool,
}

impl RelatedEntity {
    pub fn new(
        table: impl Into<String>,
        local_key: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            local_key: local_key.into(),
            foreign_key: foreign_key.into(),
            columns: Vec::new(),
            many: false,
        }
    }

    /// Mark as a one-to-many relationship; decoded records carry it as an array.
    #[must_use]
    pub fn has_many(mut self) -> Self {
        self.many = true;
        self
    }

    #[must_use]
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Resolve a model reference, optionally qualified by a schema.
    #[must_use]
    pub fn model(&self, schema: Option<&str>) -> ModelRef {
        ModelRef {
            entity: self.clone(),
            schema: schema.map(str::to_string),
        }
    }
}

/// A related entity as it participates in one join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelRef {
    pub entity: RelatedEntity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

impl ModelRef {
    /// `schema.table` or `table`
    #[must_use]
    pub fn qualified_table(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.entity.table),
            None => self.entity.table.clone(),
        }
    }
}

/// Conjunction of per-attribute conditions. Re-inserting an attribute
/// replaces its condition in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WhereClause(IndexMap<String, SqlCondition>);

impl WhereClause {
    #[must_use]
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn insert(&mut self, attribute: impl Into<String>, condition: SqlCondition) -> Option<SqlCondition> {
        self.0.insert(attribute.into(), condition)
    }

    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&SqlCondition> {
        self.0.get(attribute)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SqlCondition)> {
        self.0.iter()
    }
}

/// One join (include) in the tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinNode {
    /// Relationship name, doubling as the join alias
    #[serde(rename = "as")]
    pub relationship: String,
    pub model: ModelRef,
    /// Inner join when true, outer join otherwise
    pub required: bool,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<WhereClause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<String>>,
    #[serde(rename = "include")]
    pub children: Vec<JoinNode>,
}

/// Owned include tree for one search call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct JoinTree {
    nodes: Vec<JoinNode>,
}

impl JoinTree {
    /// Top-level joins, in creation order.
    #[must_use]
    pub fn nodes(&self) -> &[JoinNode] {
        &self.nodes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True when any join at any depth can fan out root rows.
    #[must_use]
    pub fn has_many(&self) -> bool {
        self.walk().iter().any(|(_, node)| node.model.entity.many)
    }

    /// Total number of joins at every depth.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.walk().len()
    }

    /// Follow a relationship path from the root.
    #[must_use]
    pub fn find(&self, path: &[&str]) -> Option<&JoinNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.nodes.iter().find(|n| n.relationship == *first)?;
        for segment in rest {
            node = node.children.iter().find(|n| n.relationship == *segment)?;
        }
        Some(node)
    }

    /// Pre-order traversal yielding each node with its full path.
    #[must_use]
    pub fn walk(&self) -> Vec<(Vec<&str>, &JoinNode)> {
        let mut out = Vec::new();
        let mut stack: Vec<(Vec<&str>, &JoinNode)> = self
            .nodes
            .iter()
            .rev()
            .map(|n| (vec![n.relationship.as_str()], n))
            .collect();
        while let Some((path, node)) = stack.pop() {
            for child in node.children.iter().rev() {
                let mut child_path = path.clone();
                child_path.push(child.relationship.as_str());
                stack.push((child_path, child));
            }
            out.push((path, node));
        }
        out
    }
}

struct ArenaNode {
    relationship: String,
    model: ModelRef,
    required: bool,
    where_clause: Option<WhereClause>,
    attributes: Option<Vec<String>>,
    children: Vec<usize>,
}

struct JoinArena<'a> {
    nodes: Vec<ArenaNode>,
    roots: Vec<usize>,
    relationships: &'a RelationshipMap,
    schema_mapping: &'a HashMap<String, String>,
}

impl<'a> JoinArena<'a> {
    fn new(relationships: &'a RelationshipMap, schema_mapping: &'a HashMap<String, String>) -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            relationships,
            schema_mapping,
        }
    }

    fn find_child(&self, parent: Option<usize>, name: &str) -> Option<usize> {
        let siblings = match parent {
            Some(p) => &self.nodes[p].children,
            None => &self.roots,
        };
        siblings
            .iter()
            .copied()
            .find(|&i| self.nodes[i].relationship == name)
    }

    fn create(&mut self, parent: Option<usize>, name: &str, required: bool) -> Result<usize, SearchError> {
        let entity = self.relationships.get(name).ok_or_else(|| {
            ConfigurationError::UnknownRelationship {
                relationship: name.to_string(),
            }
        })?;
        let schema = self.schema_mapping.get(name).map(String::as_str);
        debug!(relationship = %name, required, "Building join for relationship");

        let idx = self.nodes.len();
        self.nodes.push(ArenaNode {
            relationship: name.to_string(),
            model: entity.model(schema),
            required,
            where_clause: None,
            attributes: None,
            children: Vec::new(),
        });
        match parent {
            Some(p) => self.nodes[p].children.push(idx),
            None => self.roots.push(idx),
        }
        Ok(idx)
    }

    /// Walk a relationship path, creating missing nodes with `required`.
    /// Returns the index of the deepest node.
    fn ensure_path(&mut self, path: &[&str], required: bool) -> Result<usize, SearchError> {
        let mut parent = None;
        for segment in path {
            let idx = match self.find_child(parent, segment) {
                Some(idx) => idx,
                None => self.create(parent, segment, required)?,
            };
            parent = Some(idx);
        }
        // Callers never pass an empty path
        parent.ok_or_else(|| SearchError::validation("", "empty relationship path"))
    }

    fn apply_criterion(
        &mut self,
        path: &[&str],
        attribute: &str,
        condition: SqlCondition,
        required: bool,
    ) -> Result<(), SearchError> {
        let idx = self.ensure_path(path, required)?;
        let node = &mut self.nodes[idx];
        node.where_clause
            .get_or_insert_with(WhereClause::new)
            .insert(attribute, condition);
        // Last write wins for the deepest node
        node.required = required;
        Ok(())
    }

    fn apply_projection(&mut self, path: &[&str], fields: &[String], required: bool) -> Result<(), SearchError> {
        let idx = self.ensure_path(path, required)?;
        self.nodes[idx].attributes = Some(fields.to_vec());
        Ok(())
    }

    fn into_tree(self) -> JoinTree {
        let mut slots: Vec<Option<ArenaNode>> = self.nodes.into_iter().map(Some).collect();
        let nodes = self
            .roots
            .iter()
            .filter_map(|&i| take_node(&mut slots, i))
            .collect();
        JoinTree { nodes }
    }
}

fn take_node(slots: &mut [Option<ArenaNode>], idx: usize) -> Option<JoinNode> {
    let node = slots.get_mut(idx)?.take()?;
    let children = node
        .children
        .iter()
        .filter_map(|&c| take_node(slots, c))
        .collect();
    Some(JoinNode {
        relationship: node.relationship,
        model: node.model,
        required: node.required,
        where_clause: node.where_clause,
        attributes: node.attributes,
        children,
    })
}

/// Build the top-level where clause and the join tree.
///
/// Single-segment criteria land in the where clause. Dotted criteria walk
/// the relationship path, creating joins as needed, and attach their
/// condition to the deepest join. Every `nested_selected_fields` path is then
/// joined (even without a filter) and given its field list.
///
/// Fails with [`ConfigurationError::UnknownRelationship`] on the first path
/// segment missing from `relationships`; no partial tree is returned.
pub fn build_query_filters(
    criteria: &[Criterion],
    relationships: &RelationshipMap,
    default_required: bool,
    nested_selected_fields: &IndexMap<String, Vec<String>>,
    schema_mapping: &HashMap<String, String>,
) -> Result<(WhereClause, JoinTree), SearchError> {
    let mut where_clause = WhereClause::new();
    let mut arena = JoinArena::new(relationships, schema_mapping);

    for criterion in criteria {
        let condition = SQL_OPERATORS.translate(criterion.operator, &criterion.value);
        let (path, attribute) = split_path(&criterion.field);
        if path.is_empty() {
            if where_clause.insert(attribute, condition).is_some() {
                debug!(field = %attribute, "Replacing earlier condition on field");
            }
        } else {
            let required = criterion.required.unwrap_or(default_required);
            arena.apply_criterion(&path, attribute, condition, required)?;
        }
    }

    for (relation, fields) in nested_selected_fields {
        let path: Vec<&str> = relation.split('.').collect();
        if path.iter().any(|s| s.is_empty()) {
            return Err(SearchError::validation(
                relation,
                "projection path contains an empty segment",
            ));
        }
        arena.apply_projection(&path, fields, default_required)?;
    }

    Ok((where_clause, arena.into_tree()))
}
