// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Relational sort translation.
//!
//! `"profile.age" DESC` becomes `(["profile"], "age", DESC)`: the join path
//! followed by the column and direction, so the backend can order by a column
//! reachable only through the join tree.

use serde::Serialize;

use super::join_tree::JoinTree;
use crate::criteria::{split_path, SortOrder, SortSpec};
use crate::error::{ConfigurationError, SearchError};

/// One ordering key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderTerm {
    /// Relationship path; empty for root columns
    pub path: Vec<String>,
    pub column: String,
    pub order: SortOrder,
}

/// Translate sort specs in precedence order.
#[must_use]
pub fn translate_sort(specs: &[SortSpec]) -> Vec<OrderTerm> {
    specs
        .iter()
        .map(|spec| {
            let (path, column) = split_path(&spec.field);
            OrderTerm {
                path: path.into_iter().map(str::to_string).collect(),
                column: column.to_string(),
                order: spec.order,
            }
        })
        .collect()
}

/// Every dotted order term must walk joins that exist in `tree`.
pub fn check_joined(terms: &[OrderTerm], tree: &JoinTree) -> Result<(), SearchError> {
    for term in terms {
        for depth in 1..=term.path.len() {
            let prefix: Vec<&str> = term.path[..depth].iter().map(String::as_str).collect();
            if tree.find(&prefix).is_none() {
                return Err(ConfigurationError::UnjoinedSortPath {
                    field: format!("{}.{}", term.path.join("."), term.column),
                    relationship: term.path[depth - 1].clone(),
                }
                .into());
            }
        }
    }
    Ok(())
}
