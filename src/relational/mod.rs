// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Relational backend: criteria → where clause + join tree → SQL.

pub mod join_tree;
pub mod operators;
pub mod search;
pub mod sort;
pub mod sql;
pub mod store;

pub use join_tree::{build_query_filters, JoinNode, JoinTree, ModelRef, RelatedEntity, RelationshipMap, WhereClause};
pub use operators::{SqlCondition, SQL_OPERATORS};
pub use search::{
    build_query, search, CountOptions, FindAllOptions, RelationalHandle, RelationalQuery,
    RelationalSearchPayload,
};
pub use sort::{check_joined, translate_sort, OrderTerm};
pub use sql::{RootEntity, SqlDialect, SqlParam, SqlRenderer, SqlStatement};
pub use store::SqlRelationalStore;
