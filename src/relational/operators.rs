// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Relational operator translation.
//!
//! Maps each [`Operator`] to a typed [`SqlCondition`]. Rendering to SQL text
//! happens later in [`super::sql`], so where-clauses and join nodes stay
//! inspectable values.
//!
//! ```text
//! EQ       → col = ?
//! LIKE     → col LIKE '%v%'
//! ILIKE    → LOWER(col) LIKE LOWER('%v%')
//! IN       → col IN (?, ?, ...)
//! BETWEEN  → col BETWEEN ? AND ?
//! ```

use serde::Serialize;

use crate::criteria::operator_table::{entry, first, second, OperatorTable, TranslateFn};
use crate::criteria::Operator;

/// Relational condition fragment for a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum SqlCondition {
    Eq(String),
    Ne(String),
    Gt(String),
    Gte(String),
    Lt(String),
    Lte(String),
    /// Pattern already wrapped in `%...%`
    Like(String),
    /// Case-insensitive pattern, already wrapped in `%...%`
    ILike(String),
    In(Vec<String>),
    NotIn(Vec<String>),
    Between(String, String),
    NotBetween(String, String),
}

fn eq(values: &[String]) -> SqlCondition {
    SqlCondition::Eq(first(values))
}

fn ne(values: &[String]) -> SqlCondition {
    SqlCondition::Ne(first(values))
}

fn gt(values: &[String]) -> SqlCondition {
    SqlCondition::Gt(first(values))
}

fn gte(values: &[String]) -> SqlCondition {
    SqlCondition::Gte(first(values))
}

fn lt(values: &[String]) -> SqlCondition {
    SqlCondition::Lt(first(values))
}

fn lte(values: &[String]) -> SqlCondition {
    SqlCondition::Lte(first(values))
}

fn like(values: &[String]) -> SqlCondition {
    SqlCondition::Like(format!("%{}%", first(values)))
}

fn ilike(values: &[String]) -> SqlCondition {
    SqlCondition::ILike(format!("%{}%", first(values)))
}

fn is_in(values: &[String]) -> SqlCondition {
    SqlCondition::In(values.to_vec())
}

fn not_in(values: &[String]) -> SqlCondition {
    SqlCondition::NotIn(values.to_vec())
}

fn between(values: &[String]) -> SqlCondition {
    SqlCondition::Between(first(values), second(values))
}

fn not_between(values: &[String]) -> SqlCondition {
    SqlCondition::NotBetween(first(values), second(values))
}

static SQL_ENTRIES: [(Operator, TranslateFn<SqlCondition>); 12] = [
    entry(Operator::Eq, eq),
    entry(Operator::Neq, ne),
    entry(Operator::Gt, gt),
    entry(Operator::Gte, gte),
    entry(Operator::Lt, lt),
    entry(Operator::Lte, lte),
    entry(Operator::Like, like),
    entry(Operator::ILike, ilike),
    entry(Operator::In, is_in),
    entry(Operator::NotIn, not_in),
    entry(Operator::Between, between),
    entry(Operator::NotBetween, not_between),
];

/// Relational operator table; misses fall back to `Eq(values[0])`.
pub static SQL_OPERATORS: OperatorTable<SqlCondition> = OperatorTable::new(&SQL_ENTRIES, eq);
