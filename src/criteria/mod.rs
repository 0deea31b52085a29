// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Criteria Model - the storage-neutral search vocabulary
//!
//! Both backends consume the same shapes: a list of [`Criterion`], a
//! [`Pagination`] window and an ordered list of [`SortSpec`]. Field paths use
//! `.` to step into a related entity (relational) or an embedded document
//! (document store).
//!
//! # Example
//!
//! ```rust
//! use criteria_engine::criteria::{CriteriaBuilder, Operator};
//!
//! let criteria = CriteriaBuilder::new()
//!     .eq("name", "john")
//!     .gt("profile.age", "30")
//!     .between("price", "10", "20")
//!     .build();
//!
//! assert_eq!(criteria.len(), 3);
//! assert_eq!(criteria[1].operator, Operator::Gt);
//! ```

pub mod operator_table;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// Comparison operator (closed set, shared by both backends).
///
/// Wire names follow the historical codes: `NIN` and `NBETWEEN` for the
/// negated forms, with `NOT_IN` / `NOT_BETWEEN` accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "EQ")]
    Eq,
    #[serde(rename = "NEQ")]
    Neq,
    #[serde(rename = "GT")]
    Gt,
    #[serde(rename = "GTE")]
    Gte,
    #[serde(rename = "LT")]
    Lt,
    #[serde(rename = "LTE")]
    Lte,
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "ILIKE")]
    ILike,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "NIN", alias = "NOT_IN")]
    NotIn,
    #[serde(rename = "BETWEEN")]
    Between,
    #[serde(rename = "NBETWEEN", alias = "NOT_BETWEEN")]
    NotBetween,
}

impl Operator {
    pub const ALL: [Operator; 12] = [
        Operator::Eq,
        Operator::Neq,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::Like,
        Operator::ILike,
        Operator::In,
        Operator::NotIn,
        Operator::Between,
        Operator::NotBetween,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "EQ",
            Operator::Neq => "NEQ",
            Operator::Gt => "GT",
            Operator::Gte => "GTE",
            Operator::Lt => "LT",
            Operator::Lte => "LTE",
            Operator::Like => "LIKE",
            Operator::ILike => "ILIKE",
            Operator::In => "IN",
            Operator::NotIn => "NIN",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NBETWEEN",
        }
    }

    /// Minimum number of values the operator reads.
    #[must_use]
    pub fn min_values(&self) -> usize {
        match self {
            Operator::In | Operator::NotIn => 0,
            Operator::Between | Operator::NotBetween => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s {
            "EQ" => Operator::Eq,
            "NEQ" => Operator::Neq,
            "GT" => Operator::Gt,
            "GTE" => Operator::Gte,
            "LT" => Operator::Lt,
            "LTE" => Operator::Lte,
            "LIKE" => Operator::Like,
            "ILIKE" => Operator::ILike,
            "IN" => Operator::In,
            "NIN" | "NOT_IN" => Operator::NotIn,
            "BETWEEN" => Operator::Between,
            "NBETWEEN" | "NOT_BETWEEN" => Operator::NotBetween,
            other => {
                return Err(SearchError::validation(
                    other,
                    "unknown operator",
                ))
            }
        };
        Ok(op)
    }
}

/// One filter condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    /// Dotted path (e.g. "name", "profile.age")
    pub field: String,
    pub operator: Operator,
    /// Operand values; BETWEEN reads `[lower, upper]`
    pub value: Vec<String>,
    /// Overrides the default join strictness for this path (relational only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

impl Criterion {
    pub fn new<I, V>(field: impl Into<String>, operator: Operator, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            field: field.into(),
            operator,
            value: values.into_iter().map(Into::into).collect(),
            required: None,
        }
    }

    /// Set the join strictness for this criterion's relationship path.
    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    /// Split the field into `(relationship path, attribute)`.
    ///
    /// `"profile.address.city"` → `(["profile", "address"], "city")`
    #[must_use]
    pub fn split_path(&self) -> (Vec<&str>, &str) {
        split_path(&self.field)
    }

    /// Reject shapes the translators cannot express.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.field.split('.').any(str::is_empty) {
            return Err(SearchError::validation(
                &self.field,
                "field path contains an empty segment",
            ));
        }
        let min = self.operator.min_values();
        if self.value.len() < min {
            return Err(SearchError::validation(
                &self.field,
                format!(
                    "{} requires at least {} value(s), got {}",
                    self.operator,
                    min,
                    self.value.len()
                ),
            ));
        }
        Ok(())
    }
}

/// Split a dotted path into its leading segments and the final attribute.
#[must_use]
pub fn split_path(field: &str) -> (Vec<&str>, &str) {
    match field.rsplit_once('.') {
        Some((path, attribute)) => (path.split('.').collect(), attribute),
        None => (Vec::new(), field),
    }
}

/// Validate every criterion, stopping at the first failure.
pub fn validate_all(criteria: &[Criterion]) -> Result<(), SearchError> {
    criteria.iter().try_for_each(Criterion::validate)
}

/// Paging window. Absent fields mean "not requested".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

impl Pagination {
    #[must_use]
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }

    /// Reject negative values (relational paging is passed to the backend as-is).
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.limit.is_some_and(|l| l < 0) {
            return Err(SearchError::validation("pagination.limit", "must be >= 0"));
        }
        if self.offset.is_some_and(|o| o < 0) {
            return Err(SearchError::validation("pagination.offset", "must be >= 0"));
        }
        Ok(())
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

impl SortOrder {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// One sort key. List position is precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: SortOrder::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: SortOrder::Desc }
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if self.field.split('.').any(str::is_empty) {
            return Err(SearchError::validation(
                &self.field,
                "sort path contains an empty segment",
            ));
        }
        Ok(())
    }
}

/// Validate every sort key, stopping at the first failure.
pub fn validate_sort(specs: &[SortSpec]) -> Result<(), SearchError> {
    specs.iter().try_for_each(SortSpec::validate)
}

/// Builder for criteria lists
#[derive(Debug, Default)]
pub struct CriteriaBuilder {
    criteria: Vec<Criterion>,
}

impl CriteriaBuilder {
    pub fn new() -> Self {
        Self { criteria: Vec::new() }
    }

    fn push(mut self, criterion: Criterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    /// Add a prebuilt criterion (e.g. one carrying `required`)
    pub fn criterion(self, criterion: Criterion) -> Self {
        self.push(criterion)
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(Criterion::new(field, Operator::Eq, [value]))
    }

    pub fn neq(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(Criterion::new(field, Operator::Neq, [value]))
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(Criterion::new(field, Operator::Gt, [value]))
    }

    pub fn gte(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(Criterion::new(field, Operator::Gte, [value]))
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(Criterion::new(field, Operator::Lt, [value]))
    }

    pub fn lte(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(Criterion::new(field, Operator::Lte, [value]))
    }

    pub fn like(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(Criterion::new(field, Operator::Like, [value]))
    }

    pub fn ilike(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(Criterion::new(field, Operator::ILike, [value]))
    }

    /// Membership: `IN (values...)`
    pub fn is_in(self, field: impl Into<String>, values: Vec<String>) -> Self {
        self.push(Criterion::new(field, Operator::In, values))
    }

    pub fn not_in(self, field: impl Into<String>, values: Vec<String>) -> Self {
        self.push(Criterion::new(field, Operator::NotIn, values))
    }

    /// Inclusive range `[lower, upper]`
    pub fn between(
        self,
        field: impl Into<String>,
        lower: impl Into<String>,
        upper: impl Into<String>,
    ) -> Self {
        self.push(Criterion::new(
            field,
            Operator::Between,
            [lower.into(), upper.into()],
        ))
    }

    pub fn not_between(
        self,
        field: impl Into<String>,
        lower: impl Into<String>,
        upper: impl Into<String>,
    ) -> Self {
        self.push(Criterion::new(
            field,
            Operator::NotBetween,
            [lower.into(), upper.into()],
        ))
    }

    pub fn build(self) -> Vec<Criterion> {
        self.criteria
    }
}
