// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Aggregation pipeline construction.
//!
//! Stages are appended in a fixed order:
//!
//! ```text
//! $match   (omitted when no criteria)
//! $lookup  (one per descriptor, in order)
//!   $unwind  (right after a single-result lookup, keeps unmatched documents)
//! $project (only when fields are selected)
//! $sort    (omitted when no sort specs)
//! $facet   { items: [$skip, $limit], total: [$count] }
//! ```
//!
//! The terminal `$facet` yields the page and the total count from one
//! execution, so both reflect the same snapshot.

use bson::{doc, Bson, Document};
use serde::Deserialize;
use tracing::debug;

use super::filter::{build_filter, match_condition};
use super::search::DocumentSearchPayload;
use crate::config::SearchConfig;
use crate::criteria::{Pagination, SortOrder, SortSpec};

/// Facet key holding the page of items.
pub const FACET_ITEMS: &str = "items";
/// Facet key holding the `[{count: n}]` total.
pub const FACET_TOTAL: &str = "total";
/// Field written by the `$count` stage.
pub const FACET_COUNT_FIELD: &str = "count";

/// Cross-collection join.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupDescriptor {
    pub from: String,
    pub local_field: String,
    pub foreign_field: String,
    #[serde(rename = "as")]
    pub as_field: String,
    /// Correlated sub-pipeline run against `from`
    #[serde(default)]
    pub pipeline: Option<Vec<SubStage>>,
    /// Outer-document variables visible inside `pipeline`
    #[serde(default, rename = "let")]
    pub let_bindings: Option<Document>,
    /// Flatten the joined array to at most one embedded document
    #[serde(default)]
    pub single_result: bool,
}

impl LookupDescriptor {
    pub fn new(
        from: impl Into<String>,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
        as_field: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
            as_field: as_field.into(),
            pipeline: None,
            let_bindings: None,
            single_result: false,
        }
    }

    #[must_use]
    pub fn single(mut self) -> Self {
        self.single_result = true;
        self
    }

    #[must_use]
    pub fn with_pipeline(mut self, pipeline: Vec<SubStage>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    #[must_use]
    pub fn with_let(mut self, bindings: Document) -> Self {
        self.let_bindings = Some(bindings);
        self
    }

    fn to_document(&self) -> Document {
        let mut lookup = doc! { "from": self.from.clone() };
        match (&self.pipeline, &self.let_bindings) {
            (Some(pipeline), Some(bindings)) => {
                lookup.insert("let", bindings.clone());
                lookup.insert("pipeline", sub_pipeline(pipeline));
            }
            (Some(pipeline), None) => {
                lookup.insert("localField", self.local_field.clone());
                lookup.insert("foreignField", self.foreign_field.clone());
                lookup.insert("pipeline", sub_pipeline(pipeline));
            }
            (None, _) => {
                lookup.insert("localField", self.local_field.clone());
                lookup.insert("foreignField", self.foreign_field.clone());
            }
        }
        lookup.insert("as", self.as_field.clone());
        doc! { "$lookup": lookup }
    }
}

/// Stage allowed inside a correlated lookup.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubStage {
    Match(Document),
    Lookup(Box<LookupDescriptor>),
    Project(Vec<String>),
}

impl SubStage {
    #[must_use]
    pub fn to_document(&self) -> Document {
        match self {
            Self::Match(condition) => doc! { "$match": condition.clone() },
            Self::Lookup(lookup) => lookup.to_document(),
            Self::Project(fields) => doc! { "$project": projection(fields) },
        }
    }
}

fn sub_pipeline(stages: &[SubStage]) -> Vec<Document> {
    stages.iter().map(SubStage::to_document).collect()
}

/// One aggregation stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Document),
    Lookup(LookupDescriptor),
    Unwind { path: String, preserve_empty: bool },
    Project(Vec<String>),
    Sort(Vec<SortSpec>),
    Facet { offset: i64, limit: i64 },
}

impl Stage {
    /// Stage operator name, without the `$`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Match(_) => "match",
            Self::Lookup(_) => "lookup",
            Self::Unwind { .. } => "unwind",
            Self::Project(_) => "project",
            Self::Sort(_) => "sort",
            Self::Facet { .. } => "facet",
        }
    }

    #[must_use]
    pub fn to_document(&self) -> Document {
        match self {
            Self::Match(condition) => doc! { "$match": condition.clone() },
            Self::Lookup(lookup) => lookup.to_document(),
            Self::Unwind { path, preserve_empty } => doc! {
                "$unwind": { "path": format!("${}", path), "preserveNullAndEmptyArrays": *preserve_empty }
            },
            Self::Project(fields) => doc! { "$project": projection(fields) },
            Self::Sort(specs) => doc! { "$sort": sort_document(specs) },
            Self::Facet { offset, limit } => doc! {
                "$facet": {
                    FACET_ITEMS: [ { "$skip": *offset }, { "$limit": *limit } ],
                    FACET_TOTAL: [ { "$count": FACET_COUNT_FIELD } ],
                }
            },
        }
    }
}

/// `field → 1` for each selected field.
#[must_use]
pub fn projection(fields: &[String]) -> Document {
    fields.iter().map(|f| (f.clone(), Bson::Int32(1))).collect()
}

/// `field → 1 | -1` in precedence order.
#[must_use]
pub fn sort_document(specs: &[SortSpec]) -> Document {
    specs
        .iter()
        .map(|spec| {
            let direction = match spec.order {
                SortOrder::Asc => 1,
                SortOrder::Desc => -1,
            };
            (spec.field.clone(), Bson::Int32(direction))
        })
        .collect()
}

/// Clamped `(limit, offset)`: `limit = clamp(requested ?? default, max(min, 1), max)`,
/// `offset = max(requested ?? 0, 0)`.
#[must_use]
pub fn effective_pagination(pagination: &Pagination, config: &SearchConfig) -> (i64, i64) {
    // `$limit: 0` is rejected by the server
    let min = config.pipeline_min_limit.max(1);
    let max = config.pipeline_max_limit.max(min);
    let limit = pagination.limit.unwrap_or(config.default_limit).clamp(min, max);
    let offset = pagination.offset.unwrap_or(0).max(0);
    (limit, offset)
}

/// Build the full stage list for a pipeline-mode search.
#[must_use]
pub fn build_pipeline(payload: &DocumentSearchPayload, config: &SearchConfig) -> Vec<Stage> {
    let mut stages = Vec::new();

    if let Some(condition) = match_condition(&build_filter(&payload.criteria)) {
        stages.push(Stage::Match(condition));
    }

    for lookup in &payload.lookups {
        stages.push(Stage::Lookup(lookup.clone()));
        if lookup.single_result {
            stages.push(Stage::Unwind {
                path: lookup.as_field.clone(),
                preserve_empty: true,
            });
        }
    }

    if let Some(fields) = payload.selected_fields.as_ref().filter(|f| !f.is_empty()) {
        stages.push(Stage::Project(fields.clone()));
    }

    if !payload.sort.is_empty() {
        stages.push(Stage::Sort(payload.sort.clone()));
    }

    let (limit, offset) = effective_pagination(&payload.pagination, config);
    stages.push(Stage::Facet { offset, limit });

    debug!(
        stages = ?stages.iter().map(Stage::name).collect::<Vec<_>>(),
        limit,
        offset,
        "Document pipeline"
    );
    stages
}

/// Render stages for `aggregate`.
#[must_use]
pub fn to_documents(stages: &[Stage]) -> Vec<Document> {
    stages.iter().map(Stage::to_document).collect()
}
