// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Document search execution.
//!
//! Two modes share [`build_filter`]:
//!
//! - **simple**: `count_documents(filter)` then `find(...)`, two round trips,
//!   with `populate` expansion.
//! - **pipeline**: one `aggregate` call ending in `$facet`, so the page and
//!   the total come from the same execution.

use async_trait::async_trait;
use bson::{Bson, Document};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::filter::build_filter;
use super::pipeline::{
    build_pipeline, effective_pagination, projection, sort_document, to_documents, LookupDescriptor,
    FACET_COUNT_FIELD, FACET_ITEMS, FACET_TOTAL,
};
use crate::config::SearchConfig;
use crate::criteria::{validate_all, validate_sort, Criterion, Pagination, SortSpec};
use crate::error::{BackendError, SearchError};
use crate::result::RawPage;

/// Search request against a document store.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DocumentSearchPayload {
    pub criteria: Vec<Criterion>,
    pub pagination: Pagination,
    /// Pipeline mode only
    pub lookups: Vec<LookupDescriptor>,
    /// Simple mode only: reference paths to expand
    pub populate: Vec<String>,
    pub selected_fields: Option<Vec<String>>,
    pub sort: Vec<SortSpec>,
    /// Not supported by either mode; ignored with a warning
    pub group_by: Vec<String>,
}

impl DocumentSearchPayload {
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
    pub fn lookup(mut self, lookup: LookupDescriptor) -> Self {
        self.lookups.push(lookup);
        self
    }

    #[must_use]
    pub fn populate(mut self, path: impl Into<String>) -> Self {
        self.populate.push(path.into());
        self
    }

    #[must_use]
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn sort(mut self, specs: Vec<SortSpec>) -> Self {
        self.sort = specs;
        self
    }

    #[must_use]
    pub fn group_by(mut self, fields: Vec<String>) -> Self {
        self.group_by = fields;
        self
    }
}

/// Arguments for a simple-mode `find`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FindQuery {
    pub filter: Document,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
    /// Applied in order, one expansion per path
    pub populate: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOptions {
    pub allow_disk_use: bool,
}

/// Queryable collection.
#[async_trait]
pub trait DocumentHandle: Send + Sync {
    type Item: Send;

    async fn count_documents(&self, filter: &Document) -> Result<u64, BackendError>;

    async fn find(&self, query: &FindQuery) -> Result<Vec<Self::Item>, BackendError>;

    async fn aggregate(
        &self,
        pipeline: &[Document],
        options: &AggregateOptions,
    ) -> Result<Vec<Document>, BackendError>;
}

fn warn_unsupported_group_by(payload: &DocumentSearchPayload) {
    if !payload.group_by.is_empty() {
        warn!(group_by = ?payload.group_by, "Document search ignores group_by");
    }
}

/// Paging applied by simple mode: the pipeline clamp, or the requested
/// values untouched when `clamp_simple_mode` is off.
#[must_use]
pub fn simple_pagination(pagination: &Pagination, config: &SearchConfig) -> Pagination {
    if config.clamp_simple_mode {
        let (limit, offset) = effective_pagination(pagination, config);
        Pagination::new(limit, offset)
    } else {
        *pagination
    }
}

/// Paging applied by pipeline mode.
#[must_use]
pub fn pipeline_pagination(pagination: &Pagination, config: &SearchConfig) -> Pagination {
    let (limit, offset) = effective_pagination(pagination, config);
    Pagination::new(limit, offset)
}

/// Build the simple-mode `find` arguments.
pub fn build_find_query(
    payload: &DocumentSearchPayload,
    config: &SearchConfig,
) -> Result<FindQuery, SearchError> {
    validate_all(&payload.criteria)?;
    validate_sort(&payload.sort)?;
    if !config.clamp_simple_mode {
        payload.pagination.validate()?;
    }
    let paging = simple_pagination(&payload.pagination, config);

    Ok(FindQuery {
        filter: build_filter(&payload.criteria),
        projection: payload
            .selected_fields
            .as_deref()
            .filter(|f| !f.is_empty())
            .map(projection),
        sort: (!payload.sort.is_empty()).then(|| sort_document(&payload.sort)),
        skip: paging.offset.and_then(|o| u64::try_from(o).ok()),
        limit: paging.limit,
        populate: payload.populate.clone(),
    })
}

/// Simple mode: count, then find.
pub async fn search_simple<H>(
    handle: &H,
    payload: &DocumentSearchPayload,
    config: &SearchConfig,
) -> Result<RawPage<H::Item>, SearchError>
where
    H: DocumentHandle + ?Sized,
{
    warn_unsupported_group_by(payload);
    let query = build_find_query(payload, config)?;

    let total = handle.count_documents(&query.filter).await?;
    let items = handle.find(&query).await?;

    debug!(total, fetched = items.len(), "Simple document search complete");
    Ok(RawPage { items, total })
}

/// Pipeline mode: one `aggregate` call, items decoded into `T`.
pub async fn search_pipeline<H, T>(
    handle: &H,
    payload: &DocumentSearchPayload,
    config: &SearchConfig,
) -> Result<RawPage<T>, SearchError>
where
    H: DocumentHandle + ?Sized,
    T: DeserializeOwned,
{
    validate_all(&payload.criteria)?;
    validate_sort(&payload.sort)?;
    warn_unsupported_group_by(payload);

    let stages = build_pipeline(payload, config);
    crate::metrics::record_pipeline_stages(stages.len());
    let pipeline = to_documents(&stages);
    let options = AggregateOptions {
        allow_disk_use: config.allow_disk_use,
    };
    let results = handle.aggregate(&pipeline, &options).await?;
    let raw = extract_facet(results)?;

    let items = raw
        .items
        .into_iter()
        .map(|doc| bson::from_document::<T>(doc).map_err(|e| BackendError::Decode(e.to_string())))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(total = raw.total, fetched = items.len(), "Pipeline document search complete");
    Ok(RawPage {
        items,
        total: raw.total,
    })
}

fn count_value(value: &Bson) -> Result<u64, BackendError> {
    let count = match value {
        Bson::Int32(n) => i64::from(*n),
        Bson::Int64(n) => *n,
        Bson::Double(n) if n.fract() == 0.0 => *n as i64,
        other => {
            return Err(BackendError::Decode(format!(
                "facet count has unexpected type {:?}",
                other.element_type()
            )))
        }
    };
    u64::try_from(count).map_err(|_| BackendError::Decode(format!("negative facet count {}", count)))
}

/// Unpack the single `$facet` output document. A missing document, empty
/// item list or empty count list is a valid empty result.
pub fn extract_facet(results: Vec<Document>) -> Result<RawPage<Document>, BackendError> {
    let Some(facet) = results.into_iter().next() else {
        return Ok(RawPage::empty());
    };

    let items = match facet.get(FACET_ITEMS) {
        None => Vec::new(),
        Some(Bson::Array(entries)) => entries
            .iter()
            .map(|entry| match entry {
                Bson::Document(doc) => Ok(doc.clone()),
                other => Err(BackendError::Decode(format!(
                    "facet item is not a document: {:?}",
                    other.element_type()
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(other) => {
            return Err(BackendError::Decode(format!(
                "facet '{}' is not an array: {:?}",
                FACET_ITEMS,
                other.element_type()
            )))
        }
    };

    let total = match facet.get(FACET_TOTAL) {
        Some(Bson::Array(entries)) => match entries.first() {
            Some(Bson::Document(doc)) => match doc.get(FACET_COUNT_FIELD) {
                Some(value) => count_value(value)?,
                None => 0,
            },
            _ => 0,
        },
        _ => 0,
    };

    Ok(RawPage { items, total })
}
