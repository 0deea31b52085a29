// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Result assembly.
//!
//! ```text
//! count      = limit ?? default_limit
//! page       = offset > 0 ? floor(offset / count) + 1 : 1
//! totalPages = ceil(total / count)          (0 when count is 0)
//! ```

use serde::Serialize;

use crate::criteria::Pagination;

/// Raw backend output before page math.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPage<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> RawPage<T> {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

/// Uniform paged result returned by every repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    /// 1-based page number
    pub page: u64,
    /// Page size
    pub count: u64,
    pub total_pages: u64,
}

impl<T> SearchResult<T> {
    /// Apply page math to a raw page.
    #[must_use]
    pub fn assemble(raw: RawPage<T>, pagination: &Pagination, default_limit: i64) -> Self {
        let count = u64::try_from(pagination.limit.unwrap_or(default_limit)).unwrap_or(0);
        let offset = u64::try_from(pagination.offset.unwrap_or(0)).unwrap_or(0);
        Self {
            page: page_number(offset, count),
            count,
            total_pages: total_pages(raw.total, count),
            total: raw.total,
            items: raw.items,
        }
    }

    /// Convert items, keeping page metadata.
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> SearchResult<U> {
        SearchResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            count: self.count,
            total_pages: self.total_pages,
        }
    }
}

/// `ceil(total / count)`, or 0 when `count` is 0.
#[must_use]
pub fn total_pages(total: u64, count: u64) -> u64 {
    if count == 0 {
        0
    } else {
        total.div_ceil(count)
    }
}

/// `floor(offset / count) + 1`, or 1 when either is 0.
#[must_use]
pub fn page_number(offset: u64, count: u64) -> u64 {
    if offset == 0 || count == 0 {
        1
    } else {
        offset / count + 1
    }
}
