// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Repositories: one queryable handle plus config, returning [`SearchResult`].
//!
//! ```rust,no_run
//! use criteria_engine::{
//!     CriteriaBuilder, Pagination, RelatedEntity, RelationalRepository,
//!     RelationalSearchPayload, RootEntity, SqlRelationalStore,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqlRelationalStore::connect(
//!     "sqlite::memory:",
//!     RootEntity::new("users", "id").with_columns(["id", "name"]),
//! )
//! .await?;
//! let users = RelationalRepository::new("UserRepository", store);
//!
//! let payload = RelationalSearchPayload::new(CriteriaBuilder::new().gt("profile.age", "30").build())
//!     .relate("profile", RelatedEntity::new("profiles", "profile_id", "id"))
//!     .with_pagination(Pagination::new(10, 0));
//! let page = users.search(&payload).await?;
//! println!("{} of {} users", page.items.len(), page.total);
//! # Ok(())
//! # }
//! ```

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::document::{self, DocumentHandle, DocumentSearchPayload};
use crate::error::SearchError;
use crate::metrics::{record_error, record_result_size, record_search, LatencyTimer};
use crate::relational::{self, RelationalHandle, RelationalSearchPayload};
use crate::result::{RawPage, SearchResult};

const RELATIONAL: &str = "relational";
const DOCUMENT: &str = "document";

fn finish<T>(
    backend: &'static str,
    mode: &'static str,
    outcome: Result<RawPage<T>, SearchError>,
) -> Result<RawPage<T>, SearchError> {
    match outcome {
        Ok(raw) => {
            record_search(backend, mode, "success");
            record_result_size(backend, raw.items.len(), raw.total);
            Ok(raw)
        }
        Err(e) => {
            record_search(backend, mode, "error");
            record_error(backend, e.kind());
            match &e {
                SearchError::Backend(_) => warn!(error = %e, "Search failed in backend"),
                _ => debug!(error = %e, kind = e.kind(), "Search rejected before execution"),
            }
            Err(e)
        }
    }
}

/// Search repository over a relational model.
pub struct RelationalRepository<H> {
    name: String,
    handle: H,
    config: SearchConfig,
}

impl<H: RelationalHandle> RelationalRepository<H> {
    pub fn new(name: impl Into<String>, handle: H) -> Self {
        Self {
            name: name.into(),
            handle,
            config: SearchConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Count, fetch and paginate.
    #[tracing::instrument(skip(self, payload), fields(repository = %self.name, backend = RELATIONAL))]
    pub async fn search(
        &self,
        payload: &RelationalSearchPayload,
    ) -> Result<SearchResult<H::Record>, SearchError> {
        let _timer = LatencyTimer::new(RELATIONAL, "find");
        let outcome = relational::search(&self.handle, payload, &self.config).await;
        let raw = finish(RELATIONAL, "find", outcome)?;
        Ok(SearchResult::assemble(raw, &payload.pagination, self.config.default_limit))
    }
}

/// Search repository over a document collection.
pub struct DocumentRepository<H> {
    name: String,
    handle: H,
    config: SearchConfig,
}

impl<H: DocumentHandle> DocumentRepository<H> {
    pub fn new(name: impl Into<String>, handle: H) -> Self {
        Self {
            name: name.into(),
            handle,
            config: SearchConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Single-round-trip aggregation search.
    #[tracing::instrument(skip(self, payload), fields(repository = %self.name, backend = DOCUMENT))]
    pub async fn search<T: DeserializeOwned>(
        &self,
        payload: &DocumentSearchPayload,
    ) -> Result<SearchResult<T>, SearchError> {
        let _timer = LatencyTimer::new(DOCUMENT, "pipeline");
        let outcome = document::search_pipeline(&self.handle, payload, &self.config).await;
        let raw = finish(DOCUMENT, "pipeline", outcome)?;
        let applied = document::pipeline_pagination(&payload.pagination, &self.config);
        Ok(SearchResult::assemble(raw, &applied, self.config.default_limit))
    }

    /// Count-then-find search with populate.
    #[tracing::instrument(skip(self, payload), fields(repository = %self.name, backend = DOCUMENT))]
    pub async fn search_simple(
        &self,
        payload: &DocumentSearchPayload,
    ) -> Result<SearchResult<H::Item>, SearchError> {
        let _timer = LatencyTimer::new(DOCUMENT, "simple");
        let outcome = document::search_simple(&self.handle, payload, &self.config).await;
        let raw = finish(DOCUMENT, "simple", outcome)?;
        let applied = document::simple_pagination(&payload.pagination, &self.config);
        Ok(SearchResult::assemble(raw, &applied, self.config.default_limit))
    }
}
