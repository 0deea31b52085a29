// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Document backend: criteria → nested BSON filter → find or aggregation pipeline.

pub mod filter;
pub mod operators;
pub mod pipeline;
pub mod search;

pub use filter::{build_filter, match_condition};
pub use operators::DOCUMENT_OPERATORS;
pub use pipeline::{build_pipeline, effective_pagination, LookupDescriptor, Stage, SubStage};
pub use search::{
    build_find_query, extract_facet, pipeline_pagination, search_pipeline, search_simple, simple_pagination,
    AggregateOptions, DocumentHandle, DocumentSearchPayload, FindQuery,
};
