// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Criteria Engine
//!
//! Backend-agnostic search criteria translation for a relational store and a
//! document store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Criteria Model                        │
//! │  • Criterion { field, operator, value, required }           │
//! │  • Pagination, SortSpec                                     │
//! └─────────────────────────────────────────────────────────────┘
//!                │                                │
//!                ▼                                ▼
//! ┌────────────────────────────┐  ┌────────────────────────────┐
//! │        Relational          │  │         Document           │
//! │  • SQL operator table      │  │  • BSON operator table     │
//! │  • Join-tree builder       │  │  • Nested filter builder   │
//! │  • Sort translator         │  │  • Pipeline builder        │
//! │  • count + findAll         │  │  • find / $facet aggregate │
//! └────────────────────────────┘  └────────────────────────────┘
//!                │                                │
//!                └───────────────┬────────────────┘
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Result Assembler                       │
//! │  • items, total, page, count, totalPages                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Builders are pure and finish before the first backend call, so an unknown
//! relationship or malformed criterion never reaches the store.
//!
//! ## Quick Start
//!
//! ```rust
//! use criteria_engine::relational::{build_query_filters, RelatedEntity, RelationshipMap, SqlCondition};
//! use criteria_engine::CriteriaBuilder;
//! use indexmap::IndexMap;
//! use std::collections::HashMap;
//!
//! let criteria = CriteriaBuilder::new()
//!     .eq("name", "john")
//!     .gt("profile.age", "30")
//!     .build();
//!
//! let mut relationships = RelationshipMap::new();
//! relationships.insert("profile".into(), RelatedEntity::new("profiles", "profile_id", "id"));
//!
//! let (where_clause, joins) =
//!     build_query_filters(&criteria, &relationships, true, &IndexMap::new(), &HashMap::new()).unwrap();
//!
//! assert_eq!(where_clause.get("name"), Some(&SqlCondition::Eq("john".into())));
//! assert_eq!(joins.nodes()[0].relationship, "profile");
//! ```
//!
//! ## Modules
//!
//! - [`criteria`]: Criteria model and the shared operator table
//! - [`relational`]: Join-tree builder, SQL rendering, sqlx store
//! - [`document`]: Filter and aggregation pipeline builders
//! - [`result`]: Page math
//! - [`repository`]: Handle + config wrappers returning [`SearchResult`]

pub mod config;
pub mod criteria;
pub mod document;
pub mod error;
pub mod metrics;
pub mod relational;
pub mod repository;
pub mod result;

pub use config::SearchConfig;
pub use criteria::{CriteriaBuilder, Criterion, Operator, Pagination, SortOrder, SortSpec};
pub use document::{DocumentHandle, DocumentSearchPayload, LookupDescriptor};
pub use error::{BackendError, ConfigurationError, SearchError};
pub use metrics::LatencyTimer;
pub use relational::{
    RelatedEntity, RelationalHandle, RelationalSearchPayload, RootEntity, SqlDialect, SqlRelationalStore,
};
pub use repository::{DocumentRepository, RelationalRepository};
pub use result::{RawPage, SearchResult};
