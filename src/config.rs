// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for search building and result assembly.
//!
//! # Example
//!
//! ```
//! use criteria_engine::SearchConfig;
//!
//! // Minimal config (uses defaults)
//! let config = SearchConfig::default();
//! assert_eq!(config.default_limit, 10);
//! assert_eq!(config.pipeline_max_limit, 100);
//!
//! // Override a few knobs
//! let config = SearchConfig {
//!     required_joins: false,
//!     pipeline_max_limit: 250,
//!     ..Default::default()
//! };
//! assert!(!config.required_joins);
//! ```

use serde::Deserialize;

/// Configuration shared by both backends.
///
/// All fields have defaults matching the behaviour callers historically
/// relied on, so an empty config document deserializes to [`SearchConfig::default`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchConfig {
    /// Page size when a payload carries no limit (default: 10)
    #[serde(default = "default_limit")]
    pub default_limit: i64,

    /// Pipeline-mode clamp bounds (default: [1, 100])
    #[serde(default = "default_pipeline_min_limit")]
    pub pipeline_min_limit: i64,
    #[serde(default = "default_pipeline_max_limit")]
    pub pipeline_max_limit: i64,

    /// Join strictness when a relational payload does not specify one
    #[serde(default = "default_required_joins")]
    pub required_joins: bool,

    /// `isSubQuery` when a relational payload does not specify one
    #[serde(default)]
    pub sub_query: bool,

    /// Passed through to `aggregate`
    #[serde(default = "default_allow_disk_use")]
    pub allow_disk_use: bool,

    /// Apply the pipeline clamp to simple (find) mode as well.
    /// `false` restores the legacy pass-through of limit/skip.
    #[serde(default = "default_clamp_simple_mode")]
    pub clamp_simple_mode: bool,
}

fn default_limit() -> i64 { 10 }
fn default_pipeline_min_limit() -> i64 { 1 }
fn default_pipeline_max_limit() -> i64 { 100 }
fn default_required_joins() -> bool { true }
fn default_allow_disk_use() -> bool { true }
fn default_clamp_simple_mode() -> bool { true }

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            pipeline_min_limit: default_pipeline_min_limit(),
            pipeline_max_limit: default_pipeline_max_limit(),
            required_joins: default_required_joins(),
            sub_query: false,
            allow_disk_use: default_allow_disk_use(),
            clamp_simple_mode: default_clamp_simple_mode(),
        }
    }
}
