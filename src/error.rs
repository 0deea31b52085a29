// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for search building and execution.
//!
//! Every search call fails as a whole; there is no partial-result mode.
//! Build-time errors ([`ConfigurationError`], validation) are raised before
//! any backend call is issued. Backend errors pass through untouched.

use thiserror::Error;

/// Top-level error returned by every search entry point.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("Invalid criterion for '{field}': {reason}")]
    Validation { field: String, reason: String },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl SearchError {
    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Short label used for metrics and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Validation { .. } => "validation",
            Self::Backend(_) => "backend",
        }
    }

    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// The relationship map handed to a relational build does not cover a path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Relationship {relationship} not found in related entities")]
    UnknownRelationship { relationship: String },
    #[error("Sort field '{field}' traverses relationship '{relationship}' which is not joined")]
    UnjoinedSortPath { field: String, relationship: String },
}

/// Failure raised by a queryable handle during count/find/aggregate.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend query failed: {0}")]
    Query(String),
    #[error("Backend connection error: {0}")]
    Connection(String),
    #[error("Failed to decode backend response: {0}")]
    Decode(String),
}

impl From<sqlx::Error> for BackendError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Connection(e.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Self::Decode(e.to_string())
            }
            other => Self::Query(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_relationship_message_names_relationship() {
        let err: SearchError = ConfigurationError::UnknownRelationship {
            relationship: "profile".into(),
        }
        .into();
        assert!(err.is_configuration());
        assert_eq!(err.kind(), "configuration");
        assert_eq!(
            err.to_string(),
            "Relationship profile not found in related entities"
        );
    }

    #[test]
    fn test_backend_error_passes_through() {
        let err: SearchError = BackendError::Query("boom".into()).into();
        assert_eq!(err.kind(), "backend");
        assert_eq!(err.to_string(), "Backend query failed: boom");
    }

    #[test]
    fn test_validation_helper() {
        let err = SearchError::validation("price", "BETWEEN requires two values");
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "Invalid criterion for 'price': BETWEEN requires two values"
        );
    }

    #[test]
    fn test_sqlx_pool_timeout_maps_to_connection() {
        let err: BackendError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, BackendError::Connection(_)));
    }
}
