//! Detection and discovery error types
//!
//! Errors raised by the monitor and staged resource services. Absence of a
//! staged resource during a URN lookup is not an error; lookups return
//! `Option` or an empty list instead.
//!
//! # Examples
//!
//! ```rust
//! use datagate::errors::DiscoveryError;
//!
//! let err = DiscoveryError::not_found("monitor_config", "bq_monitor");
//! assert_eq!(err.http_status_code(), 404);
//!
//! let err = DiscoveryError::Validation("bad scope".to_string());
//! assert!(err.is_validation_error());
//! ```

use thiserror::Error;

/// Detection and discovery errors
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Input rejected at the boundary
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Entity missing for the given key
    #[error("{entity} '{key}' not found")]
    NotFound {
        /// Entity kind, e.g. `monitor_config`
        entity: String,
        /// Lookup key
        key: String,
    },

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Stored JSON could not be (de)serialised
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DiscoveryError {
    pub fn not_found(entity: impl Into<String>, key: impl Into<String>) -> Self {
        DiscoveryError::NotFound {
            entity: entity.into(),
            key: key.into(),
        }
    }

    /// Check if this is a validation error (400)
    pub fn is_validation_error(&self) -> bool {
        matches!(self, DiscoveryError::Validation(_))
    }

    /// Check if this is a not found error (404)
    pub fn is_not_found(&self) -> bool {
        matches!(self, DiscoveryError::NotFound { .. })
    }

    /// Get HTTP status code for this error
    pub fn http_status_code(&self) -> u16 {
        match self {
            DiscoveryError::Validation(_) => 400,
            DiscoveryError::NotFound { .. } => 404,
            DiscoveryError::Database(_) | DiscoveryError::Serialization(_) => 500,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            DiscoveryError::Validation(_) => "VALIDATION_FAILED",
            DiscoveryError::NotFound { .. } => "NOT_FOUND",
            DiscoveryError::Database(_) => "DATABASE_ERROR",
            DiscoveryError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}
