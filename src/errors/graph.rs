//! Graph construction and traversal error types
//!
//! Construction errors are raised while a [`DatasetGraph`] is built and are
//! never retried. Cycle errors are raised while a traversal plan is computed;
//! no partial plan is produced.
//!
//! # Examples
//!
//! ```rust
//! use datagate::errors::GraphError;
//!
//! let err = GraphError::DuplicateAddress("postgres:customer".to_string());
//! assert!(err.is_construction_error());
//!
//! let err = GraphError::CycleDetected {
//!     addresses: vec!["db:a".to_string(), "db:b".to_string()],
//! };
//! assert!(err.is_cycle());
//! ```
//!
//! [`DatasetGraph`]: crate::graph::DatasetGraph

use thiserror::Error;

/// Graph-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Two fields with the same name in one collection or object field
    #[error("Duplicate field '{field}' in '{parent}'")]
    DuplicateField {
        /// Collection or object field holding the duplicate
        parent: String,
        /// Repeated field name
        field: String,
    },

    /// Two datasets define the same collection address
    #[error("Duplicate collection address: {0}")]
    DuplicateAddress(String),

    /// A field reference points at a dataset, collection or field that is not in the graph
    #[error("Unresolved reference from {from} to {to}")]
    UnresolvedReference {
        /// Address of the field owning the reference
        from: String,
        /// Address the reference points at
        to: String,
    },

    /// Address string could not be parsed
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Reference cycle between collections
    #[error("Cycle detected between collections: {}", addresses.join(", "))]
    CycleDetected {
        /// Collection addresses participating in the cycle
        addresses: Vec<String>,
    },
}

impl GraphError {
    /// Raised while building the graph from dataset definitions
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            GraphError::DuplicateField { .. }
                | GraphError::DuplicateAddress(_)
                | GraphError::UnresolvedReference { .. }
                | GraphError::InvalidAddress(_)
        )
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, GraphError::CycleDetected { .. })
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            GraphError::DuplicateField { .. } | GraphError::DuplicateAddress(_) => "CONFLICT",
            GraphError::UnresolvedReference { .. } => "UNRESOLVED_REFERENCE",
            GraphError::InvalidAddress(_) => "VALIDATION_FAILED",
            GraphError::CycleDetected { .. } => "CYCLE_DETECTED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_address() {
        let err = GraphError::DuplicateAddress("s1:t1".to_string());
        assert_eq!(err.to_string(), "Duplicate collection address: s1:t1");
        assert!(err.is_construction_error());
        assert!(!err.is_cycle());
        assert_eq!(err.error_code(), "CONFLICT");
    }

    #[test]
    fn test_unresolved_reference() {
        let err = GraphError::UnresolvedReference {
            from: "s1:t1:f3".to_string(),
            to: "s2:t9:f1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unresolved reference from s1:t1:f3 to s2:t9:f1"
        );
        assert!(err.is_construction_error());
        assert_eq!(err.error_code(), "UNRESOLVED_REFERENCE");
    }

    #[test]
    fn test_cycle_detected() {
        let err = GraphError::CycleDetected {
            addresses: vec!["s1:a".to_string(), "s1:b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Cycle detected between collections: s1:a, s1:b"
        );
        assert!(err.is_cycle());
        assert!(!err.is_construction_error());
    }
}
