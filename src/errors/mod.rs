//! Domain-specific error types
//!
//! # Error Categories
//!
//! - **GraphError**: graph construction (duplicate addresses, unresolved
//!   references) and traversal planning (cycles)
//! - **DiscoveryError**: monitor configuration and staged resource operations
//!
//! Node execution faults are not wrapped: the task handler's own error type
//! flows through the retry wrapper and task runner unchanged.

pub mod discovery;
pub mod graph;

pub use discovery::DiscoveryError;
pub use graph::GraphError;

/// Result type alias for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Result type alias for discovery operations
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
