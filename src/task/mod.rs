//! Execution of a traversal plan against external systems.
//!
//! - [`retry`]: generic retry wrapper around one unit of node work
//! - [`resources`]: per-request status and row storage
//! - [`runner`]: walks a [`crate::graph::Traversal`] in order, fail-fast

pub mod resources;
pub mod retry;
pub mod runner;

use serde::{Deserialize, Serialize};

pub use resources::{InMemoryTaskResources, TaskResources, TaskStatus};
pub use retry::{retry, RetryPolicy, TaskLifecycle};
pub use runner::{GraphTaskRunner, NodeHandler, NodeInputs, RequestTask, RunReport};

/// Kind of privacy request work being executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Access,
    Erasure,
    Consent,
    Update,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Access => "access",
            ActionType::Erasure => "erasure",
            ActionType::Consent => "consent",
            ActionType::Update => "update",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "access" => Some(ActionType::Access),
            "erasure" => Some(ActionType::Erasure),
            "consent" => Some(ActionType::Consent),
            "update" => Some(ActionType::Update),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
