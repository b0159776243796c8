use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::graph::{CollectionAddress, Row};

/// Lifecycle status of one collection task within a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProcessing,
    Retrying,
    Complete,
    Error,
    Skipped,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProcessing => "in_processing",
            TaskStatus::Retrying => "retrying",
            TaskStatus::Complete => "complete",
            TaskStatus::Error => "error",
            TaskStatus::Skipped => "skipped",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "in_processing" => Some(TaskStatus::InProcessing),
            "retrying" => Some(TaskStatus::Retrying),
            "complete" => Some(TaskStatus::Complete),
            "error" => Some(TaskStatus::Error),
            "skipped" => Some(TaskStatus::Skipped),
            _ => None,
        }
    }

    /// No further transitions expected
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Complete | TaskStatus::Error | TaskStatus::Skipped
        )
    }
}

/// Per-request storage for task statuses and collected rows.
///
/// Implementations are shared between tasks and must serialise their own
/// writes.
pub trait TaskResources: Send + Sync {
    fn set_status(&self, request_id: &str, address: &CollectionAddress, status: TaskStatus);

    fn status(&self, request_id: &str, address: &CollectionAddress) -> Option<TaskStatus>;

    fn set_rows(&self, request_id: &str, address: &CollectionAddress, rows: Vec<Row>);

    fn rows(&self, request_id: &str, address: &CollectionAddress) -> Vec<Row>;
}

#[derive(Debug, Default, Clone)]
struct TaskEntry {
    status: Option<TaskStatus>,
    rows: Vec<Row>,
}

/// [`TaskResources`] kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryTaskResources {
    entries: RwLock<HashMap<(String, CollectionAddress), TaskEntry>>,
}

impl InMemoryTaskResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded status for a request
    pub fn statuses(&self, request_id: &str) -> HashMap<CollectionAddress, TaskStatus> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .filter(|((id, _), _)| id == request_id)
            .filter_map(|((_, address), entry)| entry.status.map(|s| (address.clone(), s)))
            .collect()
    }

    /// Drop everything stored for a request
    pub fn clear(&self, request_id: &str) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|(id, _), _| id != request_id);
    }

    fn update<F>(&self, request_id: &str, address: &CollectionAddress, f: F)
    where
        F: FnOnce(&mut TaskEntry),
    {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = entries
            .entry((request_id.to_string(), address.clone()))
            .or_default();
        f(entry);
    }
}

impl TaskResources for InMemoryTaskResources {
    fn set_status(&self, request_id: &str, address: &CollectionAddress, status: TaskStatus) {
        self.update(request_id, address, |entry| entry.status = Some(status));
    }

    fn status(&self, request_id: &str, address: &CollectionAddress) -> Option<TaskStatus> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&(request_id.to_string(), address.clone()))
            .and_then(|entry| entry.status)
    }

    fn set_rows(&self, request_id: &str, address: &CollectionAddress, rows: Vec<Row>) {
        self.update(request_id, address, |entry| entry.rows = rows);
    }

    fn rows(&self, request_id: &str, address: &CollectionAddress) -> Vec<Row> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&(request_id.to_string(), address.clone()))
            .map(|entry| entry.rows.clone())
            .unwrap_or_default()
    }
}
