pub mod common_types;
pub mod monitor_configs;
pub mod monitor_executions;
pub mod staged_resources;

pub use common_types::{DiffStatus, MonitorExecutionStatus, MonitorFrequency};
