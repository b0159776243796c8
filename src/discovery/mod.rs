//! Detection and discovery: monitor scheduling and staged resource diffing.

pub mod resource_index;
pub mod trigger;

pub use resource_index::StagedResourceIndex;
pub use trigger::{derive_trigger_change, ClassifyParams, ExecutionTrigger, TriggerChange};
