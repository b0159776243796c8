pub mod monitor_config_service;
pub mod monitor_execution_service;
pub mod staged_resource_service;

pub use monitor_config_service::{
    MonitorConfigCreateRequest, MonitorConfigService, MonitorConfigUpdateRequest,
};
pub use monitor_execution_service::MonitorExecutionService;
pub use staged_resource_service::{DiscoveredResource, ReconcileSummary, StagedResourceService};
