use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub use super::common_types::MonitorExecutionStatus;
use super::common_types::string_list;

/// One run of a discovery monitor
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monitor_executions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(indexed)]
    pub monitor_config_key: String,
    pub status: Option<String>,
    pub started: Option<ChronoDateTimeUtc>,
    pub completed: Option<ChronoDateTimeUtc>,
    #[sea_orm(column_type = "JsonBinary")]
    pub classification_instances: serde_json::Value, // [id, ...]
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::monitor_configs::Entity",
        from = "Column::MonitorConfigKey",
        to = "super::monitor_configs::Column::Key"
    )]
    MonitorConfigs,
}

impl Related<super::monitor_configs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonitorConfigs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub fn new(monitor_config_key: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Set(uuid::Uuid::new_v4().to_string()),
            monitor_config_key: Set(monitor_config_key.into()),
            status: Set(Some(MonitorExecutionStatus::InProgress.into())),
            started: Set(Some(now)),
            completed: Set(None),
            classification_instances: Set(json!([])),
            created_at: Set(now),
            updated_at: Set(now),
        }
    }

    pub fn set_updated_at(mut self) -> Self {
        self.updated_at = Set(chrono::Utc::now());
        self
    }

    pub fn set_completed(mut self, classification_instances: Vec<String>) -> Self {
        self.status = Set(Some(MonitorExecutionStatus::Completed.into()));
        self.completed = Set(Some(chrono::Utc::now()));
        self.classification_instances = Set(json!(classification_instances));
        self
    }

    pub fn set_errored(mut self) -> Self {
        self.status = Set(Some(MonitorExecutionStatus::Errored.into()));
        self.completed = Set(Some(chrono::Utc::now()));
        self
    }
}

impl Model {
    pub fn get_status(&self) -> Option<MonitorExecutionStatus> {
        self.status.as_deref().and_then(MonitorExecutionStatus::from_str)
    }

    pub fn classification_instances(&self) -> Vec<String> {
        string_list(&self.classification_instances)
    }

    pub fn is_finished(&self) -> bool {
        self.completed.is_some()
    }
}
