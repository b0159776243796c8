use chrono::{DateTime, FixedOffset};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub use super::common_types::MonitorFrequency;
use super::common_types::string_list;
use crate::discovery::trigger::{ClassifyParams, ExecutionTrigger};

/// Discovery monitor scoped to one connection.
///
/// `databases` and `excluded_databases` are mutually exclusive; the
/// frequency and start date shown to users are derived from
/// `monitor_execution_trigger` on read.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monitor_configs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub key: String,
    pub name: Option<String>,
    pub connection_key: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub databases: serde_json::Value,
    #[sea_orm(column_type = "JsonBinary")]
    pub excluded_databases: serde_json::Value,
    #[sea_orm(column_type = "JsonBinary")]
    pub monitor_execution_trigger: Option<serde_json::Value>,
    #[sea_orm(column_type = "JsonBinary")]
    pub classify_params: Option<serde_json::Value>,
    #[sea_orm(column_type = "JsonBinary")]
    pub datasource_params: Option<serde_json::Value>,
    pub last_monitored: Option<ChronoDateTimeUtc>,
    pub enabled: bool,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::monitor_executions::Entity")]
    MonitorExecutions,
}

impl Related<super::monitor_executions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonitorExecutions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        Self {
            id: ActiveValue::NotSet,
            key: ActiveValue::NotSet,
            name: ActiveValue::NotSet,
            connection_key: ActiveValue::NotSet,
            databases: Set(json!([])),
            excluded_databases: Set(json!([])),
            monitor_execution_trigger: Set(None),
            classify_params: Set(None),
            datasource_params: Set(None),
            last_monitored: Set(None),
            enabled: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
    }

    pub fn set_updated_at(mut self) -> Self {
        self.updated_at = Set(chrono::Utc::now());
        self
    }
}

impl Model {
    pub fn databases(&self) -> Vec<String> {
        string_list(&self.databases)
    }

    pub fn excluded_databases(&self) -> Vec<String> {
        string_list(&self.excluded_databases)
    }

    /// Stored trigger; an unreadable value counts as no trigger
    pub fn execution_trigger(&self) -> Option<ExecutionTrigger> {
        self.monitor_execution_trigger
            .as_ref()
            .and_then(|value| ExecutionTrigger::from_json(value).ok())
    }

    pub fn execution_frequency(&self) -> MonitorFrequency {
        self.execution_trigger()
            .map(|trigger| trigger.frequency())
            .unwrap_or(MonitorFrequency::NotScheduled)
    }

    pub fn execution_start_date(&self) -> Option<DateTime<FixedOffset>> {
        self.execution_trigger().map(|trigger| trigger.start_date)
    }

    pub fn classify_params(&self) -> Option<ClassifyParams> {
        self.classify_params
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(trigger: Option<serde_json::Value>) -> Model {
        let now = chrono::Utc::now();
        Model {
            id: 1,
            key: "bq_monitor".to_string(),
            name: None,
            connection_key: "bq".to_string(),
            databases: json!(["prod", "staging"]),
            excluded_databases: json!([]),
            monitor_execution_trigger: trigger,
            classify_params: Some(json!({"num_samples": 25})),
            datasource_params: None,
            last_monitored: None,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_derived_frequency_and_start_date() {
        let start = DateTime::parse_from_rfc3339("2024-05-14T12:00:00+00:00").unwrap();
        let trigger = ExecutionTrigger::derive(MonitorFrequency::Monthly, start).unwrap();
        let config = model(Some(trigger.to_json().unwrap()));

        assert_eq!(config.execution_frequency(), MonitorFrequency::Monthly);
        assert_eq!(config.execution_start_date(), Some(start));
        assert_eq!(config.databases(), vec!["prod".to_string(), "staging".to_string()]);
        assert_eq!(config.classify_params().unwrap().num_samples, Some(25));
    }

    #[test]
    fn test_missing_trigger_is_not_scheduled() {
        let config = model(None);
        assert_eq!(config.execution_frequency(), MonitorFrequency::NotScheduled);
        assert_eq!(config.execution_start_date(), None);
        assert!(config.excluded_databases().is_empty());
    }
}
