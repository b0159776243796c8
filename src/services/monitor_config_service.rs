use chrono::{DateTime, FixedOffset};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde_json::{json, Value};
use tracing::info;

use crate::database::entities::{monitor_configs, monitor_executions, MonitorFrequency};
use crate::discovery::{derive_trigger_change, ClassifyParams, TriggerChange};
use crate::errors::{DiscoveryError, DiscoveryResult};

const SCOPE_CONFLICT: &str = "Both `databases` and `excluded_databases` cannot be set at the same time.";

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfigCreateRequest {
    pub key: String,
    pub name: Option<String>,
    pub connection_key: String,
    pub databases: Vec<String>,
    pub excluded_databases: Vec<String>,
    pub execution_frequency: Option<MonitorFrequency>,
    pub execution_start_date: Option<DateTime<FixedOffset>>,
    pub classify_params: Option<ClassifyParams>,
    pub datasource_params: Option<Value>,
    pub enabled: bool,
}

impl MonitorConfigCreateRequest {
    pub fn new(key: impl Into<String>, connection_key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: None,
            connection_key: connection_key.into(),
            databases: Vec::new(),
            excluded_databases: Vec::new(),
            execution_frequency: None,
            execution_start_date: None,
            classify_params: None,
            datasource_params: None,
            enabled: true,
        }
    }
}

/// Partial update; `None` leaves the stored value as is
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorConfigUpdateRequest {
    pub name: Option<String>,
    pub databases: Option<Vec<String>>,
    pub excluded_databases: Option<Vec<String>>,
    pub execution_frequency: Option<MonitorFrequency>,
    pub execution_start_date: Option<DateTime<FixedOffset>>,
    pub classify_params: Option<ClassifyParams>,
    pub datasource_params: Option<Value>,
    pub enabled: Option<bool>,
}

fn validate_scope(databases: &[String], excluded_databases: &[String]) -> DiscoveryResult<()> {
    if !databases.is_empty() && !excluded_databases.is_empty() {
        return Err(DiscoveryError::Validation(SCOPE_CONFLICT.to_string()));
    }
    Ok(())
}

fn classify_params_json(params: &ClassifyParams) -> DiscoveryResult<Value> {
    params.validate()?;
    Ok(serde_json::to_value(params)?)
}

#[derive(Clone)]
pub struct MonitorConfigService {
    db: DatabaseConnection,
}

impl MonitorConfigService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        request: MonitorConfigCreateRequest,
    ) -> DiscoveryResult<monitor_configs::Model> {
        if request.key.trim().is_empty() {
            return Err(DiscoveryError::Validation("key must not be empty".to_string()));
        }
        if request.connection_key.trim().is_empty() {
            return Err(DiscoveryError::Validation(
                "connection_key must not be empty".to_string(),
            ));
        }
        validate_scope(&request.databases, &request.excluded_databases)?;

        if self.find_by_key(&request.key).await?.is_some() {
            return Err(DiscoveryError::Validation(format!(
                "Monitor config with key '{}' already exists",
                request.key
            )));
        }

        let trigger = match derive_trigger_change(
            request.execution_frequency,
            request.execution_start_date,
        ) {
            TriggerChange::Set(trigger) => Some(trigger.to_json()?),
            TriggerChange::Keep | TriggerChange::Clear => None,
        };
        let classify_params = request
            .classify_params
            .as_ref()
            .map(classify_params_json)
            .transpose()?;

        let mut config = monitor_configs::ActiveModel::new();
        config.key = Set(request.key.clone());
        config.name = Set(request.name);
        config.connection_key = Set(request.connection_key);
        config.databases = Set(json!(request.databases));
        config.excluded_databases = Set(json!(request.excluded_databases));
        config.monitor_execution_trigger = Set(trigger);
        config.classify_params = Set(classify_params);
        config.datasource_params = Set(request.datasource_params);
        config.enabled = Set(request.enabled);

        let config = config.insert(&self.db).await?;
        info!(
            "Created monitor config {} ({})",
            config.key,
            config.execution_frequency().as_str()
        );
        Ok(config)
    }

    /// Apply a partial update. The include/exclude check runs against the
    /// merged lists, so setting one list while the other is stored fails.
    ///
    /// A frequency or start date given alone is combined with the stored
    /// trigger's counterpart.
    pub async fn update(
        &self,
        key: &str,
        request: MonitorConfigUpdateRequest,
    ) -> DiscoveryResult<monitor_configs::Model> {
        let existing = self.get_by_key(key).await?;

        let databases = request
            .databases
            .clone()
            .unwrap_or_else(|| existing.databases());
        let excluded_databases = request
            .excluded_databases
            .clone()
            .unwrap_or_else(|| existing.excluded_databases());
        validate_scope(&databases, &excluded_databases)?;

        let trigger_change = if request.execution_frequency.is_none()
            && request.execution_start_date.is_none()
        {
            TriggerChange::Keep
        } else {
            let stored = existing.execution_trigger();
            derive_trigger_change(
                request
                    .execution_frequency
                    .or_else(|| stored.as_ref().map(|trigger| trigger.frequency())),
                request
                    .execution_start_date
                    .or_else(|| stored.as_ref().map(|trigger| trigger.start_date)),
            )
        };

        let mut config: monitor_configs::ActiveModel = existing.into();
        if let Some(name) = request.name {
            config.name = Set(Some(name));
        }
        if request.databases.is_some() {
            config.databases = Set(json!(databases));
        }
        if request.excluded_databases.is_some() {
            config.excluded_databases = Set(json!(excluded_databases));
        }
        match trigger_change {
            TriggerChange::Keep => {}
            TriggerChange::Clear => config.monitor_execution_trigger = Set(None),
            TriggerChange::Set(trigger) => {
                config.monitor_execution_trigger = Set(Some(trigger.to_json()?))
            }
        }
        if let Some(params) = request.classify_params.as_ref() {
            config.classify_params = Set(Some(classify_params_json(params)?));
        }
        if let Some(params) = request.datasource_params {
            config.datasource_params = Set(Some(params));
        }
        if let Some(enabled) = request.enabled {
            config.enabled = Set(enabled);
        }

        let config = config.set_updated_at().update(&self.db).await?;
        info!("Updated monitor config {}", config.key);
        Ok(config)
    }

    pub async fn get_by_key(&self, key: &str) -> DiscoveryResult<monitor_configs::Model> {
        self.find_by_key(key)
            .await?
            .ok_or_else(|| DiscoveryError::not_found("monitor_config", key))
    }

    pub async fn list(&self) -> DiscoveryResult<Vec<monitor_configs::Model>> {
        Ok(monitor_configs::Entity::find()
            .order_by_asc(monitor_configs::Column::Key)
            .all(&self.db)
            .await?)
    }

    /// Delete a monitor together with its executions
    pub async fn delete(&self, key: &str) -> DiscoveryResult<()> {
        let txn = self.db.begin().await?;

        let config = monitor_configs::Entity::find()
            .filter(monitor_configs::Column::Key.eq(key))
            .one(&txn)
            .await?
            .ok_or_else(|| DiscoveryError::not_found("monitor_config", key))?;

        let executions = monitor_executions::Entity::delete_many()
            .filter(monitor_executions::Column::MonitorConfigKey.eq(key))
            .exec(&txn)
            .await?;
        config.delete(&txn).await?;
        txn.commit().await?;

        info!(
            "Deleted monitor config {} and {} executions",
            key, executions.rows_affected
        );
        Ok(())
    }

    async fn find_by_key(&self, key: &str) -> DiscoveryResult<Option<monitor_configs::Model>> {
        Ok(monitor_configs::Entity::find()
            .filter(monitor_configs::Column::Key.eq(key))
            .one(&self.db)
            .await?)
    }
}
