use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::{info, warn};

use crate::database::entities::{monitor_configs, monitor_executions};
use crate::errors::{DiscoveryError, DiscoveryResult};

/// Records the runs of discovery monitors
#[derive(Clone)]
pub struct MonitorExecutionService {
    db: DatabaseConnection,
}

impl MonitorExecutionService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn start(&self, monitor_config_key: &str) -> DiscoveryResult<monitor_executions::Model> {
        let config = monitor_configs::Entity::find()
            .filter(monitor_configs::Column::Key.eq(monitor_config_key))
            .one(&self.db)
            .await?
            .ok_or_else(|| DiscoveryError::not_found("monitor_config", monitor_config_key))?;

        let execution = monitor_executions::ActiveModel::new(config.key.clone())
            .insert(&self.db)
            .await?;
        info!("Started monitor execution {} for {}", execution.id, config.key);
        Ok(execution)
    }

    /// Finish a run and bump the monitor's `last_monitored`
    pub async fn complete(
        &self,
        id: &str,
        classification_instances: Vec<String>,
    ) -> DiscoveryResult<monitor_executions::Model> {
        let txn = self.db.begin().await?;

        let execution = find_unfinished(&txn, id).await?;
        let execution = monitor_executions::ActiveModel::from(execution)
            .set_completed(classification_instances)
            .set_updated_at()
            .update(&txn)
            .await?;

        let config = monitor_configs::Entity::find()
            .filter(monitor_configs::Column::Key.eq(execution.monitor_config_key.as_str()))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                DiscoveryError::not_found("monitor_config", execution.monitor_config_key.as_str())
            })?;
        let mut config: monitor_configs::ActiveModel = config.into();
        config.last_monitored = Set(execution.completed);
        config.set_updated_at().update(&txn).await?;

        txn.commit().await?;
        info!(
            "Completed monitor execution {} with {} classification instances",
            execution.id,
            execution.classification_instances().len()
        );
        Ok(execution)
    }

    pub async fn fail(&self, id: &str) -> DiscoveryResult<monitor_executions::Model> {
        let txn = self.db.begin().await?;
        let execution = find_unfinished(&txn, id).await?;
        let execution = monitor_executions::ActiveModel::from(execution)
            .set_errored()
            .set_updated_at()
            .update(&txn)
            .await?;
        txn.commit().await?;

        warn!("Monitor execution {} errored", execution.id);
        Ok(execution)
    }

    pub async fn get(&self, id: &str) -> DiscoveryResult<monitor_executions::Model> {
        monitor_executions::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| DiscoveryError::not_found("monitor_execution", id))
    }

    /// Runs of one monitor, most recent first
    pub async fn list_for_monitor(
        &self,
        monitor_config_key: &str,
    ) -> DiscoveryResult<Vec<monitor_executions::Model>> {
        Ok(monitor_executions::Entity::find()
            .filter(monitor_executions::Column::MonitorConfigKey.eq(monitor_config_key))
            .order_by_desc(monitor_executions::Column::Started)
            .all(&self.db)
            .await?)
    }
}

async fn find_unfinished<C>(conn: &C, id: &str) -> DiscoveryResult<monitor_executions::Model>
where
    C: sea_orm::ConnectionTrait,
{
    let execution = monitor_executions::Entity::find_by_id(id.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| DiscoveryError::not_found("monitor_execution", id))?;
    if execution.is_finished() {
        return Err(DiscoveryError::Validation(format!(
            "Monitor execution {} has already finished",
            id
        )));
    }
    Ok(execution)
}
