//! Monitor config and monitor execution service tests

use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use datagate::database::entities::{MonitorExecutionStatus, MonitorFrequency};
use datagate::database::{create_tables, establish_connection};
use datagate::discovery::ClassifyParams;
use datagate::services::{
    MonitorConfigCreateRequest, MonitorConfigService, MonitorConfigUpdateRequest,
    MonitorExecutionService,
};
use sea_orm::DatabaseConnection;
use serde_json::json;

async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = establish_connection("sqlite::memory:").await?;
    create_tables(&db).await?;
    Ok(db)
}

fn start_date() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2024-05-14T12:00:00+00:00").expect("valid date")
}

fn request(key: &str) -> MonitorConfigCreateRequest {
    let mut request = MonitorConfigCreateRequest::new(key, "bq_conn");
    request.name = Some(format!("{} monitor", key));
    request
}

#[tokio::test]
async fn test_create_derives_trigger() -> Result<()> {
    let db = setup_test_db().await?;
    let service = MonitorConfigService::new(db);

    let mut create = request("bq_monitor");
    create.databases = vec!["prod".to_string()];
    create.execution_frequency = Some(MonitorFrequency::Weekly);
    create.execution_start_date = Some(start_date());
    create.classify_params = Some(ClassifyParams {
        num_samples: Some(25),
        num_threads: None,
    });
    let config = service.create(create).await?;

    assert_eq!(config.execution_frequency(), MonitorFrequency::Weekly);
    assert_eq!(config.execution_start_date(), Some(start_date()));
    let trigger = config.monitor_execution_trigger.clone().expect("trigger stored");
    assert_eq!(trigger["day_of_week"], json!(1));
    assert_eq!(trigger["hour"], json!(12));
    assert_eq!(trigger["timezone"], json!("UTC"));
    assert_eq!(config.databases(), vec!["prod".to_string()]);
    assert_eq!(config.classify_params().and_then(|p| p.num_samples), Some(25));
    assert!(config.enabled);
    Ok(())
}

#[tokio::test]
async fn test_create_without_schedule() -> Result<()> {
    let db = setup_test_db().await?;
    let service = MonitorConfigService::new(db);

    let mut create = request("manual");
    create.execution_frequency = Some(MonitorFrequency::Daily);
    let config = service.create(create).await?;

    assert_eq!(config.monitor_execution_trigger, None);
    assert_eq!(config.execution_frequency(), MonitorFrequency::NotScheduled);
    Ok(())
}

#[tokio::test]
async fn test_create_rejects_invalid_input() -> Result<()> {
    let db = setup_test_db().await?;
    let service = MonitorConfigService::new(db);

    let mut both = request("both");
    both.databases = vec!["prod".to_string()];
    both.excluded_databases = vec!["scratch".to_string()];
    let err = service.create(both).await.unwrap_err();
    assert!(err.is_validation_error());
    assert!(err
        .to_string()
        .contains("Both `databases` and `excluded_databases` cannot be set at the same time."));

    let err = service.create(request("  ")).await.unwrap_err();
    assert!(err.is_validation_error());

    service.create(request("dup")).await?;
    let err = service.create(request("dup")).await.unwrap_err();
    assert!(err.is_validation_error());

    let mut zero = request("zero");
    zero.classify_params = Some(ClassifyParams {
        num_samples: Some(0),
        num_threads: None,
    });
    assert!(service.create(zero).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_update_checks_merged_scope() -> Result<()> {
    let db = setup_test_db().await?;
    let service = MonitorConfigService::new(db);

    let mut create = request("bq_monitor");
    create.databases = vec!["prod".to_string()];
    service.create(create).await?;

    let err = service
        .update(
            "bq_monitor",
            MonitorConfigUpdateRequest {
                excluded_databases: Some(vec!["scratch".to_string()]),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_validation_error());

    let config = service
        .update(
            "bq_monitor",
            MonitorConfigUpdateRequest {
                databases: Some(Vec::new()),
                excluded_databases: Some(vec!["scratch".to_string()]),
                ..Default::default()
            },
        )
        .await?;
    assert!(config.databases().is_empty());
    assert_eq!(config.excluded_databases(), vec!["scratch".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_update_schedule() -> Result<()> {
    let db = setup_test_db().await?;
    let service = MonitorConfigService::new(db);

    let mut create = request("bq_monitor");
    create.execution_frequency = Some(MonitorFrequency::Monthly);
    create.execution_start_date = Some(start_date());
    let config = service.create(create).await?;
    assert_eq!(config.execution_trigger().and_then(|t| t.day), Some(14));

    // frequency alone reuses the stored start date
    let config = service
        .update(
            "bq_monitor",
            MonitorConfigUpdateRequest {
                execution_frequency: Some(MonitorFrequency::Weekly),
                ..Default::default()
            },
        )
        .await?;
    let trigger = config.execution_trigger().expect("trigger stored");
    assert_eq!(trigger.day_of_week, Some(1));
    assert_eq!(trigger.day, None);

    // unrelated updates keep the trigger
    let config = service
        .update(
            "bq_monitor",
            MonitorConfigUpdateRequest {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .await?;
    assert!(!config.enabled);
    assert_eq!(config.execution_frequency(), MonitorFrequency::Weekly);

    let config = service
        .update(
            "bq_monitor",
            MonitorConfigUpdateRequest {
                execution_frequency: Some(MonitorFrequency::NotScheduled),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(config.monitor_execution_trigger, None);
    assert_eq!(config.execution_start_date(), None);
    Ok(())
}

#[tokio::test]
async fn test_get_list_and_delete() -> Result<()> {
    let db = setup_test_db().await?;
    let configs = MonitorConfigService::new(db.clone());
    let executions = MonitorExecutionService::new(db);

    configs.create(request("zeta")).await?;
    configs.create(request("alpha")).await?;
    executions.start("zeta").await?;

    let keys: Vec<String> = configs.list().await?.into_iter().map(|c| c.key).collect();
    assert_eq!(keys, vec!["alpha", "zeta"]);

    assert!(configs.get_by_key("missing").await.unwrap_err().is_not_found());
    assert!(configs.delete("missing").await.unwrap_err().is_not_found());

    configs.delete("zeta").await?;
    assert!(configs.get_by_key("zeta").await.unwrap_err().is_not_found());
    assert!(executions.list_for_monitor("zeta").await?.is_empty());
    assert_eq!(configs.list().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_execution_lifecycle() -> Result<()> {
    let db = setup_test_db().await?;
    let configs = MonitorConfigService::new(db.clone());
    let executions = MonitorExecutionService::new(db);

    assert!(executions.start("bq_monitor").await.unwrap_err().is_not_found());

    configs.create(request("bq_monitor")).await?;
    let run = executions.start("bq_monitor").await?;
    assert_eq!(run.get_status(), Some(MonitorExecutionStatus::InProgress));
    assert!(!run.is_finished());

    let done = executions
        .complete(&run.id, vec!["ci_1".to_string(), "ci_2".to_string()])
        .await?;
    assert_eq!(done.get_status(), Some(MonitorExecutionStatus::Completed));
    assert_eq!(done.classification_instances(), vec!["ci_1", "ci_2"]);

    let config = configs.get_by_key("bq_monitor").await?;
    assert!(config.last_monitored.is_some());

    // a finished run cannot be finished again
    assert!(executions
        .fail(&run.id)
        .await
        .unwrap_err()
        .is_validation_error());

    let failed = executions.start("bq_monitor").await?;
    let failed = executions.fail(&failed.id).await?;
    assert_eq!(failed.get_status(), Some(MonitorExecutionStatus::Errored));
    assert!(failed.is_finished());

    assert_eq!(executions.get(&run.id).await?.id, run.id);
    assert!(executions.get("nope").await.unwrap_err().is_not_found());
    assert_eq!(executions.list_for_monitor("bq_monitor").await?.len(), 2);
    Ok(())
}
