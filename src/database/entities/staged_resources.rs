use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

pub use super::common_types::DiffStatus;
use super::common_types::string_list;

/// A resource (database, schema, table, field) found by a discovery monitor
/// and awaiting review.
///
/// Parent and child links are soft URN references, not foreign keys. The
/// `child_diff_statuses` object counts, per diff status, how many children
/// have been marked with it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "staged_resources")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub urn: String,
    pub name: Option<String>,
    #[sea_orm(indexed)]
    pub resource_type: Option<String>,
    pub description: Option<String>,
    #[sea_orm(indexed)]
    pub monitor_config_id: Option<String>,
    pub source_modified: Option<ChronoDateTimeUtc>,
    #[sea_orm(column_type = "JsonBinary")]
    pub classifications: serde_json::Value, // [{label, score, ...}, ...]
    #[sea_orm(column_type = "JsonBinary")]
    pub user_assigned_data_categories: serde_json::Value,
    #[sea_orm(column_type = "JsonBinary")]
    pub children: serde_json::Value, // [urn, ...]
    pub parent: Option<String>,
    pub diff_status: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub child_diff_statuses: serde_json::Value, // {status: count}
    #[sea_orm(column_type = "JsonBinary")]
    pub meta: serde_json::Value,
    #[sea_orm(column_type = "JsonBinary")]
    pub data_uses: serde_json::Value,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub fn new(urn: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            urn: Set(urn.into()),
            name: ActiveValue::NotSet,
            resource_type: ActiveValue::NotSet,
            description: ActiveValue::NotSet,
            monitor_config_id: ActiveValue::NotSet,
            source_modified: ActiveValue::NotSet,
            classifications: Set(json!([])),
            user_assigned_data_categories: Set(json!([])),
            children: Set(json!([])),
            parent: ActiveValue::NotSet,
            diff_status: ActiveValue::NotSet,
            child_diff_statuses: Set(json!({})),
            meta: Set(json!({})),
            data_uses: Set(json!([])),
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
    /// A detached resource with empty collections, as a fresh insert would store it
    pub fn new(urn: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            urn: urn.into(),
            name: None,
            resource_type: None,
            description: None,
            monitor_config_id: None,
            source_modified: None,
            classifications: json!([]),
            user_assigned_data_categories: json!([]),
            children: json!([]),
            parent: None,
            diff_status: None,
            child_diff_statuses: json!({}),
            meta: json!({}),
            data_uses: json!([]),
            created_at: now,
            updated_at: now,
        }
    }

    /// Active model with every column set, for inserting a detached resource
    pub fn to_insert_model(&self) -> ActiveModel {
        ActiveModel {
            urn: Set(self.urn.clone()),
            name: Set(self.name.clone()),
            resource_type: Set(self.resource_type.clone()),
            description: Set(self.description.clone()),
            monitor_config_id: Set(self.monitor_config_id.clone()),
            source_modified: Set(self.source_modified),
            classifications: Set(self.classifications.clone()),
            user_assigned_data_categories: Set(self.user_assigned_data_categories.clone()),
            children: Set(self.children.clone()),
            parent: Set(self.parent.clone()),
            diff_status: Set(self.diff_status.clone()),
            child_diff_statuses: Set(self.child_diff_statuses.clone()),
            meta: Set(self.meta.clone()),
            data_uses: Set(self.data_uses.clone()),
            created_at: Set(self.created_at),
            updated_at: Set(self.updated_at),
        }
    }

    /// Active model that writes back the diff-tracking columns only
    pub fn to_diff_update_model(&self) -> ActiveModel {
        let mut active: ActiveModel = self.clone().into();
        active.diff_status = Set(self.diff_status.clone());
        active.child_diff_statuses = Set(self.child_diff_statuses.clone());
        active.children = Set(self.children.clone());
        active.set_updated_at()
    }

    pub fn get_diff_status(&self) -> Option<DiffStatus> {
        self.diff_status.as_deref().and_then(DiffStatus::from_str)
    }

    pub fn set_diff_status(&mut self, status: DiffStatus) {
        self.diff_status = Some(status.as_str().to_string());
    }

    pub fn is_muted(&self) -> bool {
        self.get_diff_status() == Some(DiffStatus::Muted)
    }

    pub fn children(&self) -> Vec<String> {
        string_list(&self.children)
    }

    pub fn data_uses(&self) -> Vec<String> {
        string_list(&self.data_uses)
    }

    pub fn user_assigned_data_categories(&self) -> Vec<String> {
        string_list(&self.user_assigned_data_categories)
    }

    pub fn classifications(&self) -> Vec<serde_json::Value> {
        self.classifications.as_array().cloned().unwrap_or_default()
    }

    /// Per-status child counters; malformed entries are ignored
    pub fn child_diff_statuses(&self) -> BTreeMap<String, i64> {
        self.child_diff_statuses
            .as_object()
            .map(|counts| {
                counts
                    .iter()
                    .filter_map(|(status, count)| count.as_i64().map(|c| (status.clone(), c)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn child_diff_status_count(&self, status: DiffStatus) -> i64 {
        self.child_diff_statuses()
            .get(status.as_str())
            .copied()
            .unwrap_or(0)
    }

    /// Increment the counter for `status`, starting from zero
    pub fn add_child_diff_status(&mut self, status: DiffStatus) {
        let mut counts = self.child_diff_statuses();
        *counts.entry(status.as_str().to_string()).or_insert(0) += 1;
        self.child_diff_statuses = json!(counts);
    }

    /// Drop `urn` from the children; false if it was not listed
    pub fn remove_child(&mut self, urn: &str) -> bool {
        let mut children = self.children();
        let before = children.len();
        children.retain(|child| child != urn);
        if children.len() == before {
            return false;
        }
        self.children = json!(children);
        true
    }

    pub fn add_child(&mut self, urn: &str) {
        let mut children = self.children();
        if !children.iter().any(|child| child == urn) {
            children.push(urn.to_string());
            self.children = json!(children);
        }
    }
}
