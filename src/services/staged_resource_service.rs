use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::database::entities::{staged_resources, DiffStatus};
use crate::discovery::StagedResourceIndex;
use crate::errors::{DiscoveryError, DiscoveryResult};

/// A resource reported by a monitor run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveredResource {
    pub urn: String,
    pub name: Option<String>,
    pub resource_type: Option<String>,
    pub description: Option<String>,
    pub parent: Option<String>,
    pub source_modified: Option<chrono::DateTime<Utc>>,
    pub classifications: Vec<Value>,
    pub meta: Option<Value>,
}

impl DiscoveredResource {
    pub fn new(urn: impl Into<String>) -> Self {
        Self {
            urn: urn.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    fn into_model(self, monitor_config_id: Option<&str>) -> staged_resources::Model {
        let mut model = staged_resources::Model::new(self.urn);
        model.name = self.name;
        model.resource_type = self.resource_type;
        model.description = self.description;
        model.parent = self.parent;
        model.source_modified = self.source_modified;
        model.classifications = json!(self.classifications);
        model.monitor_config_id = monitor_config_id.map(str::to_string);
        if let Some(meta) = self.meta {
            model.meta = meta;
        }
        model
    }
}

/// What a reconciliation changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileSummary {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: usize,
}

#[derive(Clone)]
pub struct StagedResourceService {
    db: DatabaseConnection,
}

impl StagedResourceService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get_urn(&self, urn: &str) -> DiscoveryResult<Option<staged_resources::Model>> {
        find_urn(&self.db, urn).await
    }

    /// Resources found for `urns`; unknown URNs are left out
    pub async fn get_urn_list(
        &self,
        urns: &[String],
    ) -> DiscoveryResult<Vec<staged_resources::Model>> {
        find_urn_list(&self.db, urns).await
    }

    /// Insert a resource or refresh the descriptive columns of an existing
    /// one; diff state is kept. The resource is linked into its parent's
    /// children when the parent is staged.
    pub async fn stage_resource(
        &self,
        resource: DiscoveredResource,
        monitor_config_id: Option<&str>,
    ) -> DiscoveryResult<staged_resources::Model> {
        if resource.urn.trim().is_empty() {
            return Err(DiscoveryError::Validation("urn must not be empty".to_string()));
        }

        let txn = self.db.begin().await?;
        let urn = resource.urn.clone();
        let parent_urn = resource.parent.clone();

        let mut previous_parent = None;
        let staged = match find_urn(&txn, &urn).await? {
            Some(existing) => {
                previous_parent = existing.parent.clone();
                let mut active: staged_resources::ActiveModel = existing.into();
                active.name = Set(resource.name);
                active.resource_type = Set(resource.resource_type);
                active.description = Set(resource.description);
                active.parent = Set(resource.parent);
                active.source_modified = Set(resource.source_modified);
                active.classifications = Set(json!(resource.classifications));
                if let Some(meta) = resource.meta {
                    active.meta = Set(meta);
                }
                if let Some(id) = monitor_config_id {
                    active.monitor_config_id = Set(Some(id.to_string()));
                }
                active.set_updated_at().update(&txn).await?
            }
            None => {
                resource
                    .into_model(monitor_config_id)
                    .to_insert_model()
                    .insert(&txn)
                    .await?
            }
        };

        if let Some(previous) = previous_parent.filter(|p| Some(p) != parent_urn.as_ref()) {
            if let Some(mut parent) = find_urn(&txn, &previous).await? {
                if parent.remove_child(&urn) {
                    parent.to_diff_update_model().update(&txn).await?;
                    debug!("Unlinked {} from previous parent {}", urn, previous);
                }
            }
        }

        if let Some(parent_urn) = parent_urn {
            if let Some(mut parent) = find_urn(&txn, &parent_urn).await? {
                let before = parent.children.clone();
                parent.add_child(&urn);
                if parent.children != before {
                    parent.to_diff_update_model().update(&txn).await?;
                }
            }
        }

        txn.commit().await?;
        debug!("Staged resource {}", urn);
        Ok(staged)
    }

    /// Mark `urn` as an addition and increment the `addition` counter of
    /// every staged parent, in one transaction.
    pub async fn mark_as_addition(
        &self,
        urn: &str,
        parent_urns: &[String],
    ) -> DiscoveryResult<staged_resources::Model> {
        let txn = self.db.begin().await?;

        let mut urns = vec![urn.to_string()];
        urns.extend(parent_urns.iter().cloned());
        let mut index = StagedResourceIndex::from_models(find_urn_list(&txn, &urns).await?);

        index.mark_as_addition(urn, parent_urns)?;
        save_dirty(&txn, &index, &HashSet::new()).await?;
        txn.commit().await?;

        find_urn(&self.db, urn)
            .await?
            .ok_or_else(|| DiscoveryError::not_found("staged_resource", urn))
    }

    /// Resources of one type, optionally limited to some monitors. Muted
    /// resources are hidden unless `show_hidden`; resources without a diff
    /// status are always returned.
    pub async fn fetch_by_type(
        &self,
        resource_type: &str,
        monitor_config_ids: Option<&[String]>,
        show_hidden: bool,
    ) -> DiscoveryResult<Vec<staged_resources::Model>> {
        info!(
            "Fetching staged resources of type {}, show_hidden={}, monitor_config_ids={:?}",
            resource_type, show_hidden, monitor_config_ids
        );

        let mut query = staged_resources::Entity::find()
            .filter(staged_resources::Column::ResourceType.eq(resource_type));

        if let Some(ids) = monitor_config_ids.filter(|ids| !ids.is_empty()) {
            query = query.filter(staged_resources::Column::MonitorConfigId.is_in(ids.to_vec()));
        }

        if !show_hidden {
            query = query.filter(
                Condition::any()
                    .add(staged_resources::Column::DiffStatus.ne(DiffStatus::Muted.as_str()))
                    .add(staged_resources::Column::DiffStatus.is_null()),
            );
        }

        Ok(query
            .order_by_asc(staged_resources::Column::Urn)
            .all(&self.db)
            .await?)
    }

    /// Fold one monitor run into the staged resources of that monitor.
    ///
    /// New URNs are staged and marked as additions against their parent, as
    /// are URNs marked as removals that were discovered again. Previously
    /// staged URNs of the monitor that were not discovered again
    /// are marked as removals, once. Muted resources are never touched.
    pub async fn reconcile_monitor_results(
        &self,
        monitor_config_id: &str,
        discovered: Vec<DiscoveredResource>,
    ) -> DiscoveryResult<ReconcileSummary> {
        let txn = self.db.begin().await?;

        let existing = staged_resources::Entity::find()
            .filter(staged_resources::Column::MonitorConfigId.eq(monitor_config_id))
            .all(&txn)
            .await?;
        let mut index = StagedResourceIndex::from_models(existing);

        // discovered URNs and parents staged by other monitors
        let outside: Vec<String> = discovered
            .iter()
            .flat_map(|resource| std::iter::once(&resource.urn).chain(resource.parent.iter()))
            .filter(|urn| index.get_urn(urn).is_none())
            .cloned()
            .collect();
        for model in find_urn_list(&txn, &outside).await? {
            index.insert(model);
        }

        let discovered_urns: HashSet<String> =
            discovered.iter().map(|resource| resource.urn.clone()).collect();
        let mut summary = ReconcileSummary::default();
        let mut inserted = HashSet::new();
        let mut additions = Vec::new();

        // stage first so parents discovered in the same run receive rollups
        for resource in discovered {
            let urn = resource.urn.clone();
            let parents: Vec<String> = resource.parent.iter().cloned().collect();
            match index.get_urn(&urn).map(|model| model.get_diff_status()) {
                // back after being marked removed
                Some(Some(DiffStatus::Removal)) => additions.push((urn, parents)),
                Some(_) => summary.unchanged += 1,
                None => {
                    index.stage(resource.into_model(Some(monitor_config_id)));
                    inserted.insert(urn.clone());
                    additions.push((urn, parents));
                }
            }
        }

        for (urn, parents) in additions {
            for parent in &parents {
                index.link_child(parent, &urn);
            }
            index.mark_as_addition(&urn, &parents)?;
            summary.added.push(urn);
        }

        let vanished: Vec<(String, Vec<String>)> = index
            .models()
            .filter(|model| model.monitor_config_id.as_deref() == Some(monitor_config_id))
            .filter(|model| !discovered_urns.contains(&model.urn))
            .filter(|model| {
                !matches!(
                    model.get_diff_status(),
                    Some(DiffStatus::Muted) | Some(DiffStatus::Removal)
                )
            })
            .map(|model| (model.urn.clone(), model.parent.iter().cloned().collect()))
            .collect();

        for (urn, parents) in vanished {
            index.mark_as_removal(&urn, &parents)?;
            summary.removed.push(urn);
        }

        save_dirty(&txn, &index, &inserted).await?;
        txn.commit().await?;

        info!(
            "Reconciled monitor {}: {} added, {} removed, {} unchanged",
            monitor_config_id,
            summary.added.len(),
            summary.removed.len(),
            summary.unchanged
        );
        Ok(summary)
    }
}

async fn find_urn<C>(conn: &C, urn: &str) -> DiscoveryResult<Option<staged_resources::Model>>
where
    C: ConnectionTrait,
{
    Ok(staged_resources::Entity::find_by_id(urn.to_string())
        .one(conn)
        .await?)
}

async fn find_urn_list<C>(conn: &C, urns: &[String]) -> DiscoveryResult<Vec<staged_resources::Model>>
where
    C: ConnectionTrait,
{
    if urns.is_empty() {
        return Ok(Vec::new());
    }
    Ok(staged_resources::Entity::find()
        .filter(staged_resources::Column::Urn.is_in(urns.to_vec()))
        .all(conn)
        .await?)
}

/// Write back every changed resource; URNs in `inserted` are new rows
async fn save_dirty<C>(
    conn: &C,
    index: &StagedResourceIndex,
    inserted: &HashSet<String>,
) -> DiscoveryResult<()>
where
    C: ConnectionTrait,
{
    for model in index.dirty_models() {
        if inserted.contains(&model.urn) {
            model.to_insert_model().insert(conn).await?;
        } else {
            model.to_diff_update_model().update(conn).await?;
        }
    }
    Ok(())
}
