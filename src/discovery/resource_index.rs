use indexmap::{IndexMap, IndexSet};
use tracing::{debug, warn};

use crate::database::entities::staged_resources;
use crate::database::entities::DiffStatus;
use crate::errors::{DiscoveryError, DiscoveryResult};

/// In-memory view of a batch of staged resources, keyed by URN.
///
/// Lookups and diff marking behave like their database-backed counterparts
/// in [`crate::services::StagedResourceService`]; changed resources are
/// tracked so the caller can write them back in one go.
#[derive(Debug, Clone, Default)]
pub struct StagedResourceIndex {
    resources: IndexMap<String, staged_resources::Model>,
    dirty: IndexSet<String>,
}

impl StagedResourceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_models(models: impl IntoIterator<Item = staged_resources::Model>) -> Self {
        let mut index = Self::new();
        for model in models {
            index.resources.insert(model.urn.clone(), model);
        }
        index
    }

    /// Add a resource as loaded, without marking it changed
    pub fn insert(&mut self, model: staged_resources::Model) {
        self.resources.insert(model.urn.clone(), model);
    }

    pub fn models(&self) -> impl Iterator<Item = &staged_resources::Model> {
        self.resources.values()
    }

    /// Add or replace a resource and mark it changed
    pub fn stage(&mut self, model: staged_resources::Model) {
        self.dirty.insert(model.urn.clone());
        self.resources.insert(model.urn.clone(), model);
    }

    pub fn get_urn(&self, urn: &str) -> Option<&staged_resources::Model> {
        self.resources.get(urn)
    }

    /// Resources found for `urns`, in request order; unknown URNs are left out
    pub fn get_urn_list<'a, I>(&self, urns: I) -> Vec<&staged_resources::Model>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen = IndexSet::new();
        urns.into_iter()
            .filter(|urn| seen.insert(*urn))
            .filter_map(|urn| self.resources.get(urn))
            .collect()
    }

    /// Mark `urn` as an addition and bump the `addition` counter of every
    /// known parent. Repeated calls keep incrementing.
    pub fn mark_as_addition<S: AsRef<str>>(
        &mut self,
        urn: &str,
        parent_urns: &[S],
    ) -> DiscoveryResult<()> {
        self.mark(urn, DiffStatus::Addition, parent_urns)
    }

    pub fn mark_as_removal<S: AsRef<str>>(
        &mut self,
        urn: &str,
        parent_urns: &[S],
    ) -> DiscoveryResult<()> {
        self.mark(urn, DiffStatus::Removal, parent_urns)
    }

    fn mark<S: AsRef<str>>(
        &mut self,
        urn: &str,
        status: DiffStatus,
        parent_urns: &[S],
    ) -> DiscoveryResult<()> {
        let resource = self
            .resources
            .get_mut(urn)
            .ok_or_else(|| DiscoveryError::not_found("staged_resource", urn))?;
        resource.set_diff_status(status);
        self.dirty.insert(urn.to_string());

        for parent_urn in parent_urns {
            let parent_urn = parent_urn.as_ref();
            match self.resources.get_mut(parent_urn) {
                Some(parent) => {
                    parent.add_child_diff_status(status);
                    self.dirty.insert(parent_urn.to_string());
                }
                None => warn!(
                    "Parent {} of {} is not staged, skipping {} rollup",
                    parent_urn,
                    urn,
                    status.as_str()
                ),
            }
        }

        debug!("Marked {} as {}", urn, status.as_str());
        Ok(())
    }

    /// Record `child_urn` under a known parent; false if the parent is not indexed
    pub fn link_child(&mut self, parent_urn: &str, child_urn: &str) -> bool {
        match self.resources.get_mut(parent_urn) {
            Some(parent) => {
                let before = parent.children.clone();
                parent.add_child(child_urn);
                if parent.children != before {
                    self.dirty.insert(parent_urn.to_string());
                }
                true
            }
            None => false,
        }
    }

    pub fn is_dirty(&self, urn: &str) -> bool {
        self.dirty.contains(urn)
    }

    /// Changed resources, in the order they were first changed
    pub fn dirty_models(&self) -> Vec<&staged_resources::Model> {
        self.dirty
            .iter()
            .filter_map(|urn| self.resources.get(urn))
            .collect()
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> StagedResourceIndex {
        StagedResourceIndex::from_models(vec![
            staged_resources::Model::new("db"),
            staged_resources::Model::new("db.schema"),
            staged_resources::Model::new("db.schema.table"),
        ])
    }

    #[test]
    fn test_lookup_missing_is_absent() {
        let index = index();
        assert!(index.get_urn("db.schema").is_some());
        assert!(index.get_urn("nope").is_none());

        let found: Vec<&str> = index
            .get_urn_list(["db.schema.table", "nope", "db", "db"])
            .into_iter()
            .map(|m| m.urn.as_str())
            .collect();
        assert_eq!(found, vec!["db.schema.table", "db"]);
        assert!(index.get_urn_list(Vec::<&str>::new()).is_empty());
    }

    #[test]
    fn test_mark_as_addition_rolls_up_to_known_parents() {
        let mut index = index();
        index
            .mark_as_addition("db.schema.table", &["db.schema", "db", "unknown"])
            .unwrap();

        let table = index.get_urn("db.schema.table").unwrap();
        assert_eq!(table.get_diff_status(), Some(DiffStatus::Addition));
        for parent in ["db.schema", "db"] {
            let parent = index.get_urn(parent).unwrap();
            assert_eq!(parent.child_diff_status_count(DiffStatus::Addition), 1);
        }
        assert_eq!(index.dirty_models().len(), 3);
    }

    #[test]
    fn test_repeated_marking_is_cumulative() {
        let mut index = index();
        index.mark_as_addition("db.schema.table", &["db.schema"]).unwrap();
        index.mark_as_addition("db.schema.table", &["db.schema"]).unwrap();
        assert_eq!(
            index
                .get_urn("db.schema")
                .unwrap()
                .child_diff_status_count(DiffStatus::Addition),
            2
        );
    }

    #[test]
    fn test_mark_unknown_resource_fails() {
        let mut index = index();
        let err = index
            .mark_as_removal("missing", &[] as &[&str])
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(index.dirty_models().is_empty());
    }

    #[test]
    fn test_link_child() {
        let mut index = index();
        assert!(index.link_child("db.schema", "db.schema.table"));
        assert!(index.link_child("db.schema", "db.schema.table"));
        assert!(!index.link_child("nope", "db.schema.table"));
        assert_eq!(
            index.get_urn("db.schema").unwrap().children(),
            vec!["db.schema.table".to_string()]
        );
        assert!(index.is_dirty("db.schema"));
    }

    #[test]
    fn test_stage_marks_dirty() {
        let mut index = StagedResourceIndex::new();
        index.stage(staged_resources::Model::new("db"));
        assert!(index.is_dirty("db"));
        index.clear_dirty();
        assert!(!index.is_dirty("db"));
        assert_eq!(index.len(), 1);
    }
}
