use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::debug;

use super::config::{
    Collection, CollectionAddress, Direction, FieldAddress, FieldReference, GraphDataset,
};
use crate::errors::{GraphError, GraphResult};

/// A collection together with the dataset it belongs to.
///
/// Nodes compare and hash by [`CollectionAddress`] only; two nodes with the
/// same address are interchangeable even if their field lists differ.
#[derive(Debug, Clone)]
pub struct Node {
    pub dataset: Arc<GraphDataset>,
    pub collection: Collection,
    address: CollectionAddress,
}

impl Node {
    pub fn new(dataset: impl Into<Arc<GraphDataset>>, collection: Collection) -> Self {
        let dataset = dataset.into();
        let address = CollectionAddress::new(dataset.name.clone(), collection.name.clone());
        Self {
            dataset,
            collection,
            address,
        }
    }

    pub fn address(&self) -> &CollectionAddress {
        &self.address
    }

    pub fn connection_key(&self) -> &str {
        &self.dataset.connection_key
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

/// Directed dependency between two fields: `from` must execute before `to`
/// and its values feed `to`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    pub from: FieldAddress,
    pub to: FieldAddress,
}

impl Edge {
    /// Orient a reference declared on `owner`
    pub fn from_reference(owner: FieldAddress, reference: &FieldReference) -> Self {
        match reference.direction {
            Direction::To => Edge {
                from: reference.address.clone(),
                to: owner,
            },
            Direction::From => Edge {
                from: owner,
                to: reference.address.clone(),
            },
        }
    }

    pub fn upstream(&self) -> CollectionAddress {
        self.from.collection_address()
    }

    pub fn downstream(&self) -> CollectionAddress {
        self.to.collection_address()
    }

    pub fn is_self_reference(&self) -> bool {
        self.upstream() == self.downstream()
    }
}

/// All collections of one or more datasets, addressable as one graph.
///
/// Built once; every reference is resolved at construction time.
#[derive(Debug, Clone)]
pub struct DatasetGraph {
    nodes: IndexMap<CollectionAddress, Node>,
    edges: IndexSet<Edge>,
}

impl DatasetGraph {
    pub fn new(datasets: Vec<GraphDataset>) -> GraphResult<Self> {
        let mut nodes: IndexMap<CollectionAddress, Node> = IndexMap::new();

        for dataset in datasets {
            let dataset = Arc::new(dataset);
            for collection in &dataset.collections {
                let node = Node::new(dataset.clone(), collection.clone());
                if nodes.contains_key(node.address()) {
                    return Err(GraphError::DuplicateAddress(node.address().to_string()));
                }
                nodes.insert(node.address().clone(), node);
            }
        }

        let mut edges = IndexSet::new();
        for (address, node) in &nodes {
            for (path, reference) in node.collection.references() {
                let owner = address.field_address(path);
                let target_exists = nodes
                    .get(&reference.address.collection_address())
                    .map(|target| target.collection.field(&reference.address.path).is_some())
                    .unwrap_or(false);

                if !target_exists {
                    return Err(GraphError::UnresolvedReference {
                        from: owner.to_string(),
                        to: reference.address.to_string(),
                    });
                }

                edges.insert(Edge::from_reference(owner, reference));
            }
        }

        debug!(
            "Built dataset graph with {} nodes and {} edges",
            nodes.len(),
            edges.len()
        );

        Ok(Self { nodes, edges })
    }

    pub fn node(&self, address: &CollectionAddress) -> Option<&Node> {
        self.nodes.get(address)
    }

    /// Nodes in dataset/collection declaration order
    pub fn nodes(&self) -> &IndexMap<CollectionAddress, Node> {
        &self.nodes
    }

    pub fn edges(&self) -> &IndexSet<Edge> {
        &self.edges
    }

    /// Identity labels declared anywhere in the graph
    pub fn identity_keys(&self) -> BTreeSet<String> {
        self.nodes
            .values()
            .flat_map(|node| node.collection.identities())
            .map(|(_, identity)| identity)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
