//! Traversal planning over a [`DatasetGraph`].
//!
//! Planning is pure and synchronous: it orders collections so that every
//! collection runs after the collections supplying its reference inputs,
//! seeds entry points from identity values and reports the collections that
//! cannot be reached as skipped.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info, warn};

use super::config::{CollectionAddress, Field, FieldPath};
use super::dataset_graph::{DatasetGraph, Edge, Node};
use crate::errors::{GraphError, GraphResult};

/// Identity label (`email`, `ssn`, ...) to seed value
pub type Seeds = HashMap<String, Value>;

/// A planned node: the graph node plus the edges that connect it to other
/// planned nodes. Never mutated once the plan is built.
#[derive(Debug, Clone)]
pub struct TraversalNode {
    node: Node,
    incoming: Vec<Edge>,
    outgoing: Vec<Edge>,
    seeded_fields: Vec<(FieldPath, String)>,
}

impl TraversalNode {
    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn address(&self) -> &CollectionAddress {
        self.node.address()
    }

    /// Edges from planned upstream nodes into this node
    pub fn incoming_edges(&self) -> &[Edge] {
        &self.incoming
    }

    /// Edges from this node into planned downstream nodes
    pub fn outgoing_edges(&self) -> &[Edge] {
        &self.outgoing
    }

    /// Identity fields of this node that have a seed value
    pub fn seeded_fields(&self) -> &[(FieldPath, String)] {
        &self.seeded_fields
    }

    /// Upstream collections this node waits for
    pub fn input_keys(&self) -> Vec<CollectionAddress> {
        self.incoming
            .iter()
            .map(Edge::upstream)
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn is_root(&self) -> bool {
        self.incoming.is_empty()
    }

    /// Minimal view handed to the execution layer
    pub fn to_execution_node(&self) -> ExecutionNode {
        ExecutionNode {
            address: self.address().clone(),
            connection_key: self.node.connection_key().to_string(),
            fields: self.node.collection.fields.clone(),
            input_keys: self.input_keys(),
        }
    }
}

/// What a task handler needs to run one collection, detached from the
/// traversal structures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionNode {
    pub address: CollectionAddress,
    pub connection_key: String,
    pub fields: Vec<Field>,
    pub input_keys: Vec<CollectionAddress>,
}

/// Dependency-ordered execution plan for one set of seeds
#[derive(Debug, Clone)]
pub struct Traversal {
    seeds: Seeds,
    traversal_node_dict: IndexMap<CollectionAddress, TraversalNode>,
    entry_points: Vec<CollectionAddress>,
    skipped: Vec<CollectionAddress>,
}

impl Traversal {
    pub fn new(graph: &DatasetGraph, seeds: &Seeds) -> GraphResult<Self> {
        let order = topological_order(graph)?;
        let upstreams = upstream_collections(graph);

        let mut included: HashSet<CollectionAddress> = HashSet::new();
        let mut seeded: HashMap<CollectionAddress, Vec<(FieldPath, String)>> = HashMap::new();
        let mut entry_points = Vec::new();
        let mut skipped = Vec::new();

        for address in &order {
            let Some(node) = graph.node(address) else {
                continue;
            };

            let seeded_fields: Vec<(FieldPath, String)> = node
                .collection
                .identities()
                .into_iter()
                .filter(|(_, identity)| seeds.contains_key(identity))
                .collect();

            let node_upstreams = upstreams.get(address);
            let has_upstream = node_upstreams.map(|u| !u.is_empty()).unwrap_or(false);
            let upstream_reached = node_upstreams
                .map(|u| u.iter().any(|up| included.contains(up)))
                .unwrap_or(false);

            if seeded_fields.is_empty() && !upstream_reached {
                skipped.push(address.clone());
                continue;
            }

            if !seeded_fields.is_empty() && !has_upstream {
                entry_points.push(address.clone());
            }

            included.insert(address.clone());
            seeded.insert(address.clone(), seeded_fields);
        }

        let mut traversal_node_dict = IndexMap::new();
        for address in order.iter().filter(|a| included.contains(*a)) {
            let Some(node) = graph.node(address) else {
                continue;
            };

            let incoming = graph
                .edges()
                .iter()
                .filter(|e| &e.downstream() == address && included.contains(&e.upstream()))
                .cloned()
                .collect();
            let outgoing = graph
                .edges()
                .iter()
                .filter(|e| &e.upstream() == address && included.contains(&e.downstream()))
                .cloned()
                .collect();

            traversal_node_dict.insert(
                address.clone(),
                TraversalNode {
                    node: node.clone(),
                    incoming,
                    outgoing,
                    seeded_fields: seeded.remove(address).unwrap_or_default(),
                },
            );
        }

        for address in &skipped {
            warn!("Collection {} is unreachable from the provided seeds, skipping", address);
        }

        info!(
            "Traversal planned {} of {} collections ({} entry points, {} skipped)",
            traversal_node_dict.len(),
            graph.len(),
            entry_points.len(),
            skipped.len()
        );

        Ok(Self {
            seeds: seeds.clone(),
            traversal_node_dict,
            entry_points,
            skipped,
        })
    }

    /// Planned nodes in execution order
    pub fn traversal_node_dict(&self) -> &IndexMap<CollectionAddress, TraversalNode> {
        &self.traversal_node_dict
    }

    pub fn seeds(&self) -> &Seeds {
        &self.seeds
    }

    pub fn entry_points(&self) -> &[CollectionAddress] {
        &self.entry_points
    }

    /// Collections left out of the plan because no seed or upstream reaches them
    pub fn skipped(&self) -> &[CollectionAddress] {
        &self.skipped
    }

    pub fn execution_order(&self) -> Vec<&CollectionAddress> {
        self.traversal_node_dict.keys().collect()
    }

    pub fn execution_nodes(&self) -> Vec<ExecutionNode> {
        self.traversal_node_dict
            .values()
            .map(TraversalNode::to_execution_node)
            .collect()
    }
}

/// Collection-level upstream sets, self references excluded
fn upstream_collections(
    graph: &DatasetGraph,
) -> HashMap<CollectionAddress, IndexSet<CollectionAddress>> {
    let mut upstreams: HashMap<CollectionAddress, IndexSet<CollectionAddress>> = HashMap::new();
    for edge in graph.edges().iter().filter(|e| !e.is_self_reference()) {
        upstreams
            .entry(edge.downstream())
            .or_default()
            .insert(edge.upstream());
    }
    upstreams
}

/// Order every collection of the graph so that each one follows all of its
/// upstream collections. Ties keep graph declaration order.
pub fn topological_order(graph: &DatasetGraph) -> GraphResult<Vec<CollectionAddress>> {
    let mut in_degree: IndexMap<CollectionAddress, usize> =
        graph.nodes().keys().map(|a| (a.clone(), 0)).collect();
    let mut adjacency: HashMap<CollectionAddress, IndexSet<CollectionAddress>> = HashMap::new();

    for edge in graph.edges() {
        let (upstream, downstream) = (edge.upstream(), edge.downstream());
        if adjacency
            .entry(upstream)
            .or_default()
            .insert(downstream.clone())
        {
            if let Some(degree) = in_degree.get_mut(&downstream) {
                *degree += 1;
            }
        }
    }

    // Kahn's algorithm
    let mut queue: VecDeque<CollectionAddress> = in_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(address, _)| address.clone())
        .collect();
    let mut sorted = Vec::with_capacity(in_degree.len());

    while let Some(address) = queue.pop_front() {
        if let Some(neighbors) = adjacency.get(&address) {
            for neighbor in neighbors {
                if let Some(degree) = in_degree.get_mut(neighbor) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(neighbor.clone());
                    }
                }
            }
        }
        sorted.push(address);
    }

    if sorted.len() != in_degree.len() {
        let addresses = cycle_members(graph, &sorted, &adjacency);
        return Err(GraphError::CycleDetected {
            addresses: addresses.iter().map(ToString::to_string).collect(),
        });
    }

    debug!(
        "Topological order: {:?}",
        sorted.iter().map(ToString::to_string).collect::<Vec<_>>()
    );
    Ok(sorted)
}

/// Narrow the nodes Kahn's algorithm could not order down to the ones that
/// sit on a cycle, by repeatedly stripping nodes without a remaining
/// predecessor or successor.
fn cycle_members(
    graph: &DatasetGraph,
    sorted: &[CollectionAddress],
    adjacency: &HashMap<CollectionAddress, IndexSet<CollectionAddress>>,
) -> Vec<CollectionAddress> {
    let ordered: HashSet<&CollectionAddress> = sorted.iter().collect();
    let mut remaining: HashSet<CollectionAddress> = graph
        .nodes()
        .keys()
        .filter(|a| !ordered.contains(a))
        .cloned()
        .collect();

    loop {
        let strip: Vec<CollectionAddress> = remaining
            .iter()
            .filter(|address| {
                let has_successor = adjacency
                    .get(*address)
                    .map(|n| n.iter().any(|s| remaining.contains(s)))
                    .unwrap_or(false);
                let has_predecessor = remaining.iter().any(|other| {
                    adjacency
                        .get(other)
                        .map(|n| n.contains(*address))
                        .unwrap_or(false)
                });
                !has_successor || !has_predecessor
            })
            .cloned()
            .collect();

        if strip.is_empty() {
            break;
        }
        for address in strip {
            remaining.remove(&address);
        }
    }

    graph
        .nodes()
        .keys()
        .filter(|a| remaining.contains(*a))
        .cloned()
        .collect()
}
