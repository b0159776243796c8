pub mod config;
pub mod dataset_graph;
pub mod loader;
pub mod traversal;

pub use config::{
    Collection, CollectionAddress, Direction, Field, FieldAddress, FieldKind, FieldPath,
    FieldReference, GraphDataset, Row,
};
pub use dataset_graph::{DatasetGraph, Edge, Node};
pub use loader::{load_dataset_files, load_datasets, parse_datasets};
pub use traversal::{topological_order, ExecutionNode, Seeds, Traversal, TraversalNode};
