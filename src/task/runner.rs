use indexmap::IndexMap;
use serde_json::Value;
use std::error::Error;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::resources::{TaskResources, TaskStatus};
use super::retry::{retry, TaskLifecycle};
use super::ActionType;
use crate::config::ExecutionConfig;
use crate::graph::{CollectionAddress, ExecutionNode, FieldPath, Row, Traversal, TraversalNode};

/// Values available to a node, keyed by the node's own field path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeInputs {
    values: IndexMap<FieldPath, Vec<Value>>,
}

impl NodeInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value for `path`; arrays are flattened, nulls and repeats dropped
    pub fn add(&mut self, path: FieldPath, value: Value) {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    self.add(path.clone(), item);
                }
            }
            value => {
                let values = self.values.entry(path).or_default();
                if !values.contains(&value) {
                    values.push(value);
                }
            }
        }
    }

    pub fn get(&self, path: &FieldPath) -> &[Value] {
        self.values.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn paths(&self) -> impl Iterator<Item = &FieldPath> {
        self.values.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Connector-side work for one collection
pub trait NodeHandler {
    type Error: Error + 'static;

    fn execute(
        &self,
        node: &ExecutionNode,
        inputs: &NodeInputs,
        action_type: ActionType,
    ) -> Result<Vec<Row>, Self::Error>;
}

/// Lifecycle of one collection task within a privacy request; statuses are
/// written through to the [`TaskResources`] provider.
pub struct RequestTask<'a> {
    request_id: &'a str,
    address: &'a CollectionAddress,
    connection_key: &'a str,
    resources: &'a dyn TaskResources,
    config: &'a ExecutionConfig,
}

impl<'a> RequestTask<'a> {
    pub fn new(
        request_id: &'a str,
        node: &'a TraversalNode,
        resources: &'a dyn TaskResources,
        config: &'a ExecutionConfig,
    ) -> Self {
        Self {
            request_id,
            address: node.address(),
            connection_key: node.node().connection_key(),
            resources,
            config,
        }
    }

    fn update_status(&self, status: TaskStatus) {
        self.resources
            .set_status(self.request_id, self.address, status);
    }
}

impl TaskLifecycle for RequestTask<'_> {
    fn log_start(&self, action_type: ActionType) {
        debug!("Starting {} task for {}", action_type, self.address);
        self.update_status(TaskStatus::InProcessing);
    }

    fn log_retry(&self, action_type: ActionType) {
        debug!("Retrying {} task for {}", action_type, self.address);
        self.update_status(TaskStatus::Retrying);
    }

    fn log_end(&self, action_type: ActionType, fault: Option<&(dyn Error + 'static)>) {
        match fault {
            Some(fault) => {
                warn!("{} task for {} failed: {}", action_type, self.address, fault);
                self.update_status(TaskStatus::Error);
            }
            None => {
                debug!("Finished {} task for {}", action_type, self.address);
                self.update_status(TaskStatus::Complete);
            }
        }
    }

    fn skip_if_disabled(&self) -> bool {
        let disabled =
            !self.config.enabled || self.config.is_connection_disabled(self.connection_key);
        if disabled {
            info!("Skipping {}: execution disabled", self.address);
            self.update_status(TaskStatus::Skipped);
        }
        disabled
    }

    fn skip_if_action_disabled(&self, action_type: ActionType) -> bool {
        let disabled = self.config.is_action_disabled(action_type);
        if disabled {
            info!("Skipping {}: {} actions disabled", self.address, action_type);
            self.update_status(TaskStatus::Skipped);
        }
        disabled
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub request_id: String,
    /// Final status per planned collection, in execution order
    pub statuses: IndexMap<CollectionAddress, TaskStatus>,
    /// Collections left out at planning time
    pub unreachable: Vec<CollectionAddress>,
    pub execution_time_ms: u64,
}

impl RunReport {
    pub fn completed(&self) -> Vec<&CollectionAddress> {
        self.with_status(TaskStatus::Complete)
    }

    pub fn skipped(&self) -> Vec<&CollectionAddress> {
        self.with_status(TaskStatus::Skipped)
    }

    fn with_status(&self, status: TaskStatus) -> Vec<&CollectionAddress> {
        self.statuses
            .iter()
            .filter(|(_, s)| **s == status)
            .map(|(address, _)| address)
            .collect()
    }
}

/// Executes the nodes of a [`Traversal`] one at a time in plan order
pub struct GraphTaskRunner<H: NodeHandler> {
    handler: H,
    resources: Arc<dyn TaskResources>,
    config: ExecutionConfig,
}

impl<H: NodeHandler> GraphTaskRunner<H> {
    pub fn new(handler: H, resources: Arc<dyn TaskResources>, config: ExecutionConfig) -> Self {
        Self {
            handler,
            resources,
            config,
        }
    }

    pub fn resources(&self) -> &Arc<dyn TaskResources> {
        &self.resources
    }

    /// Run every planned node; the first node fault that survives its
    /// retries stops the run and is returned as is.
    pub fn run(
        &self,
        request_id: &str,
        traversal: &Traversal,
        action_type: ActionType,
    ) -> Result<RunReport, H::Error> {
        let started = Instant::now();
        let dict = traversal.traversal_node_dict();
        info!(
            "Running {} request {} over {} collections",
            action_type,
            request_id,
            dict.len()
        );

        for address in dict.keys() {
            self.resources
                .set_status(request_id, address, TaskStatus::Pending);
        }

        let mut statuses = IndexMap::new();
        for (address, node) in dict {
            let inputs = self.build_inputs(request_id, traversal, node);
            let execution_node = node.to_execution_node();
            let task = RequestTask::new(request_id, node, self.resources.as_ref(), &self.config);
            let policy = self.config.retry_policy();

            let rows = retry(&task, &policy, action_type, Vec::new(), || {
                self.handler.execute(&execution_node, &inputs, action_type)
            })?;

            debug!("{} returned {} row(s)", address, rows.len());
            self.resources.set_rows(request_id, address, rows);

            let status = self
                .resources
                .status(request_id, address)
                .unwrap_or(TaskStatus::Complete);
            statuses.insert(address.clone(), status);
        }

        let report = RunReport {
            request_id: request_id.to_string(),
            statuses,
            unreachable: traversal.skipped().to_vec(),
            execution_time_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "Request {} finished: {} complete, {} skipped",
            request_id,
            report.completed().len(),
            report.skipped().len()
        );
        Ok(report)
    }

    /// Seed values for seeded identity fields plus the referenced values of
    /// upstream rows, mapped onto this node's field paths
    pub fn build_inputs(
        &self,
        request_id: &str,
        traversal: &Traversal,
        node: &TraversalNode,
    ) -> NodeInputs {
        let mut inputs = NodeInputs::new();

        for (path, identity) in node.seeded_fields() {
            if let Some(value) = traversal.seeds().get(identity) {
                inputs.add(path.clone(), value.clone());
            }
        }

        for edge in node.incoming_edges() {
            for row in self.resources.rows(request_id, &edge.upstream()) {
                if let Some(value) = edge.from.path.retrieve_from(&row) {
                    inputs.add(edge.to.path.clone(), value.clone());
                }
            }
        }

        inputs
    }
}
