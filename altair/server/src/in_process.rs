// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! In-process cluster: node clients that call local executors directly.
//!
//! This is the single-host stand-in for the out-of-tree RPC transport. Each
//! [`InProcessNode`] owns a block-phase executor and a block loader over the
//! shared block manager and serves both connector seams.

use std::collections::HashMap;
use std::sync::Arc;

use altair_common::{AltairError, Node, Result};
use altair_execution::block_manager::BlockManager;
use altair_execution::connector::{NodeConnector, NodeQueryClient};
use altair_execution::plan::{BlockPlan, NodePartials};
use altair_execution::{NodeExecutor, NodeState};
use altair_ingest::task::{ClusterConnector, NodeClient, Task, TaskState};
use altair_ingest::{BlockLoader, SpecSource};
use async_trait::async_trait;
use log::{info, warn};

use crate::catalog::Catalog;

/// One storage node running inside this process.
pub struct InProcessNode {
    node: Node,
    executor: NodeExecutor,
    loader: BlockLoader,
    catalog: Arc<Catalog>,
    source: Arc<dyn SpecSource>,
    blocks: Arc<BlockManager>,
}

impl InProcessNode {
    pub fn new(
        node: Node,
        blocks: Arc<BlockManager>,
        catalog: Arc<Catalog>,
        source: Arc<dyn SpecSource>,
    ) -> Arc<Self> {
        Arc::new(Self {
            executor: NodeExecutor::new(node.id.clone(), Arc::clone(&blocks)),
            loader: BlockLoader::new(Arc::clone(&blocks)),
            node,
            catalog,
            source,
            blocks,
        })
    }

    pub fn node(&self) -> &Node {
        &self.node
    }
}

#[async_trait]
impl NodeQueryClient for InProcessNode {
    async fn query(&self, plan: &BlockPlan, candidates: &[String]) -> Result<NodePartials> {
        self.executor.execute(plan, Some(candidates)).await
    }

    async fn state(&self) -> Result<NodeState> {
        Ok(self.blocks.node_state(&self.node.id))
    }
}

#[async_trait]
impl NodeClient for InProcessNode {
    async fn task(&self, task: Task) -> Result<TaskState> {
        Ok(match task {
            Task::Ingestion(spec) => {
                let meta = match self.catalog.meta(&spec.table) {
                    Ok(meta) => meta,
                    Err(e) => {
                        warn!("ingestion of {spec} failed: {e}");
                        return Ok(TaskState::Failed);
                    }
                };
                match self
                    .loader
                    .load(&meta, &spec, &self.node.id, self.source.as_ref())
                {
                    Ok(sigs) => {
                        info!("node {}: ingested {spec} into {} blocks", self.node, sigs.len());
                        TaskState::Succeeded
                    }
                    Err(e) => {
                        warn!("node {}: ingestion of {spec} failed: {e}", self.node);
                        TaskState::Failed
                    }
                }
            }
            Task::Expiration(sigs) => {
                let mut removed = 0;
                for sig in &sigs {
                    if self.blocks.remove(sig) {
                        removed += 1;
                    }
                }
                info!("node {}: expired {removed} of {} blocks", self.node, sigs.len());
                TaskState::Succeeded
            }
            // the data path answers queries; acknowledge and let the
            // coordinator pull rows through the query verb
            Task::Query { .. } => TaskState::Queued,
        })
    }
}

/// Connector over a fixed set of in-process nodes.
pub struct InProcessConnector {
    nodes: HashMap<String, Arc<InProcessNode>>,
}

impl InProcessConnector {
    pub fn new(nodes: Vec<Arc<InProcessNode>>) -> Arc<Self> {
        Arc::new(Self {
            nodes: nodes
                .into_iter()
                .map(|n| (n.node.id.clone(), n))
                .collect(),
        })
    }

    fn find(&self, node: &Node) -> Result<&Arc<InProcessNode>> {
        self.nodes
            .get(&node.id)
            .ok_or_else(|| AltairError::NodeUnreachable(node.id.clone()))
    }
}

impl NodeConnector for InProcessConnector {
    fn make_client(&self, node: &Node) -> Result<Arc<dyn NodeQueryClient>> {
        Ok(Arc::clone(self.find(node)?) as Arc<dyn NodeQueryClient>)
    }
}

impl ClusterConnector for InProcessConnector {
    fn make_client(&self, node: &Node) -> Result<Arc<dyn NodeClient>> {
        Ok(Arc::clone(self.find(node)?) as Arc<dyn NodeClient>)
    }
}
