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

//! The query-path seam between the coordinator and storage nodes.
//!
//! The coordinator only ever talks to nodes through [`NodeConnector`];
//! wire transports implement it out of tree. [`LocalConnector`] is the
//! in-process implementation used by single-host deployments and tests.

use std::collections::HashMap;
use std::sync::Arc;

use altair_common::{AltairError, Node, Result};
use async_trait::async_trait;

use crate::block_manager::NodeState;
use crate::node::NodeExecutor;
use crate::plan::{BlockPlan, NodePartials};

/// Query-path client for one node: run a block phase, fetch node state.
#[async_trait]
pub trait NodeQueryClient: Send + Sync {
    /// Execute the block phase over the candidate blocks and return the
    /// partial sets (plus per-block errors).
    async fn query(&self, plan: &BlockPlan, candidates: &[String]) -> Result<NodePartials>;

    /// The node's current block set and totals.
    async fn state(&self) -> Result<NodeState>;
}

/// Produces clients for nodes. Implementations decide the transport.
pub trait NodeConnector: Send + Sync {
    fn make_client(&self, node: &Node) -> Result<Arc<dyn NodeQueryClient>>;
}

/// In-process connector: every "node" is a [`NodeExecutor`] over the shared
/// block manager.
pub struct LocalConnector {
    executors: HashMap<String, Arc<NodeExecutor>>,
}

impl LocalConnector {
    pub fn new(executors: Vec<Arc<NodeExecutor>>) -> Self {
        Self {
            executors: executors
                .into_iter()
                .map(|e| (e.node().to_string(), e))
                .collect(),
        }
    }

    /// A connector for a single local executor.
    pub fn single(executor: Arc<NodeExecutor>) -> Self {
        Self::new(vec![executor])
    }
}

impl NodeConnector for LocalConnector {
    fn make_client(&self, node: &Node) -> Result<Arc<dyn NodeQueryClient>> {
        let executor = self
            .executors
            .get(&node.id)
            .ok_or_else(|| AltairError::NodeUnreachable(node.id.clone()))?;
        Ok(Arc::new(LocalClient {
            executor: Arc::clone(executor),
        }))
    }
}

struct LocalClient {
    executor: Arc<NodeExecutor>,
}

#[async_trait]
impl NodeQueryClient for LocalClient {
    async fn query(&self, plan: &BlockPlan, candidates: &[String]) -> Result<NodePartials> {
        self.executor.execute(plan, Some(candidates)).await
    }

    async fn state(&self) -> Result<NodeState> {
        Ok(self.executor.state())
    }
}
