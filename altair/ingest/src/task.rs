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

//! The control-plane task model and the full node client seam.

use std::fmt;
use std::sync::Arc;

use altair_common::{Node, Result};
use altair_execution::connector::NodeQueryClient;
use altair_execution::plan::BlockPlan;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::spec::IngestSpec;

/// Outcome of a task submitted to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

/// A unit of work the coordinator hands a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Task {
    /// Materialize one spec into blocks.
    Ingestion(IngestSpec),
    /// Drop the listed block signatures.
    Expiration(Vec<String>),
    /// A serialized block phase plus its candidate blocks. The data path
    /// returns rows through [`NodeQueryClient::query`]; this variant exists
    /// for transports that multiplex everything over one verb.
    Query {
        plan: BlockPlan,
        blocks: Vec<String>,
    },
}

impl Task {
    /// Stable identity for logs and dedup.
    pub fn signature(&self) -> String {
        match self {
            Task::Ingestion(spec) => format!("ingest:{}", spec.signature()),
            Task::Expiration(sigs) => format!("expire:{}", sigs.len()),
            Task::Query { plan, .. } => format!("query:{}", plan.table),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}

/// The full node RPC surface: the query path plus the task verb.
#[async_trait]
pub trait NodeClient: NodeQueryClient {
    async fn task(&self, task: Task) -> Result<TaskState>;
}

/// Produces full clients for the sync loop. In-process and wire transports
/// implement this alongside the query-path connector.
pub trait ClusterConnector: Send + Sync {
    fn make_client(&self, node: &Node) -> Result<Arc<dyn NodeClient>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::SpecState;

    #[test]
    fn task_signatures() {
        let spec = IngestSpec::new("t", "v", "a.csv", "d", 9, SpecState::New, 0);
        assert_eq!(Task::Ingestion(spec).signature(), "ingest:a.csv@9");
        assert_eq!(
            Task::Expiration(vec!["x".into(), "y".into()]).signature(),
            "expire:2"
        );
    }

    #[test]
    fn ingestion_task_round_trips() {
        let spec = IngestSpec::new("t", "v", "a.csv", "d", 9, SpecState::Renew, 0);
        let task = Task::Ingestion(spec.clone());
        let text = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&text).unwrap();
        match back {
            Task::Ingestion(s) => assert_eq!(s.signature(), spec.signature()),
            other => panic!("unexpected task {other}"),
        }
    }
}
