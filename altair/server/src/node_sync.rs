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

//! The periodic spec/node reconciler.
//!
//! Each tick: expire superseded blocks per node, push ingestion tasks for
//! assigned specs that still need sync, refresh node state, then recompute
//! table metrics. A spec whose ingestion keeps failing loses its affinity
//! after a configured number of attempts so the next refresh can place it
//! elsewhere.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use altair_common::Result;
use altair_execution::BlockManager;
use altair_ingest::repo::{SourceInventory, SpecRepo};
use altair_ingest::task::{ClusterConnector, Task, TaskState};
use altair_ingest::{IngestSpec, TableDefinition};
use log::{error, info, warn};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::cluster::ClusterInfo;
use crate::config::ServerConfig;

/// Reconciles the spec repo with the cluster's nodes.
pub struct NodeSync {
    cluster: Arc<ClusterInfo>,
    connector: Arc<dyn ClusterConnector>,
    blocks: Arc<BlockManager>,
    repo: Mutex<SpecRepo>,
    config: ServerConfig,
}

impl NodeSync {
    pub fn new(
        cluster: Arc<ClusterInfo>,
        connector: Arc<dyn ClusterConnector>,
        blocks: Arc<BlockManager>,
        config: ServerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            cluster,
            connector,
            blocks,
            repo: Mutex::new(SpecRepo::new()),
            config,
        })
    }

    /// Recompute specs from table definitions and (re)assign them to the
    /// currently active nodes.
    pub fn refresh_specs(
        &self,
        tables: &[TableDefinition],
        inventory: &dyn SourceInventory,
        now: i64,
    ) -> Result<()> {
        let mut repo = self.repo.lock();
        repo.refresh(tables, inventory, now)?;
        repo.assign(&self.cluster.nodes());
        Ok(())
    }

    /// Read-only peek at the repo, for diagnostics and tests.
    pub fn with_repo<R>(&self, f: impl FnOnce(&SpecRepo) -> R) -> R {
        f(&self.repo.lock())
    }

    /// One reconciliation pass over every active node.
    pub async fn sync_once(&self) -> Result<()> {
        let nodes = self.cluster.active();

        // expire superseded blocks where they live
        for node in &nodes {
            let client = match self.connector.make_client(node) {
                Ok(client) => client,
                Err(e) => {
                    warn!("node {node} unreachable for expiration: {e}");
                    continue;
                }
            };
            let expired: Vec<String> = {
                let repo = self.repo.lock();
                self.blocks
                    .blocks_on(&node.id)
                    .iter()
                    .filter(|b| repo.should_expire(&b.meta.sig.spec, &node.id))
                    .map(|b| b.meta.sig.to_string())
                    .collect()
            };
            if expired.is_empty() {
                continue;
            }
            match client.task(Task::Expiration(expired.clone())).await {
                Ok(state) => {
                    info!("expired {} blocks on node {node}: {state:?}", expired.len())
                }
                Err(e) => warn!("expiration on node {node} failed: {e}"),
            }
        }

        // push ingestion work for everything assigned and not yet ready
        let pending: Vec<IngestSpec> = {
            let repo = self.repo.lock();
            repo.specs()
                .filter(|s| s.assigned() && s.need_sync())
                .cloned()
                .collect()
        };
        let mut notified = 0usize;
        for spec in pending {
            let Some(node) = spec
                .affinity
                .as_deref()
                .and_then(|id| self.cluster.get(id))
            else {
                continue;
            };
            let client = match self.connector.make_client(&node) {
                Ok(client) => client,
                Err(e) => {
                    warn!("node {node} unreachable for ingestion: {e}");
                    continue;
                }
            };
            notified += 1;
            let sig = spec.signature();
            match client.task(Task::Ingestion(spec)).await {
                Ok(TaskState::Succeeded) => self.repo.lock().mark_ready(&sig),
                Ok(TaskState::Failed) | Err(_) => {
                    warn!("ingestion task {sig} failed on node {node}");
                    self.repo
                        .lock()
                        .record_failure(&sig, self.config.ingest_fail_threshold);
                }
                Ok(_) => {}
            }
        }

        // post-task state of every node
        for node in &nodes {
            if let Ok(client) = self.connector.make_client(node) {
                if client.state().await.is_ok() {
                    self.blocks.mark_refreshed(&node.id);
                }
            }
        }

        // expired specs disappear once their blocks are gone everywhere
        self.repo
            .lock()
            .purge_expired(|sig| !self.blocks.spec_has_blocks(sig));
        self.blocks.update_table_metrics();

        if notified > 0 {
            info!("communicated {notified} ingestion tasks to {} nodes", nodes.len());
        }
        Ok(())
    }

    /// Run the reconciler on its configured interval until stopped.
    pub fn start(self: &Arc<Self>) -> SyncHandle {
        let sync = Arc::clone(self);
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stopped);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(sync.config.sync_interval_ms));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = sync.sync_once().await {
                    error!("sync pass failed: {e}");
                }
            }
            info!("node sync stopped");
        });
        SyncHandle { stopped, handle }
    }
}

/// Handle to a running sync loop.
pub struct SyncHandle {
    stopped: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl SyncHandle {
    /// Stop after the tick in flight, if any.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub async fn join(self) {
        self.stop();
        let _ = self.handle.await;
    }
}
