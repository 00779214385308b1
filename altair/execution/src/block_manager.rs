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

//! The in-memory block registry.
//!
//! For each table a time-sorted index of resident blocks, for each node the
//! set of block signatures it carries. Reads take a shared lock; ingest and
//! expiration take the writer lock. The registry is the only process-wide
//! query-path state and has explicit [`BlockManager::init`] /
//! [`BlockManager::shutdown`] entry points.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use altair_common::{AltairError, Result};
use altair_memory::Batch;
use itertools::Itertools;
use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Stable block identity: `"{table}#{spec}#{seq}"` where `spec` is the
/// ingest spec signature `"{id}@{size}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockSignature {
    pub table: String,
    pub spec: String,
    pub seq: u64,
}

impl BlockSignature {
    pub fn new(table: impl Into<String>, spec: impl Into<String>, seq: u64) -> Self {
        Self {
            table: table.into(),
            spec: spec.into(),
            seq,
        }
    }

    /// Parse the textual form. Table names carry no `#`; the spec part may.
    pub fn parse(text: &str) -> Result<Self> {
        let (table, rest) = text
            .split_once('#')
            .ok_or_else(|| AltairError::Internal(format!("malformed block signature: {text}")))?;
        let (spec, seq) = rest
            .rsplit_once('#')
            .ok_or_else(|| AltairError::Internal(format!("malformed block signature: {text}")))?;
        let seq = seq
            .parse()
            .map_err(|_| AltairError::Internal(format!("malformed block signature: {text}")))?;
        Ok(Self::new(table, spec, seq))
    }
}

impl fmt::Display for BlockSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}#{}", self.table, self.spec, self.seq)
    }
}

/// Lifecycle of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Created = 0,
    Registered = 1,
    Expired = 2,
    Removed = 3,
}

/// Immutable attributes of a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockMeta {
    pub sig: BlockSignature,
    /// Node the block resides on.
    pub residence: String,
    /// `[start, end)` event-time range of the rows.
    pub window: (i64, i64),
    pub rows: usize,
    pub raw_size: usize,
}

/// A registered block: meta plus the one shared, sealed batch.
#[derive(Debug)]
pub struct DataBlock {
    pub meta: BlockMeta,
    state: AtomicU8,
    pub data: Arc<Batch>,
}

impl DataBlock {
    pub fn new(meta: BlockMeta, data: Arc<Batch>) -> Self {
        Self {
            meta,
            state: AtomicU8::new(BlockState::Created as u8),
            data,
        }
    }

    pub fn state(&self) -> BlockState {
        match self.state.load(Ordering::Acquire) {
            0 => BlockState::Created,
            1 => BlockState::Registered,
            2 => BlockState::Expired,
            _ => BlockState::Removed,
        }
    }

    fn set_state(&self, state: BlockState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Whether `[start, end)` overlaps this block's window.
    pub fn overlaps(&self, window: (i64, i64)) -> bool {
        self.meta.window.0 < window.1 && self.meta.window.1 > window.0
    }
}

/// What a node reports about itself: carried blocks and totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeState {
    pub node: String,
    pub blocks: Vec<String>,
    pub rows: usize,
    pub bytes: usize,
}

/// Per-table totals, recomputed after each sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetrics {
    pub blocks: usize,
    pub rows: usize,
    pub bytes: usize,
}

#[derive(Default)]
struct Registry {
    /// Per table, blocks keyed by (window start, signature) for pruned
    /// range scans.
    tables: HashMap<String, BTreeMap<(i64, String), Arc<DataBlock>>>,
    /// Per table, the widest block window ever registered. Bounds how far
    /// below a query window's start the time index must be scanned: any
    /// block starting earlier cannot reach into the window.
    widths: HashMap<String, i64>,
    /// Per node, the signatures it carries.
    nodes: HashMap<String, HashSet<String>>,
    by_sig: HashMap<String, Arc<DataBlock>>,
    refreshed: HashMap<String, Instant>,
    metrics: HashMap<String, TableMetrics>,
}

/// The block registry. Executors hold a handle (`Arc<BlockManager>`); the
/// registry itself never references an executor.
#[derive(Default)]
pub struct BlockManager {
    inner: RwLock<Registry>,
}

static GLOBAL: RwLock<Option<Arc<BlockManager>>> = RwLock::new(None);

impl BlockManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Initialize (or fetch) the process-wide registry.
    pub fn init() -> Arc<Self> {
        let mut global = GLOBAL.write();
        match &*global {
            Some(bm) => Arc::clone(bm),
            None => {
                let bm = Self::new();
                *global = Some(Arc::clone(&bm));
                bm
            }
        }
    }

    /// Tear down the process-wide registry. Outstanding handles stay valid.
    pub fn shutdown() {
        *GLOBAL.write() = None;
    }

    /// Register a block, making it visible to queries.
    pub fn add(&self, block: DataBlock) -> Arc<DataBlock> {
        block.set_state(BlockState::Registered);
        let block = Arc::new(block);
        let sig = block.meta.sig.to_string();
        let mut inner = self.inner.write();
        inner
            .tables
            .entry(block.meta.sig.table.clone())
            .or_default()
            .insert((block.meta.window.0, sig.clone()), Arc::clone(&block));
        let width = block.meta.window.1.saturating_sub(block.meta.window.0);
        let widest = inner
            .widths
            .entry(block.meta.sig.table.clone())
            .or_default();
        *widest = (*widest).max(width);
        inner
            .nodes
            .entry(block.meta.residence.clone())
            .or_default()
            .insert(sig.clone());
        inner.by_sig.insert(sig, Arc::clone(&block));
        debug!(
            "registered block {} on {} ({} rows)",
            block.meta.sig, block.meta.residence, block.meta.rows
        );
        block
    }

    /// Drop a block from every index. Returns false when unknown.
    pub fn remove(&self, sig: &str) -> bool {
        let mut inner = self.inner.write();
        let Some(block) = inner.by_sig.remove(sig) else {
            return false;
        };
        block.set_state(BlockState::Expired);
        if let Some(index) = inner.tables.get_mut(&block.meta.sig.table) {
            index.remove(&(block.meta.window.0, sig.to_string()));
        }
        if let Some(set) = inner.nodes.get_mut(&block.meta.residence) {
            set.remove(sig);
        }
        block.set_state(BlockState::Removed);
        true
    }

    /// Remove every block of one spec resident on `node`; returns the
    /// removed signatures.
    pub fn remove_spec(&self, spec_sig: &str, node: &str) -> Vec<String> {
        let sigs: Vec<String> = {
            let inner = self.inner.read();
            inner
                .by_sig
                .iter()
                .filter(|(_, b)| b.meta.sig.spec == spec_sig && b.meta.residence == node)
                .map(|(sig, _)| sig.clone())
                .collect()
        };
        for sig in &sigs {
            self.remove(sig);
        }
        sigs
    }

    /// Whether any registered block belongs to the spec.
    pub fn spec_has_blocks(&self, spec_sig: &str) -> bool {
        self.inner
            .read()
            .by_sig
            .values()
            .any(|b| b.meta.sig.spec == spec_sig)
    }

    /// Blocks of `table` whose windows intersect `window`, optionally
    /// restricted to one node. O(log N + matches) over the time index: the
    /// scan starts at `window.0` minus the table's widest block window, the
    /// earliest start a block could have and still reach into `window`.
    pub fn candidates(
        &self,
        table: &str,
        window: (i64, i64),
        node: Option<&str>,
    ) -> Vec<Arc<DataBlock>> {
        if window.0 >= window.1 {
            return vec![];
        }
        let inner = self.inner.read();
        let Some(index) = inner.tables.get(table) else {
            return vec![];
        };
        let width = inner.widths.get(table).copied().unwrap_or(0);
        let low = window.0.saturating_sub(width);
        index
            .range((low, String::new())..(window.1, String::new()))
            .map(|(_, b)| b)
            .filter(|b| b.overlaps(window))
            .filter(|b| node.map(|n| b.meta.residence == n).unwrap_or(true))
            .cloned()
            .collect()
    }

    /// Nodes that may hold relevant blocks for the plan.
    pub fn nodes_for(&self, table: &str, window: (i64, i64)) -> Vec<String> {
        self.candidates(table, window, None)
            .iter()
            .map(|b| b.meta.residence.clone())
            .sorted()
            .dedup()
            .collect()
    }

    pub fn blocks_on(&self, node: &str) -> Vec<Arc<DataBlock>> {
        let inner = self.inner.read();
        inner
            .nodes
            .get(node)
            .map(|sigs| {
                sigs.iter()
                    .filter_map(|sig| inner.by_sig.get(sig))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn node_state(&self, node: &str) -> NodeState {
        let blocks = self.blocks_on(node);
        NodeState {
            node: node.to_string(),
            rows: blocks.iter().map(|b| b.meta.rows).sum(),
            bytes: blocks.iter().map(|b| b.meta.raw_size).sum(),
            blocks: blocks.iter().map(|b| b.meta.sig.to_string()).collect(),
        }
    }

    pub fn mark_refreshed(&self, node: &str) {
        self.inner
            .write()
            .refreshed
            .insert(node.to_string(), Instant::now());
    }

    pub fn last_refreshed(&self, node: &str) -> Option<Instant> {
        self.inner.read().refreshed.get(node).copied()
    }

    /// Recompute per-table totals from the current indices.
    pub fn update_table_metrics(&self) {
        let mut inner = self.inner.write();
        let mut metrics: HashMap<String, TableMetrics> = HashMap::new();
        for (table, index) in &inner.tables {
            let entry = metrics.entry(table.clone()).or_default();
            for block in index.values() {
                entry.blocks += 1;
                entry.rows += block.meta.rows;
                entry.bytes += block.meta.raw_size;
            }
        }
        inner.metrics = metrics;
    }

    pub fn table_metrics(&self, table: &str) -> TableMetrics {
        self.inner
            .read()
            .metrics
            .get(table)
            .copied()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ALL_TIME as ALL;
    use crate::test_util::{trends_block, trends_meta};

    #[test]
    fn signature_round_trip() {
        let sig = BlockSignature::new("trends", "s3://bucket/file.csv@123", 7);
        let text = sig.to_string();
        assert_eq!(text, "trends#s3://bucket/file.csv@123#7");
        assert_eq!(BlockSignature::parse(&text).unwrap(), sig);
    }

    #[test]
    fn time_index_prunes() {
        let bm = BlockManager::new();
        let meta = trends_meta();
        // one block per month, window [month_start, next_month)
        let months = [0i64, 100, 200, 300, 400];
        for (i, start) in months.iter().enumerate() {
            trends_block(
                &bm,
                &meta,
                "n1",
                i as u64,
                (*start, start + 100),
                &[(*start, "q", 1)],
            );
        }
        let hits = bm.candidates("trends", (0, 400), None);
        assert_eq!(hits.len(), 4);
        assert!(hits.iter().all(|b| b.overlaps((0, 400))));
        assert!(hits.iter().all(|b| b.meta.window.0 < 400));
    }

    #[test]
    fn wide_blocks_straddling_the_window_start_are_found() {
        let bm = BlockManager::new();
        let meta = trends_meta();
        // a wide block starting long before the query window but reaching
        // into it, plus a narrow one safely outside
        trends_block(&bm, &meta, "n1", 0, (0, 1_000), &[(500, "q", 1)]);
        trends_block(&bm, &meta, "n1", 1, (0, 10), &[(5, "q", 1)]);

        let hits = bm.candidates("trends", (900, 950), None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].meta.sig.seq, 0);
    }

    #[test]
    fn removal_updates_every_index() {
        let bm = BlockManager::new();
        let meta = trends_meta();
        let block = trends_block(&bm, &meta, "n1", 0, (0, 10), &[(1, "q", 1)]);
        let sig = block.meta.sig.to_string();

        assert_eq!(block.state(), BlockState::Registered);
        assert!(bm.remove(&sig));
        assert_eq!(block.state(), BlockState::Removed);
        assert!(bm.candidates("trends", ALL, None).is_empty());
        assert!(bm.blocks_on("n1").is_empty());
        assert!(!bm.remove(&sig));
    }

    #[test]
    fn node_state_totals() {
        let bm = BlockManager::new();
        let meta = trends_meta();
        trends_block(&bm, &meta, "n1", 0, (0, 10), &[(1, "a", 1), (2, "b", 2)]);
        trends_block(&bm, &meta, "n1", 1, (10, 20), &[(11, "c", 3)]);
        trends_block(&bm, &meta, "n2", 2, (0, 10), &[(3, "d", 4)]);

        let state = bm.node_state("n1");
        assert_eq!(state.blocks.len(), 2);
        assert_eq!(state.rows, 3);
        assert!(state.bytes > 0);
    }

    #[test]
    fn table_metrics_recompute() {
        let bm = BlockManager::new();
        let meta = trends_meta();
        trends_block(&bm, &meta, "n1", 0, (0, 10), &[(1, "a", 1)]);
        trends_block(&bm, &meta, "n2", 1, (10, 20), &[(11, "b", 2)]);
        bm.update_table_metrics();
        let metrics = bm.table_metrics("trends");
        assert_eq!(metrics.blocks, 2);
        assert_eq!(metrics.rows, 2);
    }
}
