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

//! The node-side block-phase executor.
//!
//! Selects candidate blocks resident on this node, probes block-skip
//! predicates against bloom filters, then scans survivors on a fixed-size
//! compute pool. Each block scan is synchronous and non-blocking; the
//! shared cancel flag is checked between blocks, never between rows.

use std::collections::HashSet;
use std::sync::Arc;

use altair_common::{AltairError, Result, Value};
use altair_memory::Batch;
use log::debug;
use tokio::sync::Semaphore;

use crate::aggregate::AggState;
use crate::block_manager::{BlockManager, NodeState};
use crate::context::QueryContext;
use crate::plan::{BlockError, BlockPlan, NodePartials, PartialRow, ScanMode};

type GroupMap =
    hashbrown::HashMap<Vec<u8>, (Vec<Option<Value>>, Vec<AggState>), ahash::RandomState>;

/// Executes block phases against the blocks resident on one node.
pub struct NodeExecutor {
    node: String,
    blocks: Arc<BlockManager>,
    permits: Arc<Semaphore>,
}

impl NodeExecutor {
    pub fn new(node: impl Into<String>, blocks: Arc<BlockManager>) -> Self {
        Self {
            node: node.into(),
            blocks,
            permits: Arc::new(Semaphore::new(num_cpus::get().max(1))),
        }
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn state(&self) -> NodeState {
        self.blocks.node_state(&self.node)
    }

    /// Run the block phase over this node's candidate blocks, optionally
    /// restricted to a coordinator-supplied candidate list.
    pub async fn execute(
        &self,
        plan: &BlockPlan,
        candidates: Option<&[String]>,
    ) -> Result<NodePartials> {
        let ctx = QueryContext::new(plan.deadline_ms);
        self.execute_with(plan, candidates, &ctx).await
    }

    pub async fn execute_with(
        &self,
        plan: &BlockPlan,
        candidates: Option<&[String]>,
        ctx: &QueryContext,
    ) -> Result<NodePartials> {
        let mut blocks = self
            .blocks
            .candidates(&plan.table, plan.window, Some(&self.node));
        if let Some(list) = candidates {
            let wanted: HashSet<&str> = list.iter().map(String::as_str).collect();
            blocks.retain(|b| wanted.contains(b.meta.sig.to_string().as_str()));
        }
        let before = blocks.len();
        blocks.retain(|b| {
            plan.probes
                .iter()
                .all(|p| b.data.probably(&p.column, &p.value))
        });
        if blocks.len() < before {
            debug!(
                "node {}: bloom probes skipped {} of {} blocks",
                self.node,
                before - blocks.len(),
                before
            );
        }

        let plan = Arc::new(plan.clone());
        let mut handles = Vec::with_capacity(blocks.len());
        let mut dispatch_error = None;
        for block in blocks {
            // cancel checks happen between blocks only
            if let Err(e) = ctx.check() {
                dispatch_error = Some(e);
                break;
            }
            let permit = match Arc::clone(&self.permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    dispatch_error =
                        Some(AltairError::Internal("compute pool closed".into()));
                    break;
                }
            };
            let plan = Arc::clone(&plan);
            let ctx = ctx.clone();
            let sig = block.meta.sig.to_string();
            let batch = Arc::clone(&block.data);
            handles.push((
                sig,
                tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    ctx.check()?;
                    scan_block(&plan, &batch)
                }),
            ));
        }

        // drain everything in flight even when canceling, then discard
        let mut partials = NodePartials::default();
        for (sig, handle) in handles {
            match handle.await {
                Ok(Ok(rows)) => partials.rows.extend(rows),
                Ok(Err(AltairError::Canceled)) => {}
                Ok(Err(e)) => partials.errors.push(BlockError {
                    block: sig,
                    message: e.to_string(),
                }),
                Err(e) => partials.errors.push(BlockError {
                    block: sig,
                    message: format!("scan worker failed: {e}"),
                }),
            }
        }
        if let Some(e) = dispatch_error {
            return Err(e);
        }
        ctx.check()?;
        Ok(partials)
    }
}

/// Scan one sealed batch: filter, group, fold. Deterministic in row order
/// within the block.
fn scan_block(plan: &BlockPlan, batch: &Batch) -> Result<Vec<PartialRow>> {
    match plan.mode {
        ScanMode::Aggregate => {
            let mut groups = GroupMap::default();
            let mut cursor = batch.accessor();
            for i in 0..batch.rows() {
                cursor.seek(i);
                if let Some(predicate) = &plan.predicate {
                    if !matches!(predicate.eval(&cursor)?, Some(Value::Bool(true))) {
                        continue;
                    }
                }
                let mut key = vec![];
                let mut values = Vec::with_capacity(plan.keys.len());
                for k in &plan.keys {
                    let v = k.eval.eval(&cursor)?;
                    Value::write_key(v.as_ref(), &mut key);
                    values.push(v);
                }
                let entry = groups
                    .entry(key)
                    .or_insert_with(|| (values, plan.init_states()));
                for (aggregate, state) in plan.aggregates.iter().zip(entry.1.iter_mut()) {
                    aggregate.agg.fold(state, &cursor)?;
                }
            }
            Ok(groups
                .into_iter()
                .map(|(key, (values, states))| PartialRow { key, values, states })
                .collect())
        }
        ScanMode::Sample => {
            let mut rows = vec![];
            let mut cursor = batch.accessor();
            for i in 0..batch.rows() {
                if plan.row_limit.map(|l| rows.len() >= l).unwrap_or(false) {
                    break;
                }
                cursor.seek(i);
                if let Some(predicate) = &plan.predicate {
                    if !matches!(predicate.eval(&cursor)?, Some(Value::Bool(true))) {
                        continue;
                    }
                }
                let mut values = Vec::with_capacity(plan.keys.len());
                for k in &plan.keys {
                    values.push(k.eval.eval(&cursor)?);
                }
                rows.push(PartialRow {
                    key: vec![],
                    values,
                    states: vec![],
                });
            }
            Ok(rows)
        }
    }
}

#[cfg(test)]
mod tests {
    use altair_expr::expr_fn::{col, lit, sum};
    use altair_expr::table;

    use super::*;
    use crate::planner::compile;
    use crate::test_util::{trends_block, trends_meta};

    #[tokio::test]
    async fn partial_groups_per_block() {
        let bm = BlockManager::new();
        let meta = trends_meta();
        trends_block(
            &bm,
            &meta,
            "n1",
            0,
            (0, 100),
            &[(1, "yoga", 3), (2, "yoga", 5), (3, "gym", 7)],
        );

        let query = table("trends", meta)
            .filter(col("query").eq(lit("yoga")))
            .select(vec![
                col("query"),
                sum(col("count")).alias("total"),
            ])
            .group_by(&[1]);
        let plan = compile(&query).unwrap();

        let executor = NodeExecutor::new("n1", bm);
        let partials = executor
            .execute(&plan.block_phase, None)
            .await
            .unwrap();
        assert!(partials.errors.is_empty());
        assert_eq!(partials.rows.len(), 1);
        assert_eq!(
            partials.rows[0].states[0].finalize(),
            Some(Value::BigInt(8))
        );
    }

    #[tokio::test]
    async fn other_nodes_blocks_are_invisible() {
        let bm = BlockManager::new();
        let meta = trends_meta();
        trends_block(&bm, &meta, "n2", 0, (0, 100), &[(1, "yoga", 3)]);

        let query = table("trends", meta)
            .select(vec![col("query"), sum(col("count")).alias("total")])
            .group_by(&[1]);
        let plan = compile(&query).unwrap();

        let executor = NodeExecutor::new("n1", bm);
        let partials = executor.execute(&plan.block_phase, None).await.unwrap();
        assert!(partials.rows.is_empty());
    }

    #[tokio::test]
    async fn bloom_probe_skips_block() {
        let bm = BlockManager::new();
        let meta = trends_meta();
        trends_block(&bm, &meta, "n1", 0, (0, 100), &[(1, "gym", 3)]);

        let query = table("trends", meta)
            .filter(col("query").eq(lit("definitely-not-present")))
            .select(vec![col("query"), sum(col("count")).alias("total")])
            .group_by(&[1]);
        let plan = compile(&query).unwrap();
        assert_eq!(plan.block_phase.probes.len(), 1);

        let executor = NodeExecutor::new("n1", bm);
        let partials = executor.execute(&plan.block_phase, None).await.unwrap();
        assert!(partials.rows.is_empty());
    }
}
