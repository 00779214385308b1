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

//! The coordinator-side final phase.
//!
//! Fans the block phase out to every node that may hold relevant blocks,
//! merges partial states by group-key bytes, finalizes aggregate values and
//! applies the global order and limit. Node-unreachable and timeout errors
//! are retried with exponential backoff before surfacing.

use std::cmp::Ordering as CmpOrdering;
use std::sync::Arc;
use std::time::Duration;

use altair_common::{AltairError, Node, Result, RowSet, Value, ValueRow};
use altair_expr::SortOrder;
use futures::future::join_all;
use hashbrown::hash_map::Entry;
use log::{debug, warn};
use tokio::time::sleep;

use crate::block_manager::BlockManager;
use crate::connector::NodeConnector;
use crate::context::QueryContext;
use crate::plan::{ExecutionPlan, NodePartials, OrderBy, ScanMode};

type MergeMap =
    hashbrown::HashMap<Vec<u8>, (Vec<Option<Value>>, Vec<crate::aggregate::AggState>), ahash::RandomState>;

/// Retry bounds for node calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_ms: 50,
        }
    }
}

/// Runs the final phase of a plan against a set of nodes reached through a
/// [`NodeConnector`].
pub struct ServerExecutor {
    blocks: Arc<BlockManager>,
    connector: Arc<dyn NodeConnector>,
    retry: RetryPolicy,
}

#[derive(Clone)]
struct Merged {
    key: Vec<u8>,
    out: Vec<Option<Value>>,
}

impl ServerExecutor {
    pub fn new(blocks: Arc<BlockManager>, connector: Arc<dyn NodeConnector>) -> Self {
        Self {
            blocks,
            connector,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Execute a plan to completion under its own deadline.
    pub async fn execute(&self, plan: &ExecutionPlan) -> Result<RowSet> {
        let ctx = QueryContext::new(plan.block_phase.deadline_ms);
        self.execute_with(plan, &ctx).await
    }

    /// Execute under an externally owned context (client disconnects cancel
    /// through it).
    pub async fn execute_with(&self, plan: &ExecutionPlan, ctx: &QueryContext) -> Result<RowSet> {
        debug!("{}", plan.explain());
        ctx.check()?;

        let window = plan.block_phase.window;
        let nodes = self.blocks.nodes_for(&plan.block_phase.table, window);
        if nodes.is_empty() {
            return Ok(RowSet::empty(plan.output.clone()));
        }

        let calls = nodes
            .iter()
            .map(|node| self.query_node(node, plan));
        let results = join_all(calls).await;
        // a canceled query drains in-flight results and discards them
        ctx.check()?;

        let mut merged = match plan.block_phase.mode {
            ScanMode::Aggregate => self.merge(plan, results)?,
            ScanMode::Sample => self.concat(plan, results)?,
        };

        let order = &plan.final_phase.order;
        let compare =
            |a: &Merged, b: &Merged| -> CmpOrdering { cmp_merged(a, b, order.as_ref()) };
        match plan.final_phase.limit {
            Some(limit) if limit < merged.len() => {
                merged = bounded_top_k(merged, limit, &compare);
            }
            _ => {}
        }
        merged.sort_by(&compare);

        ctx.check()?;
        let rows = merged
            .into_iter()
            .map(|m| ValueRow::new(plan.output.clone(), m.out))
            .collect::<Result<Vec<_>>>()?;
        Ok(RowSet::new(plan.output.clone(), rows))
    }

    /// One block-phase call against one node, retried on transport errors.
    async fn query_node(&self, node: &str, plan: &ExecutionPlan) -> Result<NodePartials> {
        let candidates: Vec<String> = self
            .blocks
            .candidates(&plan.block_phase.table, plan.block_phase.window, Some(node))
            .iter()
            .map(|b| b.meta.sig.to_string())
            .collect();
        let node = Node::new(node);
        let mut attempt = 0;
        loop {
            let result = match self.connector.make_client(&node) {
                Ok(client) => client.query(&plan.block_phase, &candidates).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(partials) => return Ok(partials),
                Err(e) if e.retryable() && attempt + 1 < self.retry.attempts => {
                    let backoff = self.retry.backoff_ms << attempt;
                    warn!("node {} failed ({e}), retrying in {backoff} ms", node.id);
                    sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Merge aggregate partials by group-key bytes and finalize.
    fn merge(
        &self,
        plan: &ExecutionPlan,
        results: Vec<Result<NodePartials>>,
    ) -> Result<Vec<Merged>> {
        let mut groups = MergeMap::default();
        for result in results {
            let partials = result?;
            self.surface_block_errors(plan, &partials)?;
            for row in partials.rows {
                match groups.entry(row.key) {
                    Entry::Vacant(slot) => {
                        slot.insert((row.values, row.states));
                    }
                    Entry::Occupied(mut slot) => {
                        let (_, states) = slot.get_mut();
                        for (state, other) in states.iter_mut().zip(row.states.iter()) {
                            state.merge(other)?;
                        }
                    }
                }
            }
        }
        let mut out = Vec::with_capacity(groups.len());
        for (key, (values, states)) in groups {
            let mut row = values;
            row.extend(states.iter().map(|s| s.finalize()));
            out.push(Merged { key, out: row });
        }
        Ok(out)
    }

    /// Sample mode: concatenate raw rows; the tiebreak key is the row
    /// itself so output stays deterministic.
    fn concat(
        &self,
        plan: &ExecutionPlan,
        results: Vec<Result<NodePartials>>,
    ) -> Result<Vec<Merged>> {
        let mut out = vec![];
        for result in results {
            let partials = result?;
            self.surface_block_errors(plan, &partials)?;
            for row in partials.rows {
                let mut key = vec![];
                for value in &row.values {
                    Value::write_key(value.as_ref(), &mut key);
                }
                out.push(Merged {
                    key,
                    out: row.values,
                });
            }
        }
        Ok(out)
    }

    fn surface_block_errors(&self, plan: &ExecutionPlan, partials: &NodePartials) -> Result<()> {
        if partials.errors.is_empty() {
            return Ok(());
        }
        if plan.final_phase.strict {
            let first = &partials.errors[0];
            return Err(AltairError::PlanExecution {
                block: first.block.clone(),
                message: first.message.clone(),
            });
        }
        for error in &partials.errors {
            warn!(
                "dropping failed block {} from lax plan: {}",
                error.block, error.message
            );
        }
        Ok(())
    }
}

/// Total order over merged rows: the ORDER BY columns first, then group-key
/// bytes as the stable secondary key.
fn cmp_merged(a: &Merged, b: &Merged, order: Option<&OrderBy>) -> CmpOrdering {
    if let Some(order_by) = order {
        for &index in &order_by.indices {
            let ordering = cmp_values(&a.out[index], &b.out[index]);
            let ordering = match order_by.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            };
            if ordering != CmpOrdering::Equal {
                return ordering;
            }
        }
    }
    a.key.cmp(&b.key)
}

/// Nulls sort last; incomparable pairs tie (the key tiebreak decides).
fn cmp_values(a: &Option<Value>, b: &Option<Value>) -> CmpOrdering {
    match (a, b) {
        (None, None) => CmpOrdering::Equal,
        (None, Some(_)) => CmpOrdering::Greater,
        (Some(_), None) => CmpOrdering::Less,
        (Some(a), Some(b)) => a.compare(b).unwrap_or(CmpOrdering::Equal),
    }
}

/// Keep the best `limit` entries without sorting the whole set: a bounded
/// max-heap ordered by `compare`, worst entry at the root for eviction.
fn bounded_top_k<F>(entries: Vec<Merged>, limit: usize, compare: &F) -> Vec<Merged>
where
    F: Fn(&Merged, &Merged) -> CmpOrdering,
{
    if limit == 0 {
        return vec![];
    }
    let mut heap: Vec<Merged> = Vec::with_capacity(limit + 1);
    for entry in entries {
        if heap.len() < limit {
            heap.push(entry);
            let last = heap.len() - 1;
            sift_up(&mut heap, last, compare);
        } else if compare(&entry, &heap[0]) == CmpOrdering::Less {
            heap[0] = entry;
            sift_down(&mut heap, 0, compare);
        }
    }
    heap
}

fn sift_up<F>(heap: &mut [Merged], mut index: usize, compare: &F)
where
    F: Fn(&Merged, &Merged) -> CmpOrdering,
{
    while index > 0 {
        let parent = (index - 1) / 2;
        if compare(&heap[index], &heap[parent]) == CmpOrdering::Greater {
            heap.swap(index, parent);
            index = parent;
        } else {
            break;
        }
    }
}

fn sift_down<F>(heap: &mut [Merged], mut index: usize, compare: &F)
where
    F: Fn(&Merged, &Merged) -> CmpOrdering,
{
    loop {
        let (left, right) = (2 * index + 1, 2 * index + 2);
        let mut largest = index;
        if left < heap.len() && compare(&heap[left], &heap[largest]) == CmpOrdering::Greater {
            largest = left;
        }
        if right < heap.len() && compare(&heap[right], &heap[largest]) == CmpOrdering::Greater
        {
            largest = right;
        }
        if largest == index {
            break;
        }
        heap.swap(index, largest);
        index = largest;
    }
}
