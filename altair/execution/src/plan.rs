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

//! The two-phase physical execution plan.

use altair_common::{SchemaRef, Value};
use altair_expr::SortOrder;
use serde::{Deserialize, Serialize};

use crate::aggregate::{AggState, AggregateEval};
use crate::eval::ValueEval;

/// An unbounded time window.
pub const ALL_TIME: (i64, i64) = (i64::MIN, i64::MAX);

/// A named projection evaluator (one group-by key or sample column).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedEval {
    pub name: String,
    pub eval: ValueEval,
}

/// A named aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedAggregate {
    pub name: String,
    pub agg: AggregateEval,
}

/// An equality probe against a column's bloom filter; a block answering
/// "definitely absent" is skipped without scanning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloomProbe {
    pub column: String,
    pub value: Value,
}

/// How the block phase treats rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanMode {
    /// Group and fold partial aggregate states.
    Aggregate,
    /// Emit raw projected rows, no aggregation.
    Sample,
}

/// The per-block phase of a plan. Serializable: it is shipped to nodes
/// together with the candidate block list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockPlan {
    pub table: String,
    pub predicate: Option<ValueEval>,
    pub keys: Vec<NamedEval>,
    pub aggregates: Vec<NamedAggregate>,
    pub probes: Vec<BloomProbe>,
    pub mode: ScanMode,
    /// `[start, end)` prune window; blocks with no overlap are never read.
    pub window: (i64, i64),
    /// Per-block row cap in sample mode.
    pub row_limit: Option<usize>,
    /// Plan deadline; zero means unbounded.
    pub deadline_ms: u64,
}

impl BlockPlan {
    pub fn init_states(&self) -> Vec<AggState> {
        self.aggregates.iter().map(|a| a.agg.init()).collect()
    }
}

/// Final ordering: 0-based output-schema column indices, one direction.
/// Ties (and plans with no ordering) fall back to group-key bytes, which
/// keeps output deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub indices: Vec<usize>,
    pub order: SortOrder,
}

/// The coordinator phase: merge partials, finalize, order, bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalPlan {
    pub order: Option<OrderBy>,
    pub limit: Option<usize>,
    /// Strict plans fail the whole query on any block error; lax plans drop
    /// the failed blocks and return partial results.
    pub strict: bool,
}

/// A compiled query: block phase, final phase and the output schema.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub block_phase: BlockPlan,
    pub final_phase: FinalPlan,
    pub output: SchemaRef,
}

impl ExecutionPlan {
    /// Narrow the prune window to its intersection with `window`.
    pub fn set_window(&mut self, window: (i64, i64)) {
        let current = self.block_phase.window;
        self.block_phase.window = (current.0.max(window.0), current.1.min(window.1));
    }

    pub fn with_deadline(mut self, deadline_ms: u64) -> Self {
        self.block_phase.deadline_ms = deadline_ms;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.final_phase.strict = strict;
        self
    }

    /// Human-readable plan dump for logs.
    pub fn explain(&self) -> String {
        let mut out = format!("plan: table={}\n", self.block_phase.table);
        out.push_str(&format!(
            "  window: [{}, {})\n",
            self.block_phase.window.0, self.block_phase.window.1
        ));
        if let Some(p) = &self.block_phase.predicate {
            out.push_str(&format!("  predicate: {p:?}\n"));
        }
        for probe in &self.block_phase.probes {
            out.push_str(&format!(
                "  bloom probe: {} = {}\n",
                probe.column, probe.value
            ));
        }
        out.push_str(&format!(
            "  block phase: mode={:?} keys={:?} aggregates={:?}\n",
            self.block_phase.mode,
            self.block_phase
                .keys
                .iter()
                .map(|k| k.name.as_str())
                .collect::<Vec<_>>(),
            self.block_phase
                .aggregates
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>(),
        ));
        out.push_str(&format!(
            "  final phase: order={:?} limit={:?} strict={}\n",
            self.final_phase.order, self.final_phase.limit, self.final_phase.strict
        ));
        out.push_str(&format!("  output: {}", self.output));
        out
    }
}

/// One partial group emitted by the block phase: the encoded group key, the
/// key values, and the running aggregate states. In sample mode `values`
/// holds the projected row and the other fields stay empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialRow {
    pub key: Vec<u8>,
    pub values: Vec<Option<Value>>,
    pub states: Vec<AggState>,
}

/// A block that failed to evaluate, reported alongside surviving results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockError {
    pub block: String,
    pub message: String,
}

/// Everything one node returns for a block-phase request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodePartials {
    pub rows: Vec<PartialRow>,
    pub errors: Vec<BlockError>,
}
