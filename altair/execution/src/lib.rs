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

//! Execution runtime.
//!
//! A compiled query is a two-phase [`plan::ExecutionPlan`]: the block phase
//! runs on every candidate block of every storage node and emits partial
//! group states; the final phase merges partials at the coordinator and
//! applies ORDER BY and LIMIT. The [`block_manager::BlockManager`] is the
//! registry both sides consult; executors are parameterized with a handle to
//! it rather than owning it.

pub mod aggregate;
pub mod block_manager;
pub mod connector;
pub mod context;
pub mod eval;
pub mod node;
pub mod plan;
pub mod planner;
pub mod server;
pub mod test_util;

pub use block_manager::{BlockManager, BlockSignature, DataBlock, NodeState};
pub use connector::{LocalConnector, NodeConnector, NodeQueryClient};
pub use context::QueryContext;
pub use node::NodeExecutor;
pub use plan::{BlockPlan, ExecutionPlan, NodePartials};
pub use planner::compile;
pub use server::{RetryPolicy, ServerExecutor};
