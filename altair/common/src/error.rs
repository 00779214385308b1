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

//! Error type used across the Altair workspace.

use thiserror::Error;

/// Result type returned by all fallible Altair APIs.
pub type Result<T, E = AltairError> = std::result::Result<T, E>;

/// The closed set of error kinds surfaced to callers.
///
/// Build-time errors (`InvalidQuery`, `UnknownTable`, `TypeMismatch`,
/// `UngroupedProjection`) fail locally at compilation. Runtime errors at a
/// node are attached to a per-block error list; the coordinator promotes
/// them to `PlanExecution` under strict plans. `NodeUnreachable` and
/// `Timeout` are retried with exponential backoff before surfacing;
/// `Canceled` is never retried. `Internal` indicates a broken invariant and
/// terminates the query.
#[derive(Debug, Error)]
pub enum AltairError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("ungrouped projection: {0}")]
    UngroupedProjection(String),

    #[error("plan execution failed on block {block}: {message}")]
    PlanExecution { block: String, message: String },

    #[error("node unreachable: {0}")]
    NodeUnreachable(String),

    #[error("query deadline exceeded")]
    Timeout,

    #[error("query canceled")]
    Canceled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AltairError {
    /// Stable machine-readable code for the wire surface.
    pub fn code(&self) -> &'static str {
        match self {
            AltairError::InvalidQuery(_) => "INVALID_QUERY",
            AltairError::UnknownTable(_) => "UNKNOWN_TABLE",
            AltairError::TypeMismatch(_) => "TYPE_MISMATCH",
            AltairError::UngroupedProjection(_) => "UNGROUPED_PROJECTION",
            AltairError::PlanExecution { .. } => "PLAN_EXECUTION",
            AltairError::NodeUnreachable(_) => "NODE_UNREACHABLE",
            AltairError::Timeout => "TIMEOUT",
            AltairError::Canceled => "CANCELED",
            AltairError::Internal(_) => "INTERNAL",
        }
    }

    /// Whether a caller may retry the failed call.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            AltairError::NodeUnreachable(_) | AltairError::Timeout
        )
    }
}
