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

//! Server configuration knobs.

use serde::{Deserialize, Serialize};

/// Tunables of the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Period of the node sync reconciler.
    pub sync_interval_ms: u64,
    /// Consecutive ingestion failures before a spec's affinity is cleared
    /// for reassignment.
    pub ingest_fail_threshold: u32,
    /// Node call attempts before a transport error surfaces.
    pub retry_attempts: usize,
    /// Base backoff between attempts; doubles each retry.
    pub retry_backoff_ms: u64,
    /// Deadline stamped on plans that do not carry their own.
    pub default_deadline_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            sync_interval_ms: 5_000,
            ingest_fail_threshold: 3,
            retry_attempts: 3,
            retry_backoff_ms: 50,
            default_deadline_ms: 30_000,
        }
    }
}
