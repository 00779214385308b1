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

//! Ingest specs: identifiable units of source data.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecState {
    /// Requires data sync.
    New,
    /// Data loaded and visible to queries.
    Ready,
    /// Source changed under the same signature; data needs renew.
    Renew,
    /// Superseded; waiting for offload.
    Expired,
}

/// A descriptor of one ingestible unit of source data. Two specs with equal
/// signatures (`"{id}@{size}"`) represent the same data, across restarts
/// and across the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestSpec {
    pub table: String,
    /// Source-of-truth version (e.g. file modify time, stream offset era).
    pub version: String,
    /// Source identity, e.g. a file path or partition name.
    pub id: String,
    /// Protocol/host the id lives under.
    pub domain: String,
    pub size: u64,
    pub state: SpecState,
    /// Coarse calendar bucket (unix seconds at day start).
    pub macro_date: i64,
    /// Node this spec is placed on, once assigned.
    pub affinity: Option<String>,
}

impl IngestSpec {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        table: impl Into<String>,
        version: impl Into<String>,
        id: impl Into<String>,
        domain: impl Into<String>,
        size: u64,
        state: SpecState,
        macro_date: i64,
    ) -> Self {
        Self {
            table: table.into(),
            version: version.into(),
            id: id.into(),
            domain: domain.into(),
            size,
            state,
            macro_date,
            affinity: None,
        }
    }

    /// Stable identity: `"{id}@{size}"`.
    pub fn signature(&self) -> String {
        format!("{}@{}", self.id, self.size)
    }

    pub fn set_state(&mut self, state: SpecState) {
        self.state = state;
    }

    pub fn set_affinity(&mut self, node: impl Into<String>) {
        self.affinity = Some(node.into());
    }

    pub fn clear_affinity(&mut self) {
        self.affinity = None;
    }

    pub fn assigned(&self) -> bool {
        self.affinity.is_some()
    }

    /// Whether the spec still needs an ingestion task.
    pub fn need_sync(&self) -> bool {
        self.state != SpecState::Ready
    }

    /// Assigned and loaded: the data is queryable.
    pub fn materialized(&self) -> bool {
        self.assigned() && self.state == SpecState::Ready
    }
}

impl fmt::Display for IngestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[IS {} - {}]", self.version, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_shape() {
        let spec = IngestSpec::new(
            "trends",
            "v1",
            "s3://bucket/2019-01-01.csv",
            "s3://bucket",
            4096,
            SpecState::New,
            0,
        );
        assert_eq!(spec.signature(), "s3://bucket/2019-01-01.csv@4096");
    }

    #[test]
    fn serde_round_trip_preserves_signature() {
        let mut spec = IngestSpec::new(
            "trends",
            "1546300800",
            "s3://bucket/file.csv",
            "s3://bucket",
            123,
            SpecState::Renew,
            86_400,
        );
        spec.set_affinity("n1");
        let text = serde_json::to_string(&spec).unwrap();
        let back: IngestSpec = serde_json::from_str(&text).unwrap();
        assert_eq!(back.signature(), spec.signature());
        assert_eq!(back, spec);
    }

    #[test]
    fn lifecycle_flags() {
        let mut spec =
            IngestSpec::new("t", "v", "id", "d", 1, SpecState::New, 0);
        assert!(spec.need_sync());
        assert!(!spec.materialized());
        spec.set_affinity("n1");
        spec.set_state(SpecState::Ready);
        assert!(!spec.need_sync());
        assert!(spec.materialized());
    }
}
