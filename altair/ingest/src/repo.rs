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

//! The spec repo: the current set of ingestible units and their placement.

use std::collections::HashMap;

use altair_common::time::{date_of, SECONDS_PER_DAY};
use altair_common::{Node, Result};
use log::{debug, info};

use crate::spec::{IngestSpec, SpecState};
use crate::table::{SourceType, TableDefinition};

/// One enumerated unit of source data, before it becomes a spec.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub id: String,
    pub domain: String,
    pub size: u64,
    /// Source-of-truth version; a changed version under the same signature
    /// forces a renew.
    pub version: String,
    pub macro_date: i64,
}

/// Enumerates source units for a table definition. Object-store and stream
/// listings implement this out of tree.
pub trait SourceInventory: Send + Sync {
    /// The single current unit of a swap table.
    fn latest(&self, table: &TableDefinition) -> Result<Option<SourceUnit>>;

    /// The unit of a roll table for one macro date (day start, unix secs).
    fn on_date(&self, table: &TableDefinition, date: i64) -> Result<Option<SourceUnit>>;

    /// All partitions of a stream table.
    fn partitions(&self, table: &TableDefinition) -> Result<Vec<SourceUnit>>;
}

/// Holds the current specs keyed by signature. Owned by the sync loop; the
/// query path never touches it.
#[derive(Default)]
pub struct SpecRepo {
    specs: HashMap<String, IngestSpec>,
    failures: HashMap<String, u32>,
}

impl SpecRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the spec set from the table definitions and diff it
    /// against the current set: new signatures enter NEW, missing ones
    /// transition to EXPIRED, version changes under a stable signature
    /// transition to RENEW.
    pub fn refresh(
        &mut self,
        tables: &[TableDefinition],
        inventory: &dyn SourceInventory,
        now: i64,
    ) -> Result<()> {
        let mut desired: HashMap<String, (String, SourceUnit)> = HashMap::new();
        for table in tables {
            let units = match table.source {
                SourceType::Swap => inventory.latest(table)?.into_iter().collect(),
                SourceType::Roll => {
                    let mut units = vec![];
                    for back in 0..i64::from(table.retention_days) {
                        let date = date_of(now) - back * SECONDS_PER_DAY;
                        units.extend(inventory.on_date(table, date)?);
                    }
                    units
                }
                SourceType::Stream => inventory.partitions(table)?,
            };
            for unit in units {
                let sig = format!("{}@{}", unit.id, unit.size);
                desired.insert(sig, (table.name().to_string(), unit));
            }
        }

        for spec in self.specs.values_mut() {
            if !desired.contains_key(&spec.signature()) && spec.state != SpecState::Expired {
                info!("spec {spec} superseded, expiring");
                spec.set_state(SpecState::Expired);
            }
        }
        for (sig, (table, unit)) in desired {
            match self.specs.get_mut(&sig) {
                Some(existing) => {
                    if existing.version != unit.version {
                        info!(
                            "spec {existing} version {} -> {}, renewing",
                            existing.version, unit.version
                        );
                        existing.version = unit.version;
                        existing.set_state(SpecState::Renew);
                    }
                }
                None => {
                    let spec = IngestSpec::new(
                        table,
                        unit.version,
                        unit.id,
                        unit.domain,
                        unit.size,
                        SpecState::New,
                        unit.macro_date,
                    );
                    debug!("new spec {spec}");
                    self.specs.insert(sig, spec);
                }
            }
        }
        Ok(())
    }

    /// Place every unassigned, live spec on the active node with the least
    /// assigned bytes; ties break on lexicographic node id. Specs stuck on
    /// inactive nodes are freed for reassignment first.
    pub fn assign(&mut self, nodes: &[Node]) {
        let mut active: Vec<&Node> = nodes.iter().filter(|n| n.active).collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        if active.is_empty() {
            return;
        }

        // expired specs still occupy bytes until their blocks are offloaded,
        // so they count toward the load their node carries
        let mut load: HashMap<&str, u64> =
            active.iter().map(|n| (n.id.as_str(), 0)).collect();
        for spec in self.specs.values_mut() {
            if let Some(node) = spec.affinity.clone() {
                match load.get_mut(node.as_str()) {
                    Some(bytes) => *bytes += spec.size,
                    None => spec.clear_affinity(),
                }
            }
        }

        let mut pending: Vec<String> = self
            .specs
            .values()
            .filter(|s| !s.assigned() && s.state != SpecState::Expired)
            .map(|s| s.signature())
            .collect();
        pending.sort();
        for sig in pending {
            let node = active
                .iter()
                .min_by_key(|n| load.get(n.id.as_str()).copied().unwrap_or(0))
                .map(|n| n.id.clone())
                .unwrap_or_default();
            if let Some(spec) = self.specs.get_mut(&sig) {
                debug!("assigning {spec} to {node}");
                if let Some(bytes) = load.get_mut(node.as_str()) {
                    *bytes += spec.size;
                }
                spec.set_affinity(node);
            }
        }
    }

    /// Whether blocks of `spec_sig` resident on `node` should be expired:
    /// the spec is absent, EXPIRED, or assigned elsewhere.
    pub fn should_expire(&self, spec_sig: &str, node: &str) -> bool {
        match self.specs.get(spec_sig) {
            None => true,
            Some(spec) if spec.state == SpecState::Expired => true,
            Some(spec) => matches!(&spec.affinity, Some(n) if n != node),
        }
    }

    pub fn specs(&self) -> impl Iterator<Item = &IngestSpec> {
        self.specs.values()
    }

    pub fn get(&self, sig: &str) -> Option<&IngestSpec> {
        self.specs.get(sig)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn mark_ready(&mut self, sig: &str) {
        if let Some(spec) = self.specs.get_mut(sig) {
            spec.set_state(SpecState::Ready);
        }
        self.failures.remove(sig);
    }

    /// Count one ingestion failure. At `threshold` the spec's affinity is
    /// cleared so the next assignment may move it; returns true when that
    /// happened.
    pub fn record_failure(&mut self, sig: &str, threshold: u32) -> bool {
        let count = self.failures.entry(sig.to_string()).or_default();
        *count += 1;
        if *count >= threshold {
            if let Some(spec) = self.specs.get_mut(sig) {
                info!("spec {spec} failed {count} times, releasing affinity");
                spec.clear_affinity();
            }
            self.failures.remove(sig);
            return true;
        }
        false
    }

    /// Drop EXPIRED specs whose blocks are fully gone.
    pub fn purge_expired(&mut self, mut gone: impl FnMut(&str) -> bool) {
        self.specs
            .retain(|sig, spec| !(spec.state == SpecState::Expired && gone(sig)));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use altair_common::{Schema, TableMeta};

    use super::*;

    /// An inventory backed by an in-memory listing per table.
    #[derive(Default)]
    struct FixedInventory {
        swap: HashMap<String, SourceUnit>,
        roll: HashMap<(String, i64), SourceUnit>,
    }

    impl SourceInventory for FixedInventory {
        fn latest(&self, table: &TableDefinition) -> Result<Option<SourceUnit>> {
            Ok(self.swap.get(table.name()).cloned())
        }

        fn on_date(&self, table: &TableDefinition, date: i64) -> Result<Option<SourceUnit>> {
            Ok(self.roll.get(&(table.name().to_string(), date)).cloned())
        }

        fn partitions(&self, _table: &TableDefinition) -> Result<Vec<SourceUnit>> {
            Ok(vec![])
        }
    }

    fn unit(id: &str, size: u64, version: &str) -> SourceUnit {
        SourceUnit {
            id: id.to_string(),
            domain: "s3://bucket".to_string(),
            size,
            version: version.to_string(),
            macro_date: 0,
        }
    }

    fn swap_table(name: &str) -> TableDefinition {
        let meta = TableMeta::new(
            name,
            Arc::new(Schema::parse("ROW<_time_:BIGINT,v:INT>").unwrap()),
        );
        TableDefinition::new(meta, SourceType::Swap, "s3://bucket", format!("{name}.csv"))
    }

    #[test]
    fn diff_transitions() {
        let mut repo = SpecRepo::new();
        let table = swap_table("trends");
        let mut inventory = FixedInventory::default();
        inventory
            .swap
            .insert("trends".into(), unit("trends.csv", 100, "v1"));

        repo.refresh(&[table.clone()], &inventory, 0).unwrap();
        assert_eq!(repo.len(), 1);
        let sig = "trends.csv@100";
        assert_eq!(repo.get(sig).unwrap().state, SpecState::New);

        // unchanged refresh keeps state
        repo.mark_ready(sig);
        repo.refresh(&[table.clone()], &inventory, 0).unwrap();
        assert_eq!(repo.get(sig).unwrap().state, SpecState::Ready);

        // same signature, new version: renew
        inventory
            .swap
            .insert("trends".into(), unit("trends.csv", 100, "v2"));
        repo.refresh(&[table.clone()], &inventory, 0).unwrap();
        assert_eq!(repo.get(sig).unwrap().state, SpecState::Renew);
        assert_eq!(repo.get(sig).unwrap().version, "v2");

        // different size: a brand new signature; the old one expires
        inventory
            .swap
            .insert("trends".into(), unit("trends.csv", 200, "v3"));
        repo.refresh(&[table], &inventory, 0).unwrap();
        assert_eq!(repo.get(sig).unwrap().state, SpecState::Expired);
        assert_eq!(repo.get("trends.csv@200").unwrap().state, SpecState::New);
    }

    #[test]
    fn roll_tables_enumerate_retention_days() {
        let meta = TableMeta::new(
            "logs",
            Arc::new(Schema::parse("ROW<_time_:BIGINT,v:INT>").unwrap()),
        );
        let table = TableDefinition::new(meta, SourceType::Roll, "s3://bucket", "logs")
            .with_retention(3);
        let mut inventory = FixedInventory::default();
        let now = 10 * SECONDS_PER_DAY + 5;
        for back in 0..5i64 {
            let date = date_of(now) - back * SECONDS_PER_DAY;
            inventory.roll.insert(
                ("logs".to_string(), date),
                unit(&format!("logs/{date}.csv"), 10, "v1"),
            );
        }
        let mut repo = SpecRepo::new();
        repo.refresh(&[table], &inventory, now).unwrap();
        // only the retained three days become specs
        assert_eq!(repo.len(), 3);
    }

    #[test]
    fn least_loaded_assignment_with_lexicographic_ties() {
        let mut repo = SpecRepo::new();
        for (id, size) in [("a.csv", 10u64), ("b.csv", 10), ("c.csv", 4)] {
            let spec = IngestSpec::new(
                "t",
                "v1",
                id,
                "s3://bucket",
                size,
                SpecState::New,
                0,
            );
            repo.specs.insert(spec.signature(), spec);
        }
        repo.assign(&[Node::new("n2"), Node::new("n1")]);

        // a.csv@10 -> n1 (tie, lexicographic), b.csv@10 -> n2 (least),
        // c.csv@4 -> n1? no: n1=10, n2=10 tie -> n1
        assert_eq!(repo.get("a.csv@10").unwrap().affinity.as_deref(), Some("n1"));
        assert_eq!(repo.get("b.csv@10").unwrap().affinity.as_deref(), Some("n2"));
        assert_eq!(repo.get("c.csv@4").unwrap().affinity.as_deref(), Some("n1"));
    }

    #[test]
    fn inactive_nodes_release_their_specs() {
        let mut repo = SpecRepo::new();
        let mut spec = IngestSpec::new("t", "v1", "a.csv", "d", 1, SpecState::Ready, 0);
        spec.set_affinity("gone");
        repo.specs.insert(spec.signature(), spec);

        repo.assign(&[Node::new("n1"), Node::inactive("gone")]);
        assert_eq!(repo.get("a.csv@1").unwrap().affinity.as_deref(), Some("n1"));
    }

    #[test]
    fn should_expire_cases() {
        let mut repo = SpecRepo::new();
        let mut spec = IngestSpec::new("t", "v1", "a.csv", "d", 1, SpecState::Ready, 0);
        spec.set_affinity("n1");
        repo.specs.insert(spec.signature(), spec);

        assert!(!repo.should_expire("a.csv@1", "n1"));
        // moved assignment
        assert!(repo.should_expire("a.csv@1", "n2"));
        // absent signature
        assert!(repo.should_expire("missing@0", "n1"));
        // expired state
        repo.specs.get_mut("a.csv@1").unwrap().set_state(SpecState::Expired);
        assert!(repo.should_expire("a.csv@1", "n1"));
    }

    #[test]
    fn repeated_failures_release_affinity() {
        let mut repo = SpecRepo::new();
        let mut spec = IngestSpec::new("t", "v1", "a.csv", "d", 1, SpecState::New, 0);
        spec.set_affinity("n1");
        repo.specs.insert(spec.signature(), spec);

        assert!(!repo.record_failure("a.csv@1", 3));
        assert!(!repo.record_failure("a.csv@1", 3));
        assert!(repo.record_failure("a.csv@1", 3));
        assert!(!repo.get("a.csv@1").unwrap().assigned());
        // counter reset after the release
        assert!(!repo.record_failure("a.csv@1", 3));
    }

    #[test]
    fn swap_signature_is_stable_for_a_real_file() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trends.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"2019-01-01,yoga,3\n").unwrap();
        drop(file);

        let stat = std::fs::metadata(&path).unwrap();
        let make_unit = || SourceUnit {
            id: path.display().to_string(),
            domain: "file://".to_string(),
            size: stat.len(),
            version: format!("{:?}", stat.modified().unwrap()),
            macro_date: 0,
        };
        let u1 = make_unit();
        let u2 = make_unit();
        // same file, same signature across enumerations
        assert_eq!(
            format!("{}@{}", u1.id, u1.size),
            format!("{}@{}", u2.id, u2.size)
        );
    }
}
