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

//! Node-side ingestion: turn one spec's rows into registered blocks.

use std::sync::Arc;

use altair_common::time::SECONDS_PER_DAY;
use altair_common::{Result, TableMeta, ValueRow};
use altair_execution::block_manager::{BlockManager, BlockMeta, BlockSignature, DataBlock};
use altair_memory::Batch;
use log::info;

use crate::spec::IngestSpec;

/// Fetches the rows of one spec. Concrete file/stream readers implement
/// this out of tree; tests use in-memory sources.
pub trait SpecSource: Send + Sync {
    fn fetch(&self, spec: &IngestSpec) -> Result<Vec<ValueRow>>;
}

/// Slices a spec's rows into capacity-bounded sealed batches and registers
/// the resulting blocks with the block manager.
pub struct BlockLoader {
    blocks: Arc<BlockManager>,
}

impl BlockLoader {
    pub fn new(blocks: Arc<BlockManager>) -> Self {
        Self { blocks }
    }

    /// Ingest `spec` on `node`. Blocks of an earlier load of the same spec
    /// on this node are replaced wholesale.
    pub fn load(
        &self,
        table: &TableMeta,
        spec: &IngestSpec,
        node: &str,
        source: &dyn SpecSource,
    ) -> Result<Vec<BlockSignature>> {
        let rows = source.fetch(spec)?;
        let replaced = self.blocks.remove_spec(&spec.signature(), node);
        if !replaced.is_empty() {
            info!("replacing {} blocks of {spec} on {node}", replaced.len());
        }

        let mut sigs = vec![];
        let mut seq = 0u64;
        let mut pending = rows.as_slice();
        while !pending.is_empty() {
            let take = pending.len().min(table.options.capacity);
            let (chunk, rest) = pending.split_at(take);
            pending = rest;

            let mut batch = Batch::new(table);
            for row in chunk {
                batch.add(row)?;
            }
            batch.seal();

            // window from observed event times, else the spec's macro date
            let window = batch
                .time_range()
                .map(|(lo, hi)| (lo, hi + 1))
                .unwrap_or((spec.macro_date, spec.macro_date + SECONDS_PER_DAY));
            let sig = BlockSignature::new(table.name.clone(), spec.signature(), seq);
            seq += 1;
            let meta = BlockMeta {
                sig: sig.clone(),
                residence: node.to_string(),
                window,
                rows: batch.rows(),
                raw_size: batch.raw_size(),
            };
            self.blocks.add(DataBlock::new(meta, Arc::new(batch)));
            sigs.push(sig);
        }
        info!(
            "ingested {spec} on {node}: {} rows into {} blocks",
            rows.len(),
            sigs.len()
        );
        Ok(sigs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use altair_common::row::row_of;
    use altair_common::{Schema, TableOptions, Value};

    use super::*;
    use crate::spec::SpecState;

    struct FixedSource {
        rows: Vec<ValueRow>,
    }

    impl SpecSource for FixedSource {
        fn fetch(&self, _spec: &IngestSpec) -> Result<Vec<ValueRow>> {
            Ok(self.rows.clone())
        }
    }

    fn meta(capacity: usize) -> Arc<TableMeta> {
        TableMeta::with_options(
            "trends",
            Arc::new(Schema::parse("ROW<_time_:BIGINT,query:VARCHAR,count:INT>").unwrap()),
            TableOptions {
                capacity,
                bloom_columns: HashSet::new(),
            },
        )
    }

    fn rows(n: usize, schema: &altair_common::SchemaRef) -> Vec<ValueRow> {
        (0..n)
            .map(|i| {
                row_of(
                    schema,
                    vec![
                        ("_time_", Value::BigInt(100 + i as i64)),
                        ("query", Value::Varchar("q".into())),
                        ("count", Value::Int(1)),
                    ],
                )
                .unwrap()
            })
            .collect()
    }

    fn spec() -> IngestSpec {
        IngestSpec::new(
            "trends",
            "v1",
            "s3://bucket/file.csv",
            "s3://bucket",
            1000,
            SpecState::New,
            86_400,
        )
    }

    #[test]
    fn slices_at_capacity() {
        let bm = BlockManager::new();
        let meta = meta(4);
        let loader = BlockLoader::new(Arc::clone(&bm));
        let source = FixedSource {
            rows: rows(10, &meta.schema),
        };

        let sigs = loader.load(&meta, &spec(), "n1", &source).unwrap();
        assert_eq!(sigs.len(), 3); // 4 + 4 + 2
        let blocks = bm.blocks_on("n1");
        assert_eq!(blocks.iter().map(|b| b.meta.rows).sum::<usize>(), 10);
        assert!(blocks.iter().all(|b| b.data.sealed()));
        // sequence ids distinguish sibling blocks of one spec
        let seqs: HashSet<u64> = sigs.iter().map(|s| s.seq).collect();
        assert_eq!(seqs.len(), 3);
    }

    #[test]
    fn window_comes_from_event_times() {
        let bm = BlockManager::new();
        let meta = meta(100);
        let loader = BlockLoader::new(Arc::clone(&bm));
        let source = FixedSource {
            rows: rows(5, &meta.schema),
        };
        loader.load(&meta, &spec(), "n1", &source).unwrap();
        let block = &bm.blocks_on("n1")[0];
        assert_eq!(block.meta.window, (100, 105));
    }

    #[test]
    fn reload_replaces_previous_blocks() {
        let bm = BlockManager::new();
        let meta = meta(100);
        let loader = BlockLoader::new(Arc::clone(&bm));
        let source = FixedSource {
            rows: rows(5, &meta.schema),
        };
        loader.load(&meta, &spec(), "n1", &source).unwrap();
        loader.load(&meta, &spec(), "n1", &source).unwrap();
        // renewed, not duplicated
        assert_eq!(bm.blocks_on("n1").len(), 1);
    }

    #[test]
    fn empty_source_registers_nothing() {
        let bm = BlockManager::new();
        let meta = meta(100);
        let loader = BlockLoader::new(Arc::clone(&bm));
        let source = FixedSource { rows: vec![] };
        let sigs = loader.load(&meta, &spec(), "n1", &source).unwrap();
        assert!(sigs.is_empty());
        assert!(bm.blocks_on("n1").is_empty());
    }
}
