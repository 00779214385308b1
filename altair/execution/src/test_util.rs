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

//! Shared table fixtures for this crate's tests and downstream test suites.

use std::collections::HashSet;
use std::sync::Arc;

use altair_common::row::row_of;
use altair_common::{Schema, TableMeta, TableOptions, Value, ValueRow};
use altair_memory::Batch;

use crate::block_manager::{BlockManager, BlockMeta, BlockSignature, DataBlock};

/// The `trends` table: (date, query, count) with a bloom filter on `query`.
pub fn trends_meta() -> Arc<TableMeta> {
    TableMeta::with_options(
        "trends",
        Arc::new(Schema::parse("ROW<_time_:BIGINT,query:VARCHAR,count:INT>").unwrap()),
        TableOptions {
            capacity: 1024,
            bloom_columns: HashSet::from(["query".to_string()]),
        },
    )
}

/// The `events` table used for larger generated fixtures.
pub fn events_meta() -> Arc<TableMeta> {
    TableMeta::with_options(
        "events",
        Arc::new(Schema::parse("ROW<_time_:BIGINT,event:VARCHAR,value:INT>").unwrap()),
        TableOptions {
            capacity: 16_384,
            bloom_columns: HashSet::new(),
        },
    )
}

/// Build, seal and register one block from materialized rows.
pub fn block_of(
    bm: &BlockManager,
    meta: &Arc<TableMeta>,
    node: &str,
    seq: u64,
    window: (i64, i64),
    rows: Vec<ValueRow>,
) -> Arc<DataBlock> {
    let mut batch = Batch::new(meta);
    for row in &rows {
        batch.add(row).unwrap();
    }
    batch.seal();
    let block = DataBlock::new(
        BlockMeta {
            sig: BlockSignature::new(
                meta.name.clone(),
                format!("mem://{}.csv@1024", meta.name),
                seq,
            ),
            residence: node.to_string(),
            window,
            rows: batch.rows(),
            raw_size: batch.raw_size(),
        },
        Arc::new(batch),
    );
    bm.add(block)
}

/// Register a `trends` block from (time, query, count) tuples.
pub fn trends_block(
    bm: &BlockManager,
    meta: &Arc<TableMeta>,
    node: &str,
    seq: u64,
    window: (i64, i64),
    rows: &[(i64, &str, i32)],
) -> Arc<DataBlock> {
    let rows = rows
        .iter()
        .map(|(t, q, c)| {
            row_of(
                &meta.schema,
                vec![
                    ("_time_", Value::BigInt(*t)),
                    ("query", Value::Varchar((*q).to_string())),
                    ("count", Value::Int(*c)),
                ],
            )
            .unwrap()
        })
        .collect();
    block_of(bm, meta, node, seq, window, rows)
}

/// Register an `events` block from (time, event, value) tuples.
pub fn events_block(
    bm: &BlockManager,
    meta: &Arc<TableMeta>,
    node: &str,
    seq: u64,
    window: (i64, i64),
    rows: &[(i64, String, i32)],
) -> Arc<DataBlock> {
    let rows = rows
        .iter()
        .map(|(t, e, v)| {
            row_of(
                &meta.schema,
                vec![
                    ("_time_", Value::BigInt(*t)),
                    ("event", Value::Varchar(e.clone())),
                    ("value", Value::Int(*v)),
                ],
            )
            .unwrap()
        })
        .collect();
    block_of(bm, meta, node, seq, window, rows)
}
