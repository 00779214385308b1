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

//! Service-level tests: ingest sync, expiration hand-off and wire queries
//! over an in-process two-node cluster.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use altair_common::row::row_of;
use altair_common::time::unix_date;
use altair_common::{
    AltairError, Node, Result, Row, Schema, TableMeta, TableOptions, Value, ValueRow,
    TIME_COLUMN,
};
use altair_execution::{BlockManager, ServerExecutor};
use altair_ingest::repo::{SourceInventory, SourceUnit};
use altair_ingest::{IngestSpec, SourceType, SpecSource, TableDefinition};
use altair_server::{
    Catalog, ClusterInfo, InProcessConnector, InProcessNode, NodeSync, QueryHandler,
    QueryRequest, ServerConfig,
};
use parking_lot::Mutex;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Inventory and row source backed by in-memory listings.
#[derive(Default)]
struct MemorySources {
    /// table name -> current swap unit
    swap: Mutex<HashMap<String, SourceUnit>>,
    /// spec id -> rows
    rows: Mutex<HashMap<String, Vec<ValueRow>>>,
}

impl MemorySources {
    fn put_unit(&self, table: &str, id: &str, size: u64, version: &str) {
        self.swap.lock().insert(
            table.to_string(),
            SourceUnit {
                id: id.to_string(),
                domain: "mem://".to_string(),
                size,
                version: version.to_string(),
                macro_date: 0,
            },
        );
    }

    fn put_swap(&self, table: &str, id: &str, size: u64, version: &str, rows: Vec<ValueRow>) {
        self.put_unit(table, id, size, version);
        self.rows.lock().insert(id.to_string(), rows);
    }
}

impl SourceInventory for MemorySources {
    fn latest(&self, table: &TableDefinition) -> Result<Option<SourceUnit>> {
        Ok(self.swap.lock().get(table.name()).cloned())
    }

    fn on_date(&self, _table: &TableDefinition, _date: i64) -> Result<Option<SourceUnit>> {
        Ok(None)
    }

    fn partitions(&self, _table: &TableDefinition) -> Result<Vec<SourceUnit>> {
        Ok(vec![])
    }
}

impl SpecSource for MemorySources {
    fn fetch(&self, spec: &IngestSpec) -> Result<Vec<ValueRow>> {
        self.rows
            .lock()
            .get(&spec.id)
            .cloned()
            .ok_or_else(|| AltairError::NodeUnreachable(format!("no source for {}", spec.id)))
    }
}

struct Fixture {
    blocks: Arc<BlockManager>,
    catalog: Arc<Catalog>,
    cluster: Arc<ClusterInfo>,
    sources: Arc<MemorySources>,
    sync: Arc<NodeSync>,
    handler: QueryHandler,
}

fn trends_definition() -> TableDefinition {
    let meta = TableMeta::with_options(
        "trends",
        Arc::new(Schema::parse("ROW<_time_:BIGINT,query:VARCHAR,count:INT>").unwrap()),
        TableOptions {
            capacity: 1024,
            bloom_columns: HashSet::from(["query".to_string()]),
        },
    );
    TableDefinition::new(meta, SourceType::Swap, "mem://", "trends.csv")
}

fn trends_rows(schema: &altair_common::SchemaRef, rows: &[(i64, &str, i32)]) -> Vec<ValueRow> {
    rows.iter()
        .map(|(t, q, c)| {
            row_of(
                schema,
                vec![
                    ("_time_", Value::BigInt(*t)),
                    ("query", Value::Varchar((*q).to_string())),
                    ("count", Value::Int(*c)),
                ],
            )
            .unwrap()
        })
        .collect()
}

fn fixture(config: ServerConfig) -> Fixture {
    let blocks = BlockManager::new();
    let catalog = Catalog::new();
    catalog.register(trends_definition());
    let cluster = ClusterInfo::new(vec![Node::new("n1"), Node::new("n2")]);
    let sources: Arc<MemorySources> = Arc::new(MemorySources::default());

    let nodes: Vec<Arc<InProcessNode>> = cluster
        .nodes()
        .into_iter()
        .map(|n| {
            InProcessNode::new(
                n,
                Arc::clone(&blocks),
                Arc::clone(&catalog),
                Arc::clone(&sources) as Arc<dyn SpecSource>,
            )
        })
        .collect();
    let connector = InProcessConnector::new(nodes);

    let sync = NodeSync::new(
        Arc::clone(&cluster),
        Arc::clone(&connector) as Arc<dyn altair_ingest::ClusterConnector>,
        Arc::clone(&blocks),
        config.clone(),
    );
    let executor = Arc::new(ServerExecutor::new(
        Arc::clone(&blocks),
        Arc::clone(&connector) as Arc<dyn altair_execution::connector::NodeConnector>,
    ));
    let handler = QueryHandler::new(Arc::clone(&catalog), executor, config);

    Fixture {
        blocks,
        catalog,
        cluster,
        sources,
        sync,
        handler,
    }
}

fn refresh(fx: &Fixture) {
    fx.sync
        .refresh_specs(&fx.catalog.definitions(), fx.sources.as_ref(), 0)
        .unwrap();
}

#[tokio::test]
async fn wire_query_end_to_end() {
    init_logs();
    let fx = fixture(ServerConfig::default());
    let d1 = unix_date("2019-04-01").unwrap();
    let d2 = unix_date("2019-04-02").unwrap();
    let schema = fx.catalog.meta("trends").unwrap().schema.clone();
    fx.sources.put_swap(
        "trends",
        "trends.csv",
        512,
        "v1",
        trends_rows(
            &schema,
            &[
                (d1, "apple watch", 3),
                (d1, "apple pie", 5),
                (d2, "apple pie", 2),
                (d1, "banana", 100),
            ],
        ),
    );

    refresh(&fx);
    fx.sync.sync_once().await.unwrap();
    fx.sync
        .with_repo(|repo| assert!(repo.specs().all(|s| s.materialized())));

    let request: QueryRequest = serde_json::from_str(&format!(
        r#"{{
            "table": "trends",
            "start": {d1},
            "end": {end},
            "filter": {{
                "op": "AND",
                "expressions": [
                    {{ "column": "query", "op": "LIKE", "values": ["apple%"] }}
                ]
            }},
            "dimensions": ["query"],
            "metrics": [ {{ "column": "count", "method": "SUM" }} ],
            "order": {{ "column": "count", "type": "DESC" }},
            "top": 10
        }}"#,
        end = d2 + 86_400,
    ))
    .unwrap();

    let rows = fx.handler.query(&request).await.unwrap();
    assert_eq!(rows.len(), 2);
    // apple pie 7 first, apple watch 3 second
    assert_eq!(rows.rows()[0].read_string("query").unwrap(), "apple pie");
    assert_eq!(rows.rows()[0].read_long("count").unwrap(), 7);
    assert_eq!(rows.rows()[1].read_long("count").unwrap(), 3);

    let json = QueryHandler::jsonify(&rows);
    assert_eq!(json[0]["query"], "apple pie");
    assert_eq!(json[0]["count"], 7);
}

#[tokio::test]
async fn samples_display_returns_raw_rows() {
    init_logs();
    let fx = fixture(ServerConfig::default());
    let schema = fx.catalog.meta("trends").unwrap().schema.clone();
    fx.sources.put_swap(
        "trends",
        "trends.csv",
        128,
        "v1",
        trends_rows(&schema, &[(10, "yoga", 3), (20, "yoga", 5), (30, "gym", 7)]),
    );
    refresh(&fx);
    fx.sync.sync_once().await.unwrap();

    let request: QueryRequest = serde_json::from_str(
        r#"{
            "table": "trends",
            "start": 0,
            "end": 100,
            "filter": { "op": "AND", "expressions": [
                { "column": "query", "op": "EQ", "values": ["yoga"] }
            ] },
            "dimensions": ["_time_", "query"],
            "display": "SAMPLES",
            "top": 20
        }"#,
    )
    .unwrap();

    let rows = fx.handler.query(&request).await.unwrap();
    assert_eq!(rows.len(), 2);
    let times: Vec<i64> = rows
        .rows()
        .iter()
        .map(|r| r.read_long(TIME_COLUMN).unwrap())
        .collect();
    assert_eq!(times, vec![10, 20]);
}

#[tokio::test]
async fn timeline_display_prepends_time_dimension() {
    init_logs();
    let fx = fixture(ServerConfig::default());
    let request: QueryRequest = serde_json::from_str(
        r#"{
            "table": "trends",
            "start": 0,
            "end": 100,
            "dimensions": ["query"],
            "metrics": [ { "column": "count", "method": "SUM" } ],
            "display": "TIMELINE"
        }"#,
    )
    .unwrap();
    let query = fx.handler.build(&request).unwrap();
    assert_eq!(query.selects[0].output_name(), TIME_COLUMN);
    assert_eq!(query.group_by, vec![1, 2]);
}

#[tokio::test]
async fn unknown_table_is_reported() {
    init_logs();
    let fx = fixture(ServerConfig::default());
    let request: QueryRequest =
        serde_json::from_str(r#"{ "table": "nope", "start": 0, "end": 1 }"#).unwrap();
    let err = fx.handler.query(&request).await.unwrap_err();
    assert_eq!(err.code(), "UNKNOWN_TABLE");
}

#[tokio::test]
async fn redefined_table_expires_old_blocks() {
    init_logs();
    let fx = fixture(ServerConfig::default());
    let schema = fx.catalog.meta("trends").unwrap().schema.clone();
    fx.sources.put_swap(
        "trends",
        "trends-v1.csv",
        100,
        "v1",
        trends_rows(&schema, &[(1, "yoga", 3)]),
    );
    refresh(&fx);
    fx.sync.sync_once().await.unwrap();

    // the first spec landed on n1 (lexicographic tie-break at zero load)
    let old_sig = "trends-v1.csv@100";
    fx.sync.with_repo(|repo| {
        assert_eq!(repo.get(old_sig).unwrap().affinity.as_deref(), Some("n1"));
    });
    assert_eq!(fx.blocks.blocks_on("n1").len(), 1);

    // redefinition: a new source unit supersedes the old spec, and the new
    // spec lands on the less-loaded n2
    fx.sources.put_swap(
        "trends",
        "trends-v2.csv",
        60,
        "v2",
        trends_rows(&schema, &[(2, "yoga", 5)]),
    );
    refresh(&fx);
    fx.sync.with_repo(|repo| {
        assert_eq!(
            repo.get("trends-v2.csv@60").unwrap().affinity.as_deref(),
            Some("n2")
        );
    });

    fx.sync.sync_once().await.unwrap();

    // n1 no longer lists the superseded block, the repo dropped the spec
    assert!(fx.blocks.blocks_on("n1").is_empty());
    assert!(!fx.blocks.spec_has_blocks(old_sig));
    fx.sync.with_repo(|repo| assert!(repo.get(old_sig).is_none()));
    // and the renewed data is queryable from n2
    assert_eq!(fx.blocks.blocks_on("n2").len(), 1);
}

#[tokio::test]
async fn sync_converges_in_bounded_ticks() {
    init_logs();
    let fx = fixture(ServerConfig::default());
    let schema = fx.catalog.meta("trends").unwrap().schema.clone();
    fx.sources.put_swap(
        "trends",
        "trends.csv",
        256,
        "v1",
        trends_rows(&schema, &[(1, "yoga", 1), (2, "gym", 2)]),
    );
    refresh(&fx);

    for _ in 0..3 {
        fx.sync.sync_once().await.unwrap();
    }
    fx.sync.with_repo(|repo| {
        assert!(repo.specs().all(|s| s.materialized()));
    });
    let metrics = fx.blocks.table_metrics("trends");
    assert_eq!(metrics.rows, 2);
    assert_eq!(metrics.blocks, 1);
}

#[tokio::test]
async fn repeated_ingest_failures_release_the_spec() {
    init_logs();
    let config = ServerConfig {
        ingest_fail_threshold: 2,
        ..ServerConfig::default()
    };
    let fx = fixture(config);
    // a unit the row source knows nothing about: every fetch fails
    fx.sources.put_unit("trends", "missing.csv", 64, "v1");
    refresh(&fx);
    fx.sync
        .with_repo(|repo| assert!(repo.get("missing.csv@64").unwrap().assigned()));

    fx.sync.sync_once().await.unwrap();
    fx.sync
        .with_repo(|repo| assert!(repo.get("missing.csv@64").unwrap().assigned()));
    fx.sync.sync_once().await.unwrap();
    // threshold reached: affinity released for reassignment
    fx.sync
        .with_repo(|repo| assert!(!repo.get("missing.csv@64").unwrap().assigned()));
}

#[tokio::test]
async fn node_refresh_stamps_update() {
    init_logs();
    let fx = fixture(ServerConfig::default());
    assert!(fx.blocks.last_refreshed("n1").is_none());
    fx.sync.sync_once().await.unwrap();
    assert!(fx.blocks.last_refreshed("n1").is_some());
    assert!(fx.blocks.last_refreshed("n2").is_some());
    assert_eq!(fx.cluster.active().len(), 2);
}
