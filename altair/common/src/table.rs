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

//! Query-facing table metadata.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::schema::SchemaRef;

/// Storage knobs for a table's batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableOptions {
    /// Maximum rows per batch; ingest slices sources at this boundary.
    pub capacity: usize,
    /// Columns carrying a bloom filter; equality predicates on these may
    /// skip whole blocks.
    pub bloom_columns: HashSet<String>,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            bloom_columns: HashSet::new(),
        }
    }
}

/// What the planner needs to know about a table: its name, schema and
/// storage options.
#[derive(Debug, Clone)]
pub struct TableMeta {
    pub name: String,
    pub schema: SchemaRef,
    pub options: TableOptions,
}

impl TableMeta {
    pub fn new(name: impl Into<String>, schema: SchemaRef) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            schema,
            options: TableOptions::default(),
        })
    }

    pub fn with_options(
        name: impl Into<String>,
        schema: SchemaRef,
        options: TableOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            schema,
            options,
        })
    }

    pub fn has_bloom(&self, column: &str) -> bool {
        self.options.bloom_columns.contains(column)
    }
}
