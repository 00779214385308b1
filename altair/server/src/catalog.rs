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

//! The table catalog: every table the coordinator will answer for.

use std::collections::HashMap;
use std::sync::Arc;

use altair_common::{AltairError, Result, TableMeta};
use altair_ingest::TableDefinition;
use parking_lot::RwLock;

/// Registered table definitions, looked up by name. Queries against
/// unregistered names fail with `UNKNOWN_TABLE`.
#[derive(Default)]
pub struct Catalog {
    tables: RwLock<HashMap<String, TableDefinition>>,
}

impl Catalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, definition: TableDefinition) {
        self.tables
            .write()
            .insert(definition.name().to_string(), definition);
    }

    pub fn definition(&self, name: &str) -> Result<TableDefinition> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| AltairError::UnknownTable(name.to_string()))
    }

    pub fn meta(&self, name: &str) -> Result<Arc<TableMeta>> {
        Ok(self.definition(name)?.meta)
    }

    pub fn definitions(&self) -> Vec<TableDefinition> {
        self.tables.read().values().cloned().collect()
    }
}
