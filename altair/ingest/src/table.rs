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

//! Ingest-facing table definitions.

use std::sync::Arc;

use altair_common::TableMeta;

/// How a table sources its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    /// One current unit replaced wholesale (e.g. a daily snapshot file).
    Swap,
    /// One unit per macro date within the retention window.
    Roll,
    /// One unit per stream partition.
    Stream,
}

/// A table as the ingest side sees it: query metadata plus where and how
/// its data arrives.
#[derive(Debug, Clone)]
pub struct TableDefinition {
    pub meta: Arc<TableMeta>,
    pub source: SourceType,
    /// Protocol/host part of the source, e.g. `s3://bucket`.
    pub domain: String,
    /// Path or topic under the domain.
    pub location: String,
    /// Days of history a roll table keeps.
    pub retention_days: u32,
}

impl TableDefinition {
    pub fn new(
        meta: Arc<TableMeta>,
        source: SourceType,
        domain: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            meta,
            source,
            domain: domain.into(),
            location: location.into(),
            retention_days: 7,
        }
    }

    pub fn with_retention(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }
}
