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

//! Result sets: finite, single-pass row sequences.

use crate::row::ValueRow;
use crate::schema::SchemaRef;

/// An ordered, bounded set of result rows with a fixed output schema.
/// Consuming it (`into_iter`) yields each row exactly once; the sequence is
/// finite and not restartable.
#[derive(Debug, Clone)]
pub struct RowSet {
    schema: SchemaRef,
    rows: Vec<ValueRow>,
}

impl RowSet {
    pub fn new(schema: SchemaRef, rows: Vec<ValueRow>) -> Self {
        Self { schema, rows }
    }

    pub fn empty(schema: SchemaRef) -> Self {
        Self {
            schema,
            rows: vec![],
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[ValueRow] {
        &self.rows
    }
}

impl IntoIterator for RowSet {
    type Item = ValueRow;
    type IntoIter = std::vec::IntoIter<ValueRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
