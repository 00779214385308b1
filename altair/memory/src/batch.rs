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

//! The columnar batch: a bounded, sealable container of rows.

use altair_common::{
    AltairError, Result, Row, SchemaRef, TableMeta, Value, TIME_COLUMN,
};

use crate::accessor::RowAccessor;
use crate::column::Column;

/// An immutable columnar container for up to `capacity` rows of one schema.
/// Built by a single producer via [`Batch::add`], then [sealed](Batch::seal)
/// and shared read-only. Appends are not thread-safe.
#[derive(Debug)]
pub struct Batch {
    schema: SchemaRef,
    columns: Vec<Column>,
    capacity: usize,
    rows: usize,
    sealed: bool,
}

impl Batch {
    pub fn new(table: &TableMeta) -> Self {
        let capacity = table.options.capacity;
        let columns = table
            .schema
            .fields()
            .iter()
            .map(|f| Column::new(f.kind.clone(), capacity, table.has_bloom(&f.name)))
            .collect();
        Self {
            schema: table.schema.clone(),
            columns,
            capacity,
            rows: 0,
            sealed: false,
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.rows >= self.capacity
    }

    pub fn sealed(&self) -> bool {
        self.sealed
    }

    pub fn raw_size(&self) -> usize {
        self.columns.iter().map(Column::raw_size).sum()
    }

    pub(crate) fn column(&self, name: &str) -> Result<&Column> {
        self.schema
            .index_of(name)
            .map(|i| &self.columns[i])
            .ok_or_else(|| AltairError::InvalidQuery(format!("no such column: {name}")))
    }

    /// Append one row, reading each field from the row by name. Fails on a
    /// sealed or full batch.
    pub fn add(&mut self, row: &dyn Row) -> Result<usize> {
        if self.sealed {
            return Err(AltairError::Internal("add to sealed batch".into()));
        }
        if self.is_full() {
            return Err(AltairError::Internal(format!(
                "batch capacity {} exceeded",
                self.capacity
            )));
        }
        for (field, column) in self.schema.fields().iter().zip(self.columns.iter_mut()) {
            let value = row.value(&field.name, &field.kind)?;
            column.append(value.as_ref())?;
        }
        self.rows += 1;
        Ok(self.rows)
    }

    /// Freeze the batch: release builder-only memory. Reads after seal are
    /// wait-free.
    pub fn seal(&mut self) {
        for column in &mut self.columns {
            column.seal();
        }
        self.sealed = true;
    }

    /// Bloom probe: false iff `value` was never inserted into `column`.
    /// Columns without a bloom filter (and unknown columns) answer true.
    pub fn probably(&self, column: &str, value: &Value) -> bool {
        self.column(column)
            .map(|c| c.probably(value))
            .unwrap_or(true)
    }

    /// A cursor positioned at row 0.
    pub fn accessor(&self) -> RowAccessor<'_> {
        RowAccessor::new(self)
    }

    /// `[min, max]` of the event-time column over current rows.
    pub fn time_range(&self) -> Option<(i64, i64)> {
        let column = self.column(TIME_COLUMN).ok()?;
        let mut range: Option<(i64, i64)> = None;
        for i in 0..self.rows {
            if column.is_null(i) {
                continue;
            }
            let t = column.i64_at(i).ok()?;
            range = Some(match range {
                None => (t, t),
                Some((lo, hi)) => (lo.min(t), hi.max(t)),
            });
        }
        range
    }

    /// Basic metrics as a JSON blob, for logs and the node state surface.
    pub fn state(&self) -> String {
        serde_json::json!({
            "rows": self.rows,
            "rawSize": self.raw_size(),
            "sealed": self.sealed,
            "columns": self.columns.len(),
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use altair_common::row::row_of;
    use altair_common::{Schema, TableOptions};

    use super::*;

    fn trends() -> Arc<TableMeta> {
        TableMeta::with_options(
            "trends",
            Arc::new(Schema::parse("ROW<_time_:BIGINT,query:VARCHAR,count:INT>").unwrap()),
            TableOptions {
                capacity: 4,
                bloom_columns: HashSet::from(["query".to_string()]),
            },
        )
    }

    fn add_row(batch: &mut Batch, time: i64, query: &str, count: i32) {
        let row = row_of(
            batch.schema(),
            vec![
                ("_time_", Value::BigInt(time)),
                ("query", Value::Varchar(query.into())),
                ("count", Value::Int(count)),
            ],
        )
        .unwrap();
        batch.add(&row).unwrap();
    }

    #[test]
    fn add_seal_read() {
        let meta = trends();
        let mut batch = Batch::new(&meta);
        add_row(&mut batch, 100, "yoga", 3);
        add_row(&mut batch, 200, "gym", 7);
        batch.seal();

        assert_eq!(batch.rows(), 2);
        assert!(batch.sealed());
        {
            let mut cursor = batch.accessor();
            assert_eq!(cursor.seek(1).read_string("query").unwrap(), "gym");
            assert_eq!(cursor.seek(0).read_int("count").unwrap(), 3);
        }

        let row = row_of(batch.schema(), vec![]).unwrap();
        assert!(batch.add(&row).is_err());
    }

    #[test]
    fn capacity_is_enforced() {
        let meta = trends();
        let mut batch = Batch::new(&meta);
        for i in 0..4 {
            add_row(&mut batch, i, "q", 1);
        }
        assert!(batch.is_full());
        let row = row_of(batch.schema(), vec![]).unwrap();
        assert!(batch.add(&row).is_err());
    }

    #[test]
    fn bloom_probe_soundness() {
        let meta = trends();
        let mut batch = Batch::new(&meta);
        add_row(&mut batch, 100, "yoga", 3);
        batch.seal();

        assert!(batch.probably("query", &Value::Varchar("yoga".into())));
        // count has no bloom filter: always probable
        assert!(batch.probably("count", &Value::Int(12345)));
    }

    #[test]
    fn time_range_spans_rows() {
        let meta = trends();
        let mut batch = Batch::new(&meta);
        add_row(&mut batch, 300, "a", 1);
        add_row(&mut batch, 100, "b", 1);
        add_row(&mut batch, 200, "c", 1);
        assert_eq!(batch.time_range(), Some((100, 300)));
    }

    #[test]
    fn state_blob() {
        let meta = trends();
        let batch = Batch::new(&meta);
        let state: serde_json::Value = serde_json::from_str(&batch.state()).unwrap();
        assert_eq!(state["rows"], 0);
        assert_eq!(state["sealed"], false);
    }
}
