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

//! Cursors over a batch: row, list and map accessors.

use altair_common::{ListRead, MapRead, Result, Row};

use crate::batch::Batch;
use crate::column::Column;

/// A cursor over one batch. `seek` positions it; the typed readers then
/// read the current row. Random access is O(1) for fixed-width columns and
/// offset + copy for VARCHAR.
#[derive(Debug)]
pub struct RowAccessor<'a> {
    batch: &'a Batch,
    current: usize,
}

impl<'a> RowAccessor<'a> {
    pub(crate) fn new(batch: &'a Batch) -> Self {
        Self { batch, current: 0 }
    }

    pub fn seek(&mut self, row: usize) -> &mut Self {
        debug_assert!(row < self.batch.rows());
        self.current = row;
        self
    }

    fn column(&self, field: &str) -> Result<&'a Column> {
        self.batch.column(field)
    }
}

impl Row for RowAccessor<'_> {
    fn is_null(&self, field: &str) -> Result<bool> {
        Ok(self.column(field)?.is_null(self.current))
    }

    fn read_bool(&self, field: &str) -> Result<bool> {
        self.column(field)?.bool_at(self.current)
    }

    fn read_byte(&self, field: &str) -> Result<i8> {
        self.column(field)?.i8_at(self.current)
    }

    fn read_short(&self, field: &str) -> Result<i16> {
        self.column(field)?.i16_at(self.current)
    }

    fn read_int(&self, field: &str) -> Result<i32> {
        self.column(field)?.i32_at(self.current)
    }

    fn read_long(&self, field: &str) -> Result<i64> {
        self.column(field)?.i64_at(self.current)
    }

    fn read_float(&self, field: &str) -> Result<f32> {
        self.column(field)?.f32_at(self.current)
    }

    fn read_double(&self, field: &str) -> Result<f64> {
        self.column(field)?.f64_at(self.current)
    }

    fn read_int128(&self, field: &str) -> Result<i128> {
        self.column(field)?.i128_at(self.current)
    }

    fn read_string(&self, field: &str) -> Result<&str> {
        self.column(field)?.str_at(self.current)
    }

    fn read_list(&self, field: &str) -> Result<Box<dyn ListRead + '_>> {
        let (start, end, items) = self.column(field)?.list_at(self.current)?;
        Ok(Box::new(ListAccessor { items, start, end }))
    }

    fn read_map(&self, field: &str) -> Result<Box<dyn MapRead + '_>> {
        let (start, end, keys, values) = self.column(field)?.map_at(self.current)?;
        Ok(Box::new(MapAccessor {
            keys,
            values,
            start,
            end,
        }))
    }
}

/// Read access to one list cell, backed by the child column.
pub struct ListAccessor<'a> {
    items: &'a Column,
    start: usize,
    end: usize,
}

impl ListRead for ListAccessor<'_> {
    fn len(&self) -> usize {
        self.end - self.start
    }

    fn is_null(&self, index: usize) -> bool {
        self.items.is_null(self.start + index)
    }

    fn read_bool(&self, index: usize) -> Result<bool> {
        self.items.bool_at(self.start + index)
    }

    fn read_byte(&self, index: usize) -> Result<i8> {
        self.items.i8_at(self.start + index)
    }

    fn read_short(&self, index: usize) -> Result<i16> {
        self.items.i16_at(self.start + index)
    }

    fn read_int(&self, index: usize) -> Result<i32> {
        self.items.i32_at(self.start + index)
    }

    fn read_long(&self, index: usize) -> Result<i64> {
        self.items.i64_at(self.start + index)
    }

    fn read_float(&self, index: usize) -> Result<f32> {
        self.items.f32_at(self.start + index)
    }

    fn read_double(&self, index: usize) -> Result<f64> {
        self.items.f64_at(self.start + index)
    }

    fn read_int128(&self, index: usize) -> Result<i128> {
        self.items.i128_at(self.start + index)
    }

    fn read_string(&self, index: usize) -> Result<&str> {
        self.items.str_at(self.start + index)
    }
}

/// Read access to one map cell as parallel key/value lists.
pub struct MapAccessor<'a> {
    keys: &'a Column,
    values: &'a Column,
    start: usize,
    end: usize,
}

impl MapRead for MapAccessor<'_> {
    fn len(&self) -> usize {
        self.end - self.start
    }

    fn keys(&self) -> Box<dyn ListRead + '_> {
        Box::new(ListAccessor {
            items: self.keys,
            start: self.start,
            end: self.end,
        })
    }

    fn values(&self) -> Box<dyn ListRead + '_> {
        Box::new(ListAccessor {
            items: self.values,
            start: self.start,
            end: self.end,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use altair_common::row::row_of;
    use altair_common::{Schema, TableMeta, TypeKind, Value};

    use super::*;

    #[test]
    fn composite_reads() {
        let schema = Arc::new(
            Schema::parse("ROW<_time_:BIGINT,tags:LIST<VARCHAR>,attrs:MAP<VARCHAR,BIGINT>>")
                .unwrap(),
        );
        let meta = TableMeta::new("t", schema);
        let mut batch = Batch::new(&meta);
        let row = row_of(
            batch.schema(),
            vec![
                ("_time_", Value::BigInt(1)),
                (
                    "tags",
                    Value::List(vec![Value::Varchar("a".into()), Value::Varchar("b".into())]),
                ),
                (
                    "attrs",
                    Value::Map(vec![(Value::Varchar("k".into()), Value::BigInt(9))]),
                ),
            ],
        )
        .unwrap();
        batch.add(&row).unwrap();
        batch.seal();

        let mut cursor = batch.accessor();
        cursor.seek(0);
        let tags = cursor.read_list("tags").unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags.read_string(1).unwrap(), "b");

        let attrs = cursor.read_map("attrs").unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.keys().read_string(0).unwrap(), "k");
        assert_eq!(attrs.values().read_long(0).unwrap(), 9);
    }

    #[test]
    fn value_round_trip_through_accessor() {
        let schema = Arc::new(Schema::parse("ROW<_time_:BIGINT,q:VARCHAR>").unwrap());
        let meta = TableMeta::new("t", schema);
        let mut batch = Batch::new(&meta);
        for (t, q) in [(1i64, "x"), (2, "y")] {
            let row = row_of(
                batch.schema(),
                vec![("_time_", Value::BigInt(t)), ("q", Value::Varchar(q.into()))],
            )
            .unwrap();
            batch.add(&row).unwrap();
        }
        batch.seal();

        let mut cursor = batch.accessor();
        cursor.seek(1);
        assert_eq!(
            cursor.value("q", &TypeKind::Varchar).unwrap(),
            Some(Value::Varchar("y".into()))
        );
    }
}
