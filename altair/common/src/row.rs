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

//! Row abstraction: typed readers by column name.
//!
//! Producers (ingest sources, test fixtures) and consumers (evaluators, the
//! columnar append path) meet at the [`Row`] trait rather than a concrete
//! layout, so a batch accessor, a materialized result row and a source row
//! all read the same way.

use std::sync::Arc;

use crate::error::{AltairError, Result};
use crate::schema::SchemaRef;
use crate::types::TypeKind;
use crate::value::Value;

/// Read access to one finite list value.
pub trait ListRead {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn is_null(&self, index: usize) -> bool;
    fn read_bool(&self, index: usize) -> Result<bool>;
    fn read_byte(&self, index: usize) -> Result<i8>;
    fn read_short(&self, index: usize) -> Result<i16>;
    fn read_int(&self, index: usize) -> Result<i32>;
    fn read_long(&self, index: usize) -> Result<i64>;
    fn read_float(&self, index: usize) -> Result<f32>;
    fn read_double(&self, index: usize) -> Result<f64>;
    fn read_int128(&self, index: usize) -> Result<i128>;
    fn read_string(&self, index: usize) -> Result<&str>;
}

/// Read access to one map value, as parallel key and value lists.
pub trait MapRead {
    fn len(&self) -> usize;
    fn keys(&self) -> Box<dyn ListRead + '_>;
    fn values(&self) -> Box<dyn ListRead + '_>;
}

/// Typed, by-name read access to one row.
pub trait Row {
    fn is_null(&self, field: &str) -> Result<bool>;
    fn read_bool(&self, field: &str) -> Result<bool>;
    fn read_byte(&self, field: &str) -> Result<i8>;
    fn read_short(&self, field: &str) -> Result<i16>;
    fn read_int(&self, field: &str) -> Result<i32>;
    fn read_long(&self, field: &str) -> Result<i64>;
    fn read_float(&self, field: &str) -> Result<f32>;
    fn read_double(&self, field: &str) -> Result<f64>;
    fn read_int128(&self, field: &str) -> Result<i128>;
    fn read_string(&self, field: &str) -> Result<&str>;
    fn read_list(&self, field: &str) -> Result<Box<dyn ListRead + '_>>;
    fn read_map(&self, field: &str) -> Result<Box<dyn MapRead + '_>>;

    /// Materialize the field as an optional [`Value`] of the given kind.
    fn value(&self, field: &str, kind: &TypeKind) -> Result<Option<Value>> {
        if self.is_null(field)? {
            return Ok(None);
        }
        let value = match kind {
            TypeKind::Bool => Value::Bool(self.read_bool(field)?),
            TypeKind::TinyInt => Value::TinyInt(self.read_byte(field)?),
            TypeKind::SmallInt => Value::SmallInt(self.read_short(field)?),
            TypeKind::Int => Value::Int(self.read_int(field)?),
            TypeKind::BigInt => Value::BigInt(self.read_long(field)?),
            TypeKind::Real => Value::Real(self.read_float(field)?),
            TypeKind::Double => Value::Double(self.read_double(field)?),
            TypeKind::Int128 => Value::Int128(self.read_int128(field)?),
            TypeKind::Varchar => Value::Varchar(self.read_string(field)?.to_string()),
            TypeKind::List(elem) => Value::List(read_all(&*self.read_list(field)?, elem)?),
            TypeKind::Map(k, v) => {
                let map = self.read_map(field)?;
                let keys = read_all(&*map.keys(), k)?;
                let values = read_all(&*map.values(), v)?;
                Value::Map(keys.into_iter().zip(values).collect())
            }
        };
        Ok(Some(value))
    }
}

/// Materialize every element of a list as a [`Value`] of `elem` kind.
pub fn read_all(list: &dyn ListRead, elem: &TypeKind) -> Result<Vec<Value>> {
    let mut out = Vec::with_capacity(list.len());
    for i in 0..list.len() {
        let value = match elem {
            TypeKind::Bool => Value::Bool(list.read_bool(i)?),
            TypeKind::TinyInt => Value::TinyInt(list.read_byte(i)?),
            TypeKind::SmallInt => Value::SmallInt(list.read_short(i)?),
            TypeKind::Int => Value::Int(list.read_int(i)?),
            TypeKind::BigInt => Value::BigInt(list.read_long(i)?),
            TypeKind::Real => Value::Real(list.read_float(i)?),
            TypeKind::Double => Value::Double(list.read_double(i)?),
            TypeKind::Int128 => Value::Int128(list.read_int128(i)?),
            TypeKind::Varchar => Value::Varchar(list.read_string(i)?.to_string()),
            composite => {
                return Err(AltairError::TypeMismatch(format!(
                    "nested composite list element: {composite}"
                )))
            }
        };
        out.push(value);
    }
    Ok(out)
}

/// A materialized row over a schema: the concrete `Row` used by ingest
/// sources, partial results and query output.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRow {
    schema: SchemaRef,
    values: Vec<Option<Value>>,
}

impl ValueRow {
    pub fn new(schema: SchemaRef, values: Vec<Option<Value>>) -> Result<Self> {
        if schema.len() != values.len() {
            return Err(AltairError::Internal(format!(
                "row width {} does not match schema width {}",
                values.len(),
                schema.len()
            )));
        }
        Ok(Self { schema, values })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(|v| v.as_ref())
    }

    fn slot(&self, field: &str) -> Result<&Option<Value>> {
        let index = self
            .schema
            .index_of(field)
            .ok_or_else(|| AltairError::InvalidQuery(format!("no such column: {field}")))?;
        Ok(&self.values[index])
    }

    fn scalar(&self, field: &str) -> Result<&Value> {
        self.slot(field)?.as_ref().ok_or_else(|| {
            AltairError::Internal(format!("typed read of null column: {field}"))
        })
    }
}

macro_rules! typed_read {
    ($fn_name:ident, $ty:ty, $variant:ident) => {
        fn $fn_name(&self, field: &str) -> Result<$ty> {
            match self.scalar(field)? {
                Value::$variant(v) => Ok(*v),
                other => Err(AltairError::TypeMismatch(format!(
                    "column {field} holds {other:?}"
                ))),
            }
        }
    };
}

impl Row for ValueRow {
    fn is_null(&self, field: &str) -> Result<bool> {
        Ok(self.slot(field)?.is_none())
    }

    typed_read!(read_bool, bool, Bool);
    typed_read!(read_byte, i8, TinyInt);
    typed_read!(read_short, i16, SmallInt);
    typed_read!(read_int, i32, Int);
    typed_read!(read_long, i64, BigInt);
    typed_read!(read_float, f32, Real);
    typed_read!(read_double, f64, Double);
    typed_read!(read_int128, i128, Int128);

    fn read_string(&self, field: &str) -> Result<&str> {
        match self.scalar(field)? {
            Value::Varchar(s) => Ok(s),
            other => Err(AltairError::TypeMismatch(format!(
                "column {field} holds {other:?}"
            ))),
        }
    }

    fn read_list(&self, field: &str) -> Result<Box<dyn ListRead + '_>> {
        match self.scalar(field)? {
            Value::List(items) => Ok(Box::new(ValueListRead { items })),
            other => Err(AltairError::TypeMismatch(format!(
                "column {field} holds {other:?}"
            ))),
        }
    }

    fn read_map(&self, field: &str) -> Result<Box<dyn MapRead + '_>> {
        match self.scalar(field)? {
            Value::Map(entries) => Ok(Box::new(ValueMapRead { entries })),
            other => Err(AltairError::TypeMismatch(format!(
                "column {field} holds {other:?}"
            ))),
        }
    }
}

struct ValueListRead<'a> {
    items: &'a [Value],
}

macro_rules! typed_item_read {
    ($fn_name:ident, $ty:ty, $variant:ident) => {
        fn $fn_name(&self, index: usize) -> Result<$ty> {
            match &self.items[index] {
                Value::$variant(v) => Ok(*v),
                other => Err(AltairError::TypeMismatch(format!(
                    "list item holds {other:?}"
                ))),
            }
        }
    };
}

impl ListRead for ValueListRead<'_> {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    typed_item_read!(read_bool, bool, Bool);
    typed_item_read!(read_byte, i8, TinyInt);
    typed_item_read!(read_short, i16, SmallInt);
    typed_item_read!(read_int, i32, Int);
    typed_item_read!(read_long, i64, BigInt);
    typed_item_read!(read_float, f32, Real);
    typed_item_read!(read_double, f64, Double);
    typed_item_read!(read_int128, i128, Int128);

    fn read_string(&self, index: usize) -> Result<&str> {
        match &self.items[index] {
            Value::Varchar(s) => Ok(s),
            other => Err(AltairError::TypeMismatch(format!(
                "list item holds {other:?}"
            ))),
        }
    }
}

struct ValueMapRead<'a> {
    entries: &'a [(Value, Value)],
}

impl MapRead for ValueMapRead<'_> {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn keys(&self) -> Box<dyn ListRead + '_> {
        Box::new(PairListRead {
            entries: self.entries,
            keys: true,
        })
    }

    fn values(&self) -> Box<dyn ListRead + '_> {
        Box::new(PairListRead {
            entries: self.entries,
            keys: false,
        })
    }
}

struct PairListRead<'a> {
    entries: &'a [(Value, Value)],
    keys: bool,
}

impl PairListRead<'_> {
    fn item(&self, index: usize) -> &Value {
        let (k, v) = &self.entries[index];
        if self.keys {
            k
        } else {
            v
        }
    }
}

macro_rules! typed_pair_read {
    ($fn_name:ident, $ty:ty, $variant:ident) => {
        fn $fn_name(&self, index: usize) -> Result<$ty> {
            match self.item(index) {
                Value::$variant(v) => Ok(*v),
                other => Err(AltairError::TypeMismatch(format!(
                    "map entry holds {other:?}"
                ))),
            }
        }
    };
}

impl ListRead for PairListRead<'_> {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    typed_pair_read!(read_bool, bool, Bool);
    typed_pair_read!(read_byte, i8, TinyInt);
    typed_pair_read!(read_short, i16, SmallInt);
    typed_pair_read!(read_int, i32, Int);
    typed_pair_read!(read_long, i64, BigInt);
    typed_pair_read!(read_float, f32, Real);
    typed_pair_read!(read_double, f64, Double);
    typed_pair_read!(read_int128, i128, Int128);

    fn read_string(&self, index: usize) -> Result<&str> {
        match self.item(index) {
            Value::Varchar(s) => Ok(s),
            other => Err(AltairError::TypeMismatch(format!(
                "map entry holds {other:?}"
            ))),
        }
    }
}

/// Build a [`ValueRow`] from `(name, value)` pairs against a schema; fields
/// not mentioned are null.
pub fn row_of(schema: &SchemaRef, pairs: Vec<(&str, Value)>) -> Result<ValueRow> {
    let mut values: Vec<Option<Value>> = vec![None; schema.len()];
    for (name, value) in pairs {
        let index = schema
            .index_of(name)
            .ok_or_else(|| AltairError::InvalidQuery(format!("no such column: {name}")))?;
        values[index] = Some(value);
    }
    ValueRow::new(Arc::clone(schema), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    fn test_schema() -> SchemaRef {
        Arc::new(Schema::parse("ROW<_time_:BIGINT,query:VARCHAR,count:INT,tags:LIST<VARCHAR>>").unwrap())
    }

    #[test]
    fn typed_reads() {
        let schema = test_schema();
        let row = row_of(
            &schema,
            vec![
                ("_time_", Value::BigInt(100)),
                ("query", Value::Varchar("yoga".into())),
                ("count", Value::Int(3)),
            ],
        )
        .unwrap();

        assert_eq!(row.read_long("_time_").unwrap(), 100);
        assert_eq!(row.read_string("query").unwrap(), "yoga");
        assert!(row.is_null("tags").unwrap());
        assert!(row.read_int("query").is_err());
    }

    #[test]
    fn materialize_by_kind() {
        let schema = test_schema();
        let row = row_of(
            &schema,
            vec![
                ("count", Value::Int(7)),
                (
                    "tags",
                    Value::List(vec![Value::Varchar("a".into()), Value::Varchar("b".into())]),
                ),
            ],
        )
        .unwrap();

        assert_eq!(
            row.value("count", &TypeKind::Int).unwrap(),
            Some(Value::Int(7))
        );
        let tags = row
            .value("tags", &TypeKind::List(Box::new(TypeKind::Varchar)))
            .unwrap();
        assert_eq!(
            tags,
            Some(Value::List(vec![
                Value::Varchar("a".into()),
                Value::Varchar("b".into())
            ]))
        );
        assert_eq!(row.value("query", &TypeKind::Varchar).unwrap(), None);
    }
}
