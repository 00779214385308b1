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

//! Typed column vectors with null bitmaps.

use altair_common::{AltairError, Result, TypeKind, Value};

use crate::bloom::BloomFilter;

/// One validity bit per row.
#[derive(Debug, Clone, Default)]
pub struct NullBitmap {
    words: Vec<u64>,
    len: usize,
}

impl NullBitmap {
    pub fn push(&mut self, null: bool) {
        let word = self.len / 64;
        if word == self.words.len() {
            self.words.push(0);
        }
        if null {
            self.words[word] |= 1u64 << (self.len % 64);
        }
        self.len += 1;
    }

    pub fn is_null(&self, index: usize) -> bool {
        debug_assert!(index < self.len);
        self.words[index / 64] & (1u64 << (index % 64)) != 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn byte_size(&self) -> usize {
        self.words.len() * 8
    }

    fn shrink(&mut self) {
        self.words.shrink_to_fit();
    }
}

#[derive(Debug)]
enum ColumnData {
    Bool(Vec<bool>),
    TinyInt(Vec<i8>),
    SmallInt(Vec<i16>),
    Int(Vec<i32>),
    BigInt(Vec<i64>),
    Real(Vec<f32>),
    Double(Vec<f64>),
    Int128(Vec<i128>),
    Varchar { offsets: Vec<u32>, bytes: Vec<u8> },
    List { offsets: Vec<u32>, items: Box<Column> },
    Map { offsets: Vec<u32>, keys: Box<Column>, values: Box<Column> },
}

/// One column of a batch: a dense value vector, a null bitmap and an
/// optional bloom filter over inserted values. Null slots still occupy one
/// (default-valued) vector slot so the vector length always equals the row
/// count.
#[derive(Debug)]
pub struct Column {
    kind: TypeKind,
    data: ColumnData,
    nulls: NullBitmap,
    bloom: Option<BloomFilter>,
}

impl Column {
    pub fn new(kind: TypeKind, capacity: usize, with_bloom: bool) -> Self {
        let data = match &kind {
            TypeKind::Bool => ColumnData::Bool(Vec::with_capacity(capacity)),
            TypeKind::TinyInt => ColumnData::TinyInt(Vec::with_capacity(capacity)),
            TypeKind::SmallInt => ColumnData::SmallInt(Vec::with_capacity(capacity)),
            TypeKind::Int => ColumnData::Int(Vec::with_capacity(capacity)),
            TypeKind::BigInt => ColumnData::BigInt(Vec::with_capacity(capacity)),
            TypeKind::Real => ColumnData::Real(Vec::with_capacity(capacity)),
            TypeKind::Double => ColumnData::Double(Vec::with_capacity(capacity)),
            TypeKind::Int128 => ColumnData::Int128(Vec::with_capacity(capacity)),
            TypeKind::Varchar => ColumnData::Varchar {
                offsets: {
                    let mut offsets = Vec::with_capacity(capacity + 1);
                    offsets.push(0);
                    offsets
                },
                bytes: vec![],
            },
            TypeKind::List(elem) => ColumnData::List {
                offsets: vec![0],
                items: Box::new(Column::new((**elem).clone(), 0, false)),
            },
            TypeKind::Map(k, v) => ColumnData::Map {
                offsets: vec![0],
                keys: Box::new(Column::new((**k).clone(), 0, false)),
                values: Box::new(Column::new((**v).clone(), 0, false)),
            },
        };
        Self {
            kind,
            data,
            nulls: NullBitmap::default(),
            bloom: with_bloom.then(|| BloomFilter::with_capacity(capacity)),
        }
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn len(&self) -> usize {
        self.nulls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nulls.is_empty()
    }

    pub fn is_null(&self, index: usize) -> bool {
        self.nulls.is_null(index)
    }

    pub fn has_bloom(&self) -> bool {
        self.bloom.is_some()
    }

    /// False iff the value was never appended to this column. Columns
    /// without a bloom filter answer true for everything.
    pub fn probably(&self, value: &Value) -> bool {
        self.bloom.as_ref().map(|b| b.probably(value)).unwrap_or(true)
    }

    pub fn append(&mut self, value: Option<&Value>) -> Result<()> {
        if let (Some(bloom), Some(v)) = (self.bloom.as_mut(), value) {
            bloom.insert(v);
        }
        self.nulls.push(value.is_none());
        match (&mut self.data, value) {
            (ColumnData::Bool(v), value) => v.push(read_scalar(value, |x| match x {
                Value::Bool(b) => Some(*b),
                _ => None,
            })?),
            (ColumnData::TinyInt(v), value) => v.push(read_scalar(value, |x| match x {
                Value::TinyInt(b) => Some(*b),
                _ => None,
            })?),
            (ColumnData::SmallInt(v), value) => v.push(read_scalar(value, |x| match x {
                Value::SmallInt(b) => Some(*b),
                _ => None,
            })?),
            (ColumnData::Int(v), value) => v.push(read_scalar(value, |x| match x {
                Value::Int(b) => Some(*b),
                _ => None,
            })?),
            (ColumnData::BigInt(v), value) => v.push(read_scalar(value, |x| match x {
                Value::BigInt(b) => Some(*b),
                _ => None,
            })?),
            (ColumnData::Real(v), value) => v.push(read_scalar(value, |x| match x {
                Value::Real(b) => Some(*b),
                _ => None,
            })?),
            (ColumnData::Double(v), value) => v.push(read_scalar(value, |x| match x {
                Value::Double(b) => Some(*b),
                _ => None,
            })?),
            (ColumnData::Int128(v), value) => v.push(read_scalar(value, |x| match x {
                Value::Int128(b) => Some(*b),
                _ => None,
            })?),
            (ColumnData::Varchar { offsets, bytes }, value) => {
                if let Some(v) = value {
                    let s = v.as_str().ok_or_else(|| mismatch(&self.kind, v))?;
                    bytes.extend_from_slice(s.as_bytes());
                }
                offsets.push(bytes.len() as u32);
            }
            (ColumnData::List { offsets, items }, value) => {
                if let Some(v) = value {
                    match v {
                        Value::List(elems) => {
                            for elem in elems {
                                items.append(Some(elem))?;
                            }
                        }
                        other => return Err(mismatch(&self.kind, other)),
                    }
                }
                offsets.push(items.len() as u32);
            }
            (ColumnData::Map { offsets, keys, values }, value) => {
                if let Some(v) = value {
                    match v {
                        Value::Map(entries) => {
                            for (k, val) in entries {
                                keys.append(Some(k))?;
                                values.append(Some(val))?;
                            }
                        }
                        other => return Err(mismatch(&self.kind, other)),
                    }
                }
                offsets.push(keys.len() as u32);
            }
        }
        Ok(())
    }

    /// Raw bytes held by this column, builders included.
    pub fn raw_size(&self) -> usize {
        let data = match &self.data {
            ColumnData::Bool(v) => v.len(),
            ColumnData::TinyInt(v) => v.len(),
            ColumnData::SmallInt(v) => v.len() * 2,
            ColumnData::Int(v) => v.len() * 4,
            ColumnData::BigInt(v) => v.len() * 8,
            ColumnData::Real(v) => v.len() * 4,
            ColumnData::Double(v) => v.len() * 8,
            ColumnData::Int128(v) => v.len() * 16,
            ColumnData::Varchar { offsets, bytes } => offsets.len() * 4 + bytes.len(),
            ColumnData::List { offsets, items } => offsets.len() * 4 + items.raw_size(),
            ColumnData::Map { offsets, keys, values } => {
                offsets.len() * 4 + keys.raw_size() + values.raw_size()
            }
        };
        data + self.nulls.byte_size() + self.bloom.as_ref().map(|b| b.byte_size()).unwrap_or(0)
    }

    /// Release builder slack; reads afterwards are wait-free.
    pub fn seal(&mut self) {
        self.nulls.shrink();
        match &mut self.data {
            ColumnData::Bool(v) => v.shrink_to_fit(),
            ColumnData::TinyInt(v) => v.shrink_to_fit(),
            ColumnData::SmallInt(v) => v.shrink_to_fit(),
            ColumnData::Int(v) => v.shrink_to_fit(),
            ColumnData::BigInt(v) => v.shrink_to_fit(),
            ColumnData::Real(v) => v.shrink_to_fit(),
            ColumnData::Double(v) => v.shrink_to_fit(),
            ColumnData::Int128(v) => v.shrink_to_fit(),
            ColumnData::Varchar { offsets, bytes } => {
                offsets.shrink_to_fit();
                bytes.shrink_to_fit();
            }
            ColumnData::List { offsets, items } => {
                offsets.shrink_to_fit();
                items.seal();
            }
            ColumnData::Map { offsets, keys, values } => {
                offsets.shrink_to_fit();
                keys.seal();
                values.seal();
            }
        }
    }

    pub fn bool_at(&self, index: usize) -> Result<bool> {
        match &self.data {
            ColumnData::Bool(v) => Ok(v[index]),
            _ => Err(kind_error(&self.kind, "BOOL")),
        }
    }

    pub fn i8_at(&self, index: usize) -> Result<i8> {
        match &self.data {
            ColumnData::TinyInt(v) => Ok(v[index]),
            _ => Err(kind_error(&self.kind, "TINYINT")),
        }
    }

    pub fn i16_at(&self, index: usize) -> Result<i16> {
        match &self.data {
            ColumnData::SmallInt(v) => Ok(v[index]),
            _ => Err(kind_error(&self.kind, "SMALLINT")),
        }
    }

    pub fn i32_at(&self, index: usize) -> Result<i32> {
        match &self.data {
            ColumnData::Int(v) => Ok(v[index]),
            _ => Err(kind_error(&self.kind, "INT")),
        }
    }

    pub fn i64_at(&self, index: usize) -> Result<i64> {
        match &self.data {
            ColumnData::BigInt(v) => Ok(v[index]),
            _ => Err(kind_error(&self.kind, "BIGINT")),
        }
    }

    pub fn f32_at(&self, index: usize) -> Result<f32> {
        match &self.data {
            ColumnData::Real(v) => Ok(v[index]),
            _ => Err(kind_error(&self.kind, "REAL")),
        }
    }

    pub fn f64_at(&self, index: usize) -> Result<f64> {
        match &self.data {
            ColumnData::Double(v) => Ok(v[index]),
            _ => Err(kind_error(&self.kind, "DOUBLE")),
        }
    }

    pub fn i128_at(&self, index: usize) -> Result<i128> {
        match &self.data {
            ColumnData::Int128(v) => Ok(v[index]),
            _ => Err(kind_error(&self.kind, "INT128")),
        }
    }

    pub fn str_at(&self, index: usize) -> Result<&str> {
        match &self.data {
            ColumnData::Varchar { offsets, bytes } => {
                let start = offsets[index] as usize;
                let end = offsets[index + 1] as usize;
                std::str::from_utf8(&bytes[start..end])
                    .map_err(|e| AltairError::Internal(format!("corrupt varchar column: {e}")))
            }
            _ => Err(kind_error(&self.kind, "VARCHAR")),
        }
    }

    /// `(start, end)` element range of the list (or map) at `index`, plus
    /// the child column(s).
    pub fn list_at(&self, index: usize) -> Result<(usize, usize, &Column)> {
        match &self.data {
            ColumnData::List { offsets, items } => Ok((
                offsets[index] as usize,
                offsets[index + 1] as usize,
                items,
            )),
            _ => Err(kind_error(&self.kind, "LIST")),
        }
    }

    pub fn map_at(&self, index: usize) -> Result<(usize, usize, &Column, &Column)> {
        match &self.data {
            ColumnData::Map { offsets, keys, values } => Ok((
                offsets[index] as usize,
                offsets[index + 1] as usize,
                keys,
                values,
            )),
            _ => Err(kind_error(&self.kind, "MAP")),
        }
    }
}

fn read_scalar<T: Default>(
    value: Option<&Value>,
    extract: impl Fn(&Value) -> Option<T>,
) -> Result<T> {
    match value {
        None => Ok(T::default()),
        Some(v) => extract(v).ok_or_else(|| {
            AltairError::TypeMismatch(format!("value {v:?} does not fit column"))
        }),
    }
}

fn mismatch(kind: &TypeKind, value: &Value) -> AltairError {
    AltairError::TypeMismatch(format!("value {value:?} does not fit {kind} column"))
}

fn kind_error(actual: &TypeKind, wanted: &str) -> AltairError {
    AltairError::TypeMismatch(format!("column is {actual}, not {wanted}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_slots_keep_vector_dense() {
        let mut col = Column::new(TypeKind::Int, 4, false);
        col.append(Some(&Value::Int(1))).unwrap();
        col.append(None).unwrap();
        col.append(Some(&Value::Int(3))).unwrap();
        assert_eq!(col.len(), 3);
        assert!(col.is_null(1));
        assert_eq!(col.i32_at(0).unwrap(), 1);
        assert_eq!(col.i32_at(1).unwrap(), 0);
        assert_eq!(col.i32_at(2).unwrap(), 3);
    }

    #[test]
    fn varchar_offsets() {
        let mut col = Column::new(TypeKind::Varchar, 4, false);
        col.append(Some(&Value::Varchar("yoga".into()))).unwrap();
        col.append(None).unwrap();
        col.append(Some(&Value::Varchar("gym".into()))).unwrap();
        assert_eq!(col.str_at(0).unwrap(), "yoga");
        assert_eq!(col.str_at(1).unwrap(), "");
        assert_eq!(col.str_at(2).unwrap(), "gym");
    }

    #[test]
    fn list_ranges() {
        let mut col = Column::new(TypeKind::List(Box::new(TypeKind::Int)), 4, false);
        col.append(Some(&Value::List(vec![Value::Int(1), Value::Int(2)])))
            .unwrap();
        col.append(None).unwrap();
        col.append(Some(&Value::List(vec![Value::Int(9)]))).unwrap();

        let (start, end, items) = col.list_at(0).unwrap();
        assert_eq!((start, end), (0, 2));
        assert_eq!(items.i32_at(1).unwrap(), 2);
        let (start, end, _) = col.list_at(1).unwrap();
        assert_eq!((start, end), (2, 2));
        let (start, end, items) = col.list_at(2).unwrap();
        assert_eq!((start, end), (2, 3));
        assert_eq!(items.i32_at(2).unwrap(), 9);
    }

    #[test]
    fn kind_checked_appends() {
        let mut col = Column::new(TypeKind::Int, 4, false);
        assert!(col.append(Some(&Value::Varchar("no".into()))).is_err());
    }

    #[test]
    fn bloom_tracks_appends() {
        let mut col = Column::new(TypeKind::Varchar, 4, true);
        col.append(Some(&Value::Varchar("yoga".into()))).unwrap();
        assert!(col.probably(&Value::Varchar("yoga".into())));
    }
}
