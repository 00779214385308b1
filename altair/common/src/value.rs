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

//! Scalar (and composite) runtime values.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AltairError, Result};
use crate::types::TypeKind;

/// A single runtime value of one of the logical kinds. SQL NULL is
/// represented as `Option<Value>::None` at the boundaries that need it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    Int128(i128),
    Varchar(String),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// The logical kind of this value. Composite kinds are inferred from the
    /// first element; empty composites cannot be typed.
    pub fn kind(&self) -> Result<TypeKind> {
        Ok(match self {
            Value::Bool(_) => TypeKind::Bool,
            Value::TinyInt(_) => TypeKind::TinyInt,
            Value::SmallInt(_) => TypeKind::SmallInt,
            Value::Int(_) => TypeKind::Int,
            Value::BigInt(_) => TypeKind::BigInt,
            Value::Real(_) => TypeKind::Real,
            Value::Double(_) => TypeKind::Double,
            Value::Int128(_) => TypeKind::Int128,
            Value::Varchar(_) => TypeKind::Varchar,
            Value::List(items) => {
                let elem = items.first().ok_or_else(|| {
                    AltairError::TypeMismatch("cannot infer kind of empty list".into())
                })?;
                TypeKind::List(Box::new(elem.kind()?))
            }
            Value::Map(entries) => {
                let (k, v) = entries.first().ok_or_else(|| {
                    AltairError::TypeMismatch("cannot infer kind of empty map".into())
                })?;
                TypeKind::Map(Box::new(k.kind()?), Box::new(v.kind()?))
            }
        })
    }

    /// Widened integer view, when the value is an integer.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::TinyInt(v) => Some(*v as i128),
            Value::SmallInt(v) => Some(*v as i128),
            Value::Int(v) => Some(*v as i128),
            Value::BigInt(v) => Some(*v as i128),
            Value::Int128(v) => Some(*v),
            _ => None,
        }
    }

    /// Lossy numeric view used by float arithmetic and AVG.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            other => other.as_i128().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Varchar(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to `kind`, failing on narrowing overflow or a non-numeric
    /// conversion. Identity casts are free.
    pub fn cast_to(&self, kind: &TypeKind) -> Result<Value> {
        if matches!(self.kind(), Ok(k) if &k == kind) {
            return Ok(self.clone());
        }
        let mismatch =
            || AltairError::TypeMismatch(format!("cannot cast {self:?} to {kind}"));
        if kind.is_integer() {
            let wide = self.as_i128().ok_or_else(mismatch)?;
            return Value::from_i128(wide, kind).ok_or_else(mismatch);
        }
        if kind.is_float() {
            let v = self.as_f64().ok_or_else(mismatch)?;
            return Ok(match kind {
                TypeKind::Real => Value::Real(v as f32),
                _ => Value::Double(v),
            });
        }
        Err(mismatch())
    }

    fn from_i128(wide: i128, kind: &TypeKind) -> Option<Value> {
        Some(match kind {
            TypeKind::TinyInt => Value::TinyInt(i8::try_from(wide).ok()?),
            TypeKind::SmallInt => Value::SmallInt(i16::try_from(wide).ok()?),
            TypeKind::Int => Value::Int(i32::try_from(wide).ok()?),
            TypeKind::BigInt => Value::BigInt(i64::try_from(wide).ok()?),
            TypeKind::Int128 => Value::Int128(wide),
            _ => return None,
        })
    }

    /// Compare two values, promoting across numeric kinds. `None` when the
    /// kinds are incomparable or a float comparison involves NaN.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Varchar(a), Value::Varchar(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            _ => {
                if self.kind().map(|k| k.is_float()).unwrap_or(false)
                    || other.kind().map(|k| k.is_float()).unwrap_or(false)
                {
                    self.as_f64()?.partial_cmp(&other.as_f64()?)
                } else {
                    Some(self.as_i128()?.cmp(&other.as_i128()?))
                }
            }
        }
    }

    /// Append a canonical byte encoding of an optional value. Group-by key
    /// equality is defined over these bytes.
    pub fn write_key(value: Option<&Value>, buf: &mut Vec<u8>) {
        match value {
            None => buf.push(0),
            Some(v) => {
                buf.push(1);
                v.write_bytes(buf);
            }
        }
    }

    fn write_bytes(&self, buf: &mut Vec<u8>) {
        match self {
            Value::Bool(v) => {
                buf.push(1);
                buf.push(*v as u8);
            }
            Value::TinyInt(v) => {
                buf.push(2);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::SmallInt(v) => {
                buf.push(3);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::Int(v) => {
                buf.push(4);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::BigInt(v) => {
                buf.push(5);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::Real(v) => {
                buf.push(6);
                buf.extend_from_slice(&v.to_bits().to_le_bytes());
            }
            Value::Double(v) => {
                buf.push(7);
                buf.extend_from_slice(&v.to_bits().to_le_bytes());
            }
            Value::Int128(v) => {
                buf.push(8);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::Varchar(s) => {
                buf.push(9);
                buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
                buf.extend_from_slice(s.as_bytes());
            }
            Value::List(items) => {
                buf.push(10);
                buf.extend_from_slice(&(items.len() as u32).to_le_bytes());
                for item in items {
                    item.write_bytes(buf);
                }
            }
            Value::Map(entries) => {
                buf.push(11);
                buf.extend_from_slice(&(entries.len() as u32).to_le_bytes());
                for (k, v) in entries {
                    k.write_bytes(buf);
                    v.write_bytes(buf);
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::TinyInt(v) => write!(f, "{v}"),
            Value::SmallInt(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Int128(v) => write!(f, "{v}"),
            Value::Varchar(v) => write!(f, "{v}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{k}:{v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::TinyInt(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::SmallInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<i128> for Value {
    fn from(v: i128) -> Self {
        Value::Int128(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Varchar(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Varchar(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_kind_compare() {
        assert_eq!(
            Value::Int(3).compare(&Value::BigInt(3)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            Value::TinyInt(2).compare(&Value::Double(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Varchar("a".into()).compare(&Value::Int(1)), None);
        assert_eq!(
            Value::Double(f64::NAN).compare(&Value::Double(1.0)),
            None
        );
    }

    #[test]
    fn narrowing_cast_checks_range() {
        assert_eq!(
            Value::BigInt(5).cast_to(&TypeKind::Int).unwrap(),
            Value::Int(5)
        );
        assert!(Value::BigInt(1 << 40).cast_to(&TypeKind::Int).is_err());
        assert!(Value::Varchar("x".into()).cast_to(&TypeKind::Int).is_err());
    }

    #[test]
    fn key_bytes_distinguish_null_from_zero() {
        let mut null_key = vec![];
        let mut zero_key = vec![];
        Value::write_key(None, &mut null_key);
        Value::write_key(Some(&Value::Int(0)), &mut zero_key);
        assert_ne!(null_key, zero_key);
    }

    #[test]
    fn key_bytes_are_kind_tagged() {
        let mut int_key = vec![];
        let mut long_key = vec![];
        Value::write_key(Some(&Value::Int(1)), &mut int_key);
        Value::write_key(Some(&Value::BigInt(1)), &mut long_key);
        assert_ne!(int_key, long_key);
    }
}
