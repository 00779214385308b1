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

//! The closed logical type system.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AltairError, Result};

/// Logical column type. Every kind except `Varchar` and the composites has a
/// fixed native width.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Bool,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Real,
    Double,
    Int128,
    Varchar,
    List(Box<TypeKind>),
    Map(Box<TypeKind>, Box<TypeKind>),
}

impl TypeKind {
    /// Fixed width in bytes, `None` for variable-length and composite kinds.
    pub fn width(&self) -> Option<usize> {
        match self {
            TypeKind::Bool | TypeKind::TinyInt => Some(1),
            TypeKind::SmallInt => Some(2),
            TypeKind::Int | TypeKind::Real => Some(4),
            TypeKind::BigInt | TypeKind::Double => Some(8),
            TypeKind::Int128 => Some(16),
            TypeKind::Varchar | TypeKind::List(_) | TypeKind::Map(_, _) => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            TypeKind::TinyInt
                | TypeKind::SmallInt
                | TypeKind::Int
                | TypeKind::BigInt
                | TypeKind::Int128
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, TypeKind::Real | TypeKind::Double)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, TypeKind::List(_) | TypeKind::Map(_, _))
    }

    /// Parse the textual form produced by `Display`.
    pub fn parse(text: &str) -> Result<TypeKind> {
        let text = text.trim();
        let kind = match text {
            "BOOL" => TypeKind::Bool,
            "TINYINT" => TypeKind::TinyInt,
            "SMALLINT" => TypeKind::SmallInt,
            "INT" => TypeKind::Int,
            "BIGINT" => TypeKind::BigInt,
            "REAL" => TypeKind::Real,
            "DOUBLE" => TypeKind::Double,
            "INT128" => TypeKind::Int128,
            "VARCHAR" => TypeKind::Varchar,
            _ => {
                if let Some(inner) = text.strip_prefix("LIST<").and_then(|s| s.strip_suffix('>')) {
                    TypeKind::List(Box::new(TypeKind::parse(inner)?))
                } else if let Some(inner) =
                    text.strip_prefix("MAP<").and_then(|s| s.strip_suffix('>'))
                {
                    let (k, v) = split_top_level(inner).ok_or_else(|| {
                        AltairError::InvalidQuery(format!("malformed map type: {text}"))
                    })?;
                    TypeKind::Map(
                        Box::new(TypeKind::parse(k)?),
                        Box::new(TypeKind::parse(v)?),
                    )
                } else {
                    return Err(AltairError::InvalidQuery(format!("unknown type: {text}")));
                }
            }
        };
        Ok(kind)
    }
}

/// Split `K,V` at the first comma that is not nested inside angle brackets.
fn split_top_level(text: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return Some((&text[..i], &text[i + 1..])),
            _ => {}
        }
    }
    None
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Bool => write!(f, "BOOL"),
            TypeKind::TinyInt => write!(f, "TINYINT"),
            TypeKind::SmallInt => write!(f, "SMALLINT"),
            TypeKind::Int => write!(f, "INT"),
            TypeKind::BigInt => write!(f, "BIGINT"),
            TypeKind::Real => write!(f, "REAL"),
            TypeKind::Double => write!(f, "DOUBLE"),
            TypeKind::Int128 => write!(f, "INT128"),
            TypeKind::Varchar => write!(f, "VARCHAR"),
            TypeKind::List(t) => write!(f, "LIST<{t}>"),
            TypeKind::Map(k, v) => write!(f, "MAP<{k},{v}>"),
        }
    }
}
