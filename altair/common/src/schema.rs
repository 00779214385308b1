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

//! Named, typed schemas with a stable textual serialization.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AltairError, Result};
use crate::types::TypeKind;

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: TypeKind,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// An ordered sequence of fields with unique names. Schemas are value types
/// compared by structural equality; the textual form `ROW<name:TYPE,...>`
/// round-trips through [`Schema::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

pub type SchemaRef = Arc<Schema>;

impl Schema {
    pub fn try_new(fields: Vec<Field>) -> Result<Self> {
        for (i, f) in fields.iter().enumerate() {
            if fields[..i].iter().any(|o| o.name == f.name) {
                return Err(AltairError::InvalidQuery(format!(
                    "duplicate column name in schema: {}",
                    f.name
                )));
            }
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn kind_of(&self, name: &str) -> Result<&TypeKind> {
        self.field(name).map(|f| &f.kind).ok_or_else(|| {
            AltairError::InvalidQuery(format!("column not found in schema: {name}"))
        })
    }

    /// Parse the `ROW<a:INT,b:VARCHAR>` textual form.
    pub fn parse(text: &str) -> Result<Schema> {
        let inner = text
            .trim()
            .strip_prefix("ROW<")
            .and_then(|s| s.strip_suffix('>'))
            .ok_or_else(|| AltairError::InvalidQuery(format!("malformed schema: {text}")))?;

        let mut fields = vec![];
        let mut depth = 0usize;
        let mut start = 0usize;
        let bytes = inner.as_bytes();
        for i in 0..=bytes.len() {
            let boundary = i == bytes.len() || (bytes[i] == b',' && depth == 0);
            if i < bytes.len() {
                match bytes[i] {
                    b'<' => depth += 1,
                    b'>' => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }
            if boundary {
                let part = inner[start..i].trim();
                if !part.is_empty() {
                    let (name, kind) = part.split_once(':').ok_or_else(|| {
                        AltairError::InvalidQuery(format!("malformed field: {part}"))
                    })?;
                    fields.push(Field::new(name.trim(), TypeKind::parse(kind)?));
                }
                start = i + 1;
            }
        }
        Schema::try_new(fields)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ROW<")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}:{}", field.name, field.kind)?;
        }
        write!(f, ">")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn textual_round_trip() {
        let schema = Schema::try_new(vec![
            Field::new("_time_", TypeKind::BigInt),
            Field::new("query", TypeKind::Varchar),
            Field::new("tags", TypeKind::List(Box::new(TypeKind::Varchar))),
        ])
        .unwrap();
        let text = schema.to_string();
        assert_eq!(text, "ROW<_time_:BIGINT,query:VARCHAR,tags:LIST<VARCHAR>>");
        assert_eq!(Schema::parse(&text).unwrap(), schema);
    }

    #[test]
    fn duplicate_names_rejected() {
        let result = Schema::try_new(vec![
            Field::new("a", TypeKind::Int),
            Field::new("a", TypeKind::Int),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn lookup() {
        let schema = Schema::parse("ROW<a:INT,b:DOUBLE>").unwrap();
        assert_eq!(schema.index_of("b"), Some(1));
        assert!(schema.kind_of("c").is_err());
    }
}
