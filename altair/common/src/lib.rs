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

//! Common building blocks shared by every Altair crate: the logical type
//! system, schemas, scalar values, row abstractions and the workspace-wide
//! error type.

pub mod cursor;
pub mod error;
pub mod node;
pub mod row;
pub mod schema;
pub mod table;
pub mod time;
pub mod types;
pub mod value;

pub use cursor::RowSet;
pub use error::{AltairError, Result};
pub use node::Node;
pub use row::{ListRead, MapRead, Row, ValueRow};
pub use schema::{Field, Schema, SchemaRef};
pub use table::{TableMeta, TableOptions};
pub use types::TypeKind;
pub use value::Value;

/// Name of the implicit event-time column every table carries. Time
/// predicates over this column narrow the plan window in addition to
/// filtering rows.
pub const TIME_COLUMN: &str = "_time_";
