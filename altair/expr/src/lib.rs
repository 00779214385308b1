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

//! The relational expression DSL.
//!
//! Queries are built programmatically:
//!
//! ```
//! use altair_expr::expr_fn::{col, lit, sum};
//! use altair_expr::query::table;
//! # use std::sync::Arc;
//! # use altair_common::{Schema, TableMeta};
//! # let meta = TableMeta::new(
//! #     "trends",
//! #     Arc::new(Schema::parse("ROW<_time_:BIGINT,query:VARCHAR,count:INT>").unwrap()),
//! # );
//! let query = table("trends", meta)
//!     .filter(col("query").eq(lit("yoga")))
//!     .select(vec![col("_time_").alias("date"), sum(col("count")).alias("total")])
//!     .group_by(&[1]);
//! ```
//!
//! The builder is immutable: every call yields a new query value. Type
//! checking happens at build/compile time against the table schema.

pub mod coercion;
pub mod expr;
pub mod query;

pub use expr::{AggregateFunction, Expr, Operator};
pub use query::{table, Query, SortOrder};

/// Builder functions for expressions, re-exported in one place.
pub mod expr_fn {
    pub use crate::expr::{avg, col, count, like, lit, max, min, sum};
}
