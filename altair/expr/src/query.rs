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

//! The immutable query builder.

use std::sync::Arc;

use altair_common::TableMeta;
use serde::{Deserialize, Serialize};

use crate::expr::Expr;

/// Sort direction for the final phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Start a query against a table. `meta` provides the schema the DSL type
/// checks against.
pub fn table(name: impl Into<String>, meta: Arc<TableMeta>) -> Query {
    Query {
        table: name.into(),
        meta,
        filter: None,
        selects: vec![],
        group_by: vec![],
        sort_by: vec![],
        order: SortOrder::Asc,
        limit: None,
        sample: false,
    }
}

/// A relational query under construction. Every builder call consumes the
/// query and returns an extended value; compilation happens separately and
/// may fail with a typed error naming the offending expression.
#[derive(Debug, Clone)]
pub struct Query {
    pub table: String,
    pub meta: Arc<TableMeta>,
    pub filter: Option<Expr>,
    pub selects: Vec<Expr>,
    /// 1-based indices into the select list.
    pub group_by: Vec<usize>,
    /// 1-based indices into the select list.
    pub sort_by: Vec<usize>,
    pub order: SortOrder,
    pub limit: Option<usize>,
    /// Raw-row mode: skip aggregation and return projected rows.
    pub sample: bool,
}

impl Query {
    /// WHERE: restrict rows to those the predicate accepts.
    pub fn filter(mut self, predicate: Expr) -> Self {
        self.filter = Some(match self.filter.take() {
            None => predicate,
            Some(existing) => existing.and(predicate),
        });
        self
    }

    pub fn select(mut self, exprs: Vec<Expr>) -> Self {
        self.selects = exprs;
        self
    }

    /// GROUP BY, as 1-based positions in the select list.
    pub fn group_by(mut self, indices: &[usize]) -> Self {
        self.group_by = indices.to_vec();
        self
    }

    /// ORDER BY, as 1-based positions in the select list.
    pub fn sort_by(mut self, indices: &[usize], order: SortOrder) -> Self {
        self.sort_by = indices.to_vec();
        self.order = order;
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Return raw matching rows instead of aggregating.
    pub fn sample(mut self) -> Self {
        self.sample = true;
        self
    }
}
