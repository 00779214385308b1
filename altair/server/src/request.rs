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

//! The structured query request as it arrives on the wire.

use serde::{Deserialize, Serialize};

/// A client query: table, time range, filter, dimensions, metrics, order
/// and bound. The concrete framing (HTTP, gRPC) lives out of tree; this is
/// the payload shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub table: String,
    /// Unix seconds, inclusive start of the queried range.
    pub start: i64,
    /// Unix seconds, exclusive end of the queried range.
    pub end: i64,
    #[serde(default)]
    pub filter: Option<FilterGroup>,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub order: Option<Order>,
    /// Maximum rows returned; zero means unbounded.
    #[serde(default)]
    pub top: usize,
    #[serde(default)]
    pub display: DisplayType,
}

/// A recursive filter: leaves combined under one logical operator, plus
/// nested sub-groups under the same operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterGroup {
    pub op: LogicalOp,
    #[serde(default)]
    pub expressions: Vec<FilterLeaf>,
    #[serde(default)]
    pub groups: Vec<FilterGroup>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterLeaf {
    pub column: String,
    pub op: FilterOp,
    /// Literal operand(s), rendered as strings; `IN` consumes all of them.
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterOp {
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    In,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub column: String,
    pub method: AggMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggMethod {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub column: String,
    #[serde(default, rename = "type")]
    pub order_type: OrderType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DisplayType {
    #[default]
    Table,
    /// Raw matching rows, no aggregation.
    Samples,
    /// Aggregation with the event-time column prepended as a dimension.
    Timeline,
}
