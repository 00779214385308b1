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

//! From wire request to JSON response: build, compile, execute, render.

use std::sync::Arc;

use altair_common::{
    AltairError, Result, RowSet, Schema, TypeKind, Value, TIME_COLUMN,
};
use altair_execution::{compile, ExecutionPlan, ServerExecutor};
use altair_expr::expr_fn::{avg, col, count, like, lit, max, min, sum};
use altair_expr::{table, Expr, Query, SortOrder};
use log::debug;
use serde_json::{Map as JsonMap, Number, Value as JsonValue};

use crate::catalog::Catalog;
use crate::config::ServerConfig;
use crate::request::{
    AggMethod, DisplayType, FilterGroup, FilterLeaf, FilterOp, LogicalOp, OrderType,
    QueryRequest,
};

/// Largest integer JSON numbers can carry exactly.
const SAFE_JSON_INT: i64 = 9_007_199_254_740_991;

/// Serves structured query requests end to end.
pub struct QueryHandler {
    catalog: Arc<Catalog>,
    executor: Arc<ServerExecutor>,
    config: ServerConfig,
}

impl QueryHandler {
    pub fn new(
        catalog: Arc<Catalog>,
        executor: Arc<ServerExecutor>,
        config: ServerConfig,
    ) -> Self {
        Self {
            catalog,
            executor,
            config,
        }
    }

    /// Translate a wire request into a DSL query against the catalog.
    pub fn build(&self, request: &QueryRequest) -> Result<Query> {
        let meta = self.catalog.meta(&request.table)?;
        let schema = Arc::clone(&meta.schema);

        let mut dimensions = request.dimensions.clone();
        if request.display == DisplayType::Timeline
            && !dimensions.iter().any(|d| d == TIME_COLUMN)
        {
            dimensions.insert(0, TIME_COLUMN.to_string());
        }
        if dimensions.is_empty() && request.metrics.is_empty() {
            return Err(AltairError::InvalidQuery(
                "request has neither dimensions nor metrics".into(),
            ));
        }

        let mut query = table(request.table.as_str(), meta);
        if request.end > request.start {
            query = query.filter(
                col(TIME_COLUMN)
                    .gt_eq(lit(request.start))
                    .and(col(TIME_COLUMN).lt(lit(request.end))),
            );
        }
        if let Some(group) = &request.filter {
            query = query.filter(group_expr(group, &schema)?);
        }

        let mut selects: Vec<Expr> = dimensions.iter().map(|d| col(d.as_str())).collect();
        let mut output_names = dimensions.clone();
        if request.display == DisplayType::Samples {
            query = query.select(selects).sample();
        } else {
            for metric in &request.metrics {
                let input = col(metric.column.as_str());
                let agg = match metric.method {
                    AggMethod::Count => count(input),
                    AggMethod::Sum => sum(input),
                    AggMethod::Min => min(input),
                    AggMethod::Max => max(input),
                    AggMethod::Avg => avg(input),
                };
                selects.push(agg.alias(metric.column.as_str()));
                output_names.push(metric.column.clone());
            }
            let groups: Vec<usize> = (1..=dimensions.len()).collect();
            query = query.select(selects).group_by(&groups);
        }

        if let Some(order) = &request.order {
            let position = output_names
                .iter()
                .position(|name| name == &order.column)
                .ok_or_else(|| {
                    AltairError::InvalidQuery(format!(
                        "order column {} is not in the output",
                        order.column
                    ))
                })?;
            let direction = match order.order_type {
                OrderType::Asc => SortOrder::Asc,
                OrderType::Desc => SortOrder::Desc,
            };
            query = query.sort_by(&[position + 1], direction);
        }
        if request.top > 0 {
            query = query.limit(request.top);
        }
        Ok(query)
    }

    /// Compile a built query under the request window.
    pub fn plan(&self, query: &Query, window: (i64, i64)) -> Result<ExecutionPlan> {
        let mut plan = compile(query)?.with_deadline(self.config.default_deadline_ms);
        plan.set_window(window);
        debug!("{}", plan.explain());
        Ok(plan)
    }

    /// Serve one request to a materialized row set.
    pub async fn query(&self, request: &QueryRequest) -> Result<RowSet> {
        let query = self.build(request)?;
        let window = if request.end > request.start {
            (request.start, request.end)
        } else {
            (i64::MIN, i64::MAX)
        };
        let plan = self.plan(&query, window)?;
        self.executor.execute(&plan).await
    }

    /// Render a row set as a JSON array of objects keyed by output column
    /// names. BIGINT/INT128 values outside the safe integer range render as
    /// strings.
    pub fn jsonify(rows: &RowSet) -> JsonValue {
        let fields = rows.schema().fields();
        JsonValue::Array(
            rows.rows()
                .iter()
                .map(|row| {
                    let mut object = JsonMap::with_capacity(fields.len());
                    for (field, value) in fields.iter().zip(row.values()) {
                        object.insert(field.name.clone(), json_value(value.as_ref()));
                    }
                    JsonValue::Object(object)
                })
                .collect(),
        )
    }
}

fn group_expr(group: &FilterGroup, schema: &Arc<Schema>) -> Result<Expr> {
    let mut parts: Vec<Expr> = vec![];
    for leaf in &group.expressions {
        parts.push(leaf_expr(leaf, schema)?);
    }
    for nested in &group.groups {
        parts.push(group_expr(nested, schema)?);
    }
    let mut iter = parts.into_iter();
    let first = iter.next().ok_or_else(|| {
        AltairError::InvalidQuery("empty filter group".into())
    })?;
    Ok(iter.fold(first, |acc, next| match group.op {
        LogicalOp::And => acc.and(next),
        LogicalOp::Or => acc.or(next),
    }))
}

fn leaf_expr(leaf: &FilterLeaf, schema: &Arc<Schema>) -> Result<Expr> {
    let kind = schema
        .kind_of(&leaf.column)
        .map_err(|_| AltairError::InvalidQuery(format!("unknown column: {}", leaf.column)))?
        .clone();
    let first = || {
        leaf.values.first().ok_or_else(|| {
            AltairError::InvalidQuery(format!("filter on {} has no value", leaf.column))
        })
    };
    let column = || col(leaf.column.as_str());
    Ok(match leaf.op {
        FilterOp::Eq => column().eq(Expr::Literal(parse_value(&kind, first()?)?)),
        FilterOp::Neq => column().not_eq(Expr::Literal(parse_value(&kind, first()?)?)),
        FilterOp::Lt => column().lt(Expr::Literal(parse_value(&kind, first()?)?)),
        FilterOp::Le => column().lt_eq(Expr::Literal(parse_value(&kind, first()?)?)),
        FilterOp::Gt => column().gt(Expr::Literal(parse_value(&kind, first()?)?)),
        FilterOp::Ge => column().gt_eq(Expr::Literal(parse_value(&kind, first()?)?)),
        FilterOp::Like => like(column(), first()?.clone()),
        FilterOp::In => {
            let mut values = leaf.values.iter();
            let head = values.next().ok_or_else(|| {
                AltairError::InvalidQuery(format!("IN on {} has no values", leaf.column))
            })?;
            let mut expr = column().eq(Expr::Literal(parse_value(&kind, head)?));
            for value in values {
                expr = expr.or(column().eq(Expr::Literal(parse_value(&kind, value)?)));
            }
            expr
        }
    })
}

/// Parse a wire literal into the column's kind.
fn parse_value(kind: &TypeKind, text: &str) -> Result<Value> {
    let bad = || AltairError::InvalidQuery(format!("cannot parse `{text}` as {kind}"));
    Ok(match kind {
        TypeKind::Bool => Value::Bool(text.parse().map_err(|_| bad())?),
        TypeKind::TinyInt => Value::TinyInt(text.parse().map_err(|_| bad())?),
        TypeKind::SmallInt => Value::SmallInt(text.parse().map_err(|_| bad())?),
        TypeKind::Int => Value::Int(text.parse().map_err(|_| bad())?),
        TypeKind::BigInt => Value::BigInt(text.parse().map_err(|_| bad())?),
        TypeKind::Real => Value::Real(text.parse().map_err(|_| bad())?),
        TypeKind::Double => Value::Double(text.parse().map_err(|_| bad())?),
        TypeKind::Int128 => Value::Int128(text.parse().map_err(|_| bad())?),
        TypeKind::Varchar => Value::Varchar(text.to_string()),
        TypeKind::List(_) | TypeKind::Map(_, _) => return Err(bad()),
    })
}

fn json_value(value: Option<&Value>) -> JsonValue {
    let Some(value) = value else {
        return JsonValue::Null;
    };
    match value {
        Value::Bool(v) => JsonValue::Bool(*v),
        Value::TinyInt(v) => JsonValue::Number((*v).into()),
        Value::SmallInt(v) => JsonValue::Number((*v).into()),
        Value::Int(v) => JsonValue::Number((*v).into()),
        Value::BigInt(v) => {
            if v.abs() <= SAFE_JSON_INT {
                JsonValue::Number((*v).into())
            } else {
                JsonValue::String(v.to_string())
            }
        }
        Value::Int128(v) => {
            if v.unsigned_abs() <= SAFE_JSON_INT as u128 {
                JsonValue::Number((*v as i64).into())
            } else {
                JsonValue::String(v.to_string())
            }
        }
        Value::Real(v) => Number::from_f64(f64::from(*v))
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Double(v) => Number::from_f64(*v)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Varchar(v) => JsonValue::String(v.clone()),
        Value::List(items) => {
            JsonValue::Array(items.iter().map(|v| json_value(Some(v))).collect())
        }
        Value::Map(entries) => JsonValue::Object(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), json_value(Some(v))))
                .collect(),
        ),
    }
}
