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

//! Compilation of a [`Query`] into an [`ExecutionPlan`].
//!
//! Besides lowering expressions into evaluators, the planner places
//! predicates: the WHERE clause is split into a conjunction, equality
//! clauses over bloom-backed columns become block-skip probes, and clauses
//! over the event-time column narrow the plan's prune window. Every clause
//! also stays in the row predicate, so a block that partially overlaps the
//! window still filters row by row.

use std::collections::HashSet;

use altair_common::{
    AltairError, Field, Result, Schema, SchemaRef, TypeKind, Value, TIME_COLUMN,
};
use altair_expr::coercion::binary_result_type;
use altair_expr::{Expr, Operator, Query};

use crate::aggregate::AggregateEval;
use crate::eval::{LikeMatcher, ValueEval};
use crate::plan::{
    BlockPlan, BloomProbe, ExecutionPlan, FinalPlan, NamedAggregate, NamedEval, OrderBy,
    ScanMode, ALL_TIME,
};

/// Deadline applied to plans that do not override it.
pub const DEFAULT_DEADLINE_MS: u64 = 30_000;

/// Compile a query into a two-phase plan, or fail with a typed error
/// identifying the offending expression.
pub fn compile(query: &Query) -> Result<ExecutionPlan> {
    let schema = &query.meta.schema;
    if query.selects.is_empty() {
        return Err(AltairError::InvalidQuery("empty select list".into()));
    }

    // lower the select list, keeping declaration order
    let mut names: Vec<String> = vec![];
    let mut keys: Vec<NamedEval> = vec![];
    let mut aggregates: Vec<NamedAggregate> = vec![];
    // select position (0-based) -> output column position
    let mut select_to_output: Vec<usize> = vec![];
    let has_aggregates = query.selects.iter().any(Expr::is_aggregate);
    let sample = query.sample || (!has_aggregates && query.group_by.is_empty());
    if query.sample && has_aggregates {
        return Err(AltairError::InvalidQuery(
            "sample queries cannot aggregate".into(),
        ));
    }

    for select in &query.selects {
        let name = select.output_name();
        if names.contains(&name) {
            return Err(AltairError::InvalidQuery(format!(
                "duplicate output column: {name}"
            )));
        }
        names.push(name.clone());
        match select.unaliased() {
            Expr::Aggregate { func, expr } => {
                let input = compile_expr(expr, schema)?;
                let agg = AggregateEval::new(*func, input)
                    .map_err(|e| annotate(e, select))?;
                select_to_output.push(usize::MAX); // patched below
                aggregates.push(NamedAggregate { name, agg });
            }
            scalar => {
                let eval = compile_expr(scalar, schema)?;
                select_to_output.push(keys.len());
                keys.push(NamedEval { name, eval });
            }
        }
    }
    // aggregates land after every key in the output schema
    let mut agg_seen = 0;
    for (i, select) in query.selects.iter().enumerate() {
        if select.is_aggregate() {
            select_to_output[i] = keys.len() + agg_seen;
            agg_seen += 1;
        }
    }

    if !sample {
        validate_grouping(query, &names)?;
    }

    // predicate placement
    let mut window = ALL_TIME;
    let mut probes = vec![];
    let predicate = match &query.filter {
        None => None,
        Some(filter) => {
            let mut clauses = vec![];
            split_conjunction(filter, &mut clauses);
            for clause in clauses {
                if let Some(bound) = time_bound(clause) {
                    window = (window.0.max(bound.0), window.1.min(bound.1));
                }
                if let Some(probe) = bloom_probe(clause, query) {
                    probes.push(probe);
                }
            }
            let eval = compile_expr(filter, schema)?;
            if eval.kind() != &TypeKind::Bool {
                return Err(AltairError::TypeMismatch(format!(
                    "filter must be BOOL, got {} in `{filter}`",
                    eval.kind()
                )));
            }
            Some(eval)
        }
    };

    // output schema: keys then aggregates
    let mut fields: Vec<Field> = keys
        .iter()
        .map(|k| Field::new(k.name.clone(), k.eval.kind().clone()))
        .collect();
    fields.extend(
        aggregates
            .iter()
            .map(|a| Field::new(a.name.clone(), a.agg.kind().clone())),
    );
    let output: SchemaRef = Schema::try_new(fields)?.into();

    // sort positions translate from select-list indices to output columns
    let order = if query.sort_by.is_empty() {
        None
    } else {
        let mut indices = vec![];
        for &pos in &query.sort_by {
            if pos == 0 || pos > query.selects.len() {
                return Err(AltairError::InvalidQuery(format!(
                    "sort position {pos} out of range"
                )));
            }
            indices.push(select_to_output[pos - 1]);
        }
        Some(OrderBy {
            indices,
            order: query.order,
        })
    };

    Ok(ExecutionPlan {
        block_phase: BlockPlan {
            table: query.table.clone(),
            predicate,
            keys,
            aggregates,
            probes,
            mode: if sample {
                ScanMode::Sample
            } else {
                ScanMode::Aggregate
            },
            window,
            row_limit: if sample { query.limit } else { None },
            deadline_ms: DEFAULT_DEADLINE_MS,
        },
        final_phase: FinalPlan {
            order,
            limit: query.limit,
            strict: true,
        },
        output,
    })
}

/// Every non-aggregate select must be covered by the group-by index set,
/// and every group-by index must point at a non-aggregate.
fn validate_grouping(query: &Query, names: &[String]) -> Result<()> {
    let groups: HashSet<usize> = query.group_by.iter().copied().collect();
    for &pos in &groups {
        if pos == 0 || pos > query.selects.len() {
            return Err(AltairError::InvalidQuery(format!(
                "group-by position {pos} out of range"
            )));
        }
        if query.selects[pos - 1].is_aggregate() {
            return Err(AltairError::InvalidQuery(format!(
                "group-by position {pos} is an aggregate"
            )));
        }
    }
    for (i, select) in query.selects.iter().enumerate() {
        if !select.is_aggregate() && !groups.contains(&(i + 1)) {
            return Err(AltairError::UngroupedProjection(names[i].clone()));
        }
    }
    Ok(())
}

fn split_conjunction<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    match expr {
        Expr::Binary {
            left,
            op: Operator::And,
            right,
        } => {
            split_conjunction(left, out);
            split_conjunction(right, out);
        }
        other => out.push(other),
    }
}

/// `[start, end)` bound implied by a clause over the event-time column.
fn time_bound(clause: &Expr) -> Option<(i64, i64)> {
    let (column, op, literal) = comparison_parts(clause)?;
    if column != TIME_COLUMN {
        return None;
    }
    let v = literal.as_i128()?;
    let v = i64::try_from(v).ok()?;
    Some(match op {
        Operator::Gt => (v + 1, i64::MAX),
        Operator::GtEq => (v, i64::MAX),
        Operator::Lt => (i64::MIN, v),
        Operator::LtEq => (i64::MIN, v + 1),
        Operator::Eq => (v, v + 1),
        _ => return None,
    })
}

/// A block-skip probe from a `column = literal` clause over a bloom-backed
/// column. Probes that cannot be aligned to the column kind are dropped
/// rather than risking an unsound skip.
fn bloom_probe(clause: &Expr, query: &Query) -> Option<BloomProbe> {
    let (column, op, literal) = comparison_parts(clause)?;
    if op != Operator::Eq || !query.meta.has_bloom(column) {
        return None;
    }
    let kind = query.meta.schema.kind_of(column).ok()?;
    let value = literal.cast_to(kind).ok()?;
    Some(BloomProbe {
        column: column.to_string(),
        value,
    })
}

/// Destructure `column op literal` (or its mirror) out of a clause.
fn comparison_parts(clause: &Expr) -> Option<(&str, Operator, &Value)> {
    let Expr::Binary { left, op, right } = clause else {
        return None;
    };
    match (left.unaliased(), right.unaliased()) {
        (Expr::Column(name), Expr::Literal(value)) => Some((name, *op, value)),
        (Expr::Literal(value), Expr::Column(name)) => {
            let mirrored = match op {
                Operator::Lt => Operator::Gt,
                Operator::LtEq => Operator::GtEq,
                Operator::Gt => Operator::Lt,
                Operator::GtEq => Operator::LtEq,
                other => *other,
            };
            Some((name, mirrored, value))
        }
        _ => None,
    }
}

/// Lower a scalar expression into an evaluator.
fn compile_expr(expr: &Expr, schema: &SchemaRef) -> Result<ValueEval> {
    match expr {
        Expr::Column(name) => {
            let kind = schema.kind_of(name).map_err(|_| {
                AltairError::InvalidQuery(format!("unknown column in expression: {name}"))
            })?;
            Ok(ValueEval::column(name.clone(), kind.clone()))
        }
        Expr::Literal(value) => ValueEval::constant(value.clone()),
        Expr::Binary { left, op, right } => {
            let l = compile_expr(left, schema)?;
            let r = compile_expr(right, schema)?;
            let kind = binary_result_type(l.kind(), op, r.kind())
                .map_err(|e| annotate(e, expr))?;
            Ok(ValueEval::Binary {
                op: *op,
                kind,
                left: Box::new(l),
                right: Box::new(r),
            })
        }
        Expr::Not(inner) => {
            let compiled = compile_expr(inner, schema)?;
            if compiled.kind() != &TypeKind::Bool {
                return Err(annotate(
                    AltairError::TypeMismatch(format!(
                        "NOT requires BOOL, got {}",
                        compiled.kind()
                    )),
                    expr,
                ));
            }
            Ok(ValueEval::Not(Box::new(compiled)))
        }
        Expr::Like {
            expr: inner,
            pattern,
        } => {
            let input = compile_expr(inner, schema)?;
            if input.kind() != &TypeKind::Varchar {
                return Err(annotate(
                    AltairError::TypeMismatch(format!(
                        "LIKE requires VARCHAR, got {}",
                        input.kind()
                    )),
                    expr,
                ));
            }
            Ok(ValueEval::Like {
                input: Box::new(input),
                matcher: LikeMatcher::new(pattern.clone()),
            })
        }
        Expr::Aggregate { .. } => Err(AltairError::InvalidQuery(format!(
            "aggregate in scalar position: {expr}"
        ))),
        Expr::Alias { expr: inner, .. } => compile_expr(inner, schema),
    }
}

fn annotate(error: AltairError, expr: &Expr) -> AltairError {
    match error {
        AltairError::TypeMismatch(msg) => {
            AltairError::TypeMismatch(format!("{msg} in `{expr}`"))
        }
        other => other,
    }
}
