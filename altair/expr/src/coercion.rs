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

//! Type inference and coercion rules for the expression DSL.

use altair_common::{AltairError, Result, Schema, TypeKind};

use crate::expr::{AggregateFunction, Expr, Operator};

/// Rank on the numeric ladder; promotion picks the higher rank.
fn integer_rank(kind: &TypeKind) -> Option<u8> {
    match kind {
        TypeKind::TinyInt => Some(0),
        TypeKind::SmallInt => Some(1),
        TypeKind::Int => Some(2),
        TypeKind::BigInt => Some(3),
        TypeKind::Int128 => Some(4),
        _ => None,
    }
}

/// The common type two numeric operands promote to.
pub fn numeric_promotion(left: &TypeKind, right: &TypeKind) -> Option<TypeKind> {
    if !left.is_numeric() || !right.is_numeric() {
        return None;
    }
    if left.is_float() || right.is_float() {
        return Some(
            if left == &TypeKind::Real && right == &TypeKind::Real {
                TypeKind::Real
            } else {
                TypeKind::Double
            },
        );
    }
    let (l, r) = (integer_rank(left)?, integer_rank(right)?);
    Some(if l >= r { left.clone() } else { right.clone() })
}

/// Result type of `left op right`, or a mismatch error.
pub fn binary_result_type(
    left: &TypeKind,
    op: &Operator,
    right: &TypeKind,
) -> Result<TypeKind> {
    if op.is_arithmetic() {
        return numeric_promotion(left, right).ok_or_else(|| {
            AltairError::TypeMismatch(format!("cannot apply {op} to {left} and {right}"))
        });
    }
    if op.is_comparison() {
        let comparable = numeric_promotion(left, right).is_some()
            || (left == right && !left.is_composite());
        return if comparable {
            Ok(TypeKind::Bool)
        } else {
            Err(AltairError::TypeMismatch(format!(
                "cannot compare {left} with {right}"
            )))
        };
    }
    // logical
    if left == &TypeKind::Bool && right == &TypeKind::Bool {
        Ok(TypeKind::Bool)
    } else {
        Err(AltairError::TypeMismatch(format!(
            "{op} requires BOOL operands, got {left} and {right}"
        )))
    }
}

/// Output type of an aggregate over an input of `input` kind.
pub fn aggregate_result_type(func: &AggregateFunction, input: &TypeKind) -> Result<TypeKind> {
    match func {
        AggregateFunction::Count => Ok(TypeKind::BigInt),
        AggregateFunction::Sum => match input {
            k if k.is_float() => Ok(TypeKind::Double),
            TypeKind::Int128 => Ok(TypeKind::Int128),
            k if k.is_integer() => Ok(TypeKind::BigInt),
            other => Err(AltairError::TypeMismatch(format!("cannot SUM {other}"))),
        },
        AggregateFunction::Min | AggregateFunction::Max => {
            if input.is_composite() {
                Err(AltairError::TypeMismatch(format!(
                    "cannot {func} over {input}"
                )))
            } else {
                Ok(input.clone())
            }
        }
        AggregateFunction::Avg => {
            if input.is_numeric() {
                Ok(TypeKind::Double)
            } else {
                Err(AltairError::TypeMismatch(format!("cannot AVG {input}")))
            }
        }
    }
}

/// Infer the output type of `expr` against `schema`. Errors identify the
/// offending (sub)expression.
pub fn expr_kind(expr: &Expr, schema: &Schema) -> Result<TypeKind> {
    match expr {
        Expr::Column(name) => schema.kind_of(name).cloned().map_err(|_| {
            AltairError::InvalidQuery(format!("unknown column in expression: {name}"))
        }),
        Expr::Literal(value) => value.kind(),
        Expr::Binary { left, op, right } => {
            let l = expr_kind(left, schema)?;
            let r = expr_kind(right, schema)?;
            binary_result_type(&l, op, &r)
                .map_err(|e| annotate(e, expr))
        }
        Expr::Not(inner) => {
            let kind = expr_kind(inner, schema)?;
            if kind == TypeKind::Bool {
                Ok(TypeKind::Bool)
            } else {
                Err(annotate(
                    AltairError::TypeMismatch(format!("NOT requires BOOL, got {kind}")),
                    expr,
                ))
            }
        }
        Expr::Like { expr: inner, .. } => {
            let kind = expr_kind(inner, schema)?;
            if kind == TypeKind::Varchar {
                Ok(TypeKind::Bool)
            } else {
                Err(annotate(
                    AltairError::TypeMismatch(format!("LIKE requires VARCHAR, got {kind}")),
                    expr,
                ))
            }
        }
        Expr::Aggregate { func, expr: inner } => {
            if inner.is_aggregate() {
                return Err(annotate(
                    AltairError::InvalidQuery("nested aggregate".into()),
                    expr,
                ));
            }
            let input = expr_kind(inner, schema)?;
            aggregate_result_type(func, &input).map_err(|e| annotate(e, expr))
        }
        Expr::Alias { expr: inner, .. } => expr_kind(inner, schema),
    }
}

fn annotate(error: AltairError, expr: &Expr) -> AltairError {
    match error {
        AltairError::TypeMismatch(msg) => {
            AltairError::TypeMismatch(format!("{msg} in `{expr}`"))
        }
        AltairError::InvalidQuery(msg) => {
            AltairError::InvalidQuery(format!("{msg} in `{expr}`"))
        }
        other => other,
    }
}
