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

//! Compiled per-row value evaluators.
//!
//! A [`ValueEval`] is a closed tagged variant over the expression forms the
//! planner emits: column reads, constants, arithmetic, comparisons, logical
//! combinators and LIKE. Evaluators are stateless and reentrant, carry their
//! inferred output kind, and serialize with the block plan across the node
//! boundary.

use std::cmp::Ordering;

use altair_common::{AltairError, Result, Row, TypeKind, Value};
use altair_expr::Operator;
use serde::{Deserialize, Serialize};

/// A compiled, typed, per-row evaluator. `eval` returns `None` for SQL NULL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueEval {
    Column {
        name: String,
        kind: TypeKind,
    },
    Constant {
        value: Option<Value>,
        kind: TypeKind,
    },
    Binary {
        op: Operator,
        kind: TypeKind,
        left: Box<ValueEval>,
        right: Box<ValueEval>,
    },
    Not(Box<ValueEval>),
    Like {
        input: Box<ValueEval>,
        matcher: LikeMatcher,
    },
}

impl ValueEval {
    pub fn column(name: impl Into<String>, kind: TypeKind) -> Self {
        ValueEval::Column {
            name: name.into(),
            kind,
        }
    }

    pub fn constant(value: Value) -> Result<Self> {
        let kind = value.kind()?;
        Ok(ValueEval::Constant {
            value: Some(value),
            kind,
        })
    }

    /// The static output kind of this evaluator.
    pub fn kind(&self) -> &TypeKind {
        match self {
            ValueEval::Column { kind, .. } => kind,
            ValueEval::Constant { kind, .. } => kind,
            ValueEval::Binary { kind, .. } => kind,
            ValueEval::Not(_) | ValueEval::Like { .. } => &TypeKind::Bool,
        }
    }

    /// Evaluate against one row.
    pub fn eval(&self, row: &dyn Row) -> Result<Option<Value>> {
        match self {
            ValueEval::Column { name, kind } => row.value(name, kind),
            ValueEval::Constant { value, .. } => Ok(value.clone()),
            ValueEval::Binary {
                op,
                kind,
                left,
                right,
            } => {
                if op.is_logical() {
                    return eval_logical(*op, left, right, row);
                }
                let l = left.eval(row)?;
                let r = right.eval(row)?;
                let (l, r) = match (l, r) {
                    (Some(l), Some(r)) => (l, r),
                    _ => return Ok(None),
                };
                if op.is_comparison() {
                    let pass = match l.compare(&r) {
                        None => false,
                        Some(ordering) => match op {
                            Operator::Eq => ordering == Ordering::Equal,
                            Operator::NotEq => ordering != Ordering::Equal,
                            Operator::Lt => ordering == Ordering::Less,
                            Operator::LtEq => ordering != Ordering::Greater,
                            Operator::Gt => ordering == Ordering::Greater,
                            Operator::GtEq => ordering != Ordering::Less,
                            _ => unreachable!("comparison operator"),
                        },
                    };
                    Ok(Some(Value::Bool(pass)))
                } else {
                    eval_arithmetic(*op, kind, &l, &r).map(Some)
                }
            }
            ValueEval::Not(inner) => Ok(match inner.eval(row)? {
                Some(Value::Bool(b)) => Some(Value::Bool(!b)),
                Some(other) => {
                    return Err(AltairError::Internal(format!(
                        "NOT over non-boolean value {other:?}"
                    )))
                }
                None => None,
            }),
            ValueEval::Like { input, matcher } => Ok(match input.eval(row)? {
                Some(Value::Varchar(s)) => Some(Value::Bool(matcher.matches(s.as_bytes()))),
                Some(other) => {
                    return Err(AltairError::Internal(format!(
                        "LIKE over non-varchar value {other:?}"
                    )))
                }
                None => None,
            }),
        }
    }
}

/// Three-valued AND/OR with short circuit on the decisive operand.
fn eval_logical(
    op: Operator,
    left: &ValueEval,
    right: &ValueEval,
    row: &dyn Row,
) -> Result<Option<Value>> {
    let l = eval_bool(left, row)?;
    match (op, l) {
        (Operator::And, Some(false)) => return Ok(Some(Value::Bool(false))),
        (Operator::Or, Some(true)) => return Ok(Some(Value::Bool(true))),
        _ => {}
    }
    let r = eval_bool(right, row)?;
    Ok(match op {
        Operator::And => match (l, r) {
            (Some(false), _) | (_, Some(false)) => Some(Value::Bool(false)),
            (Some(true), Some(true)) => Some(Value::Bool(true)),
            _ => None,
        },
        Operator::Or => match (l, r) {
            (Some(true), _) | (_, Some(true)) => Some(Value::Bool(true)),
            (Some(false), Some(false)) => Some(Value::Bool(false)),
            _ => None,
        },
        _ => unreachable!("logical operator"),
    })
}

fn eval_bool(eval: &ValueEval, row: &dyn Row) -> Result<Option<bool>> {
    match eval.eval(row)? {
        Some(Value::Bool(b)) => Ok(Some(b)),
        None => Ok(None),
        Some(other) => Err(AltairError::Internal(format!(
            "boolean operand evaluated to {other:?}"
        ))),
    }
}

/// Arithmetic in the promoted output kind. Integer math is checked: an
/// overflow or division by zero fails the enclosing block.
fn eval_arithmetic(op: Operator, kind: &TypeKind, l: &Value, r: &Value) -> Result<Value> {
    if kind.is_float() {
        let (a, b) = (
            l.as_f64()
                .ok_or_else(|| AltairError::Internal(format!("non-numeric operand {l:?}")))?,
            r.as_f64()
                .ok_or_else(|| AltairError::Internal(format!("non-numeric operand {r:?}")))?,
        );
        let out = match op {
            Operator::Plus => a + b,
            Operator::Minus => a - b,
            Operator::Multiply => a * b,
            Operator::Divide => a / b,
            _ => unreachable!("arithmetic operator"),
        };
        return Ok(match kind {
            TypeKind::Real => Value::Real(out as f32),
            _ => Value::Double(out),
        });
    }

    let (a, b) = (
        l.as_i128()
            .ok_or_else(|| AltairError::Internal(format!("non-numeric operand {l:?}")))?,
        r.as_i128()
            .ok_or_else(|| AltairError::Internal(format!("non-numeric operand {r:?}")))?,
    );
    let out = match op {
        Operator::Plus => a.checked_add(b),
        Operator::Minus => a.checked_sub(b),
        Operator::Multiply => a.checked_mul(b),
        Operator::Divide => {
            if b == 0 {
                return Err(AltairError::Internal("division by zero".into()));
            }
            a.checked_div(b)
        }
        _ => unreachable!("arithmetic operator"),
    }
    .ok_or_else(|| AltairError::Internal("arithmetic overflow".into()))?;
    Value::Int128(out)
        .cast_to(kind)
        .map_err(|_| AltairError::Internal(format!("arithmetic overflow in {kind}")))
}

/// Anchored SQL LIKE matcher: `%` matches any bytes (including none), `_`
/// exactly one byte, anything else literally. Applied to raw bytes with no
/// normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikeMatcher {
    pattern: String,
}

impl LikeMatcher {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, input: &[u8]) -> bool {
        let p = self.pattern.as_bytes();
        let (mut si, mut pi) = (0usize, 0usize);
        // last wildcard position and the input position it has consumed to
        let mut star: Option<usize> = None;
        let mut mark = 0usize;
        while si < input.len() {
            if pi < p.len() && p[pi] == b'%' {
                star = Some(pi);
                mark = si;
                pi += 1;
            } else if pi < p.len() && (p[pi] == b'_' || p[pi] == input[si]) {
                si += 1;
                pi += 1;
            } else if let Some(sp) = star {
                // backtrack: widen what the last % swallowed
                mark += 1;
                si = mark;
                pi = sp + 1;
            } else {
                return false;
            }
        }
        while pi < p.len() && p[pi] == b'%' {
            pi += 1;
        }
        pi == p.len()
    }
}
