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

//! Aggregate evaluators: a block-level fold plus a partial-level merge.
//!
//! The block phase folds rows into an [`AggState`]; the final phase merges
//! states across blocks with the same merge function. Every merge is
//! associative and commutative, so block order never affects results.

use std::cmp::Ordering;

use altair_common::{AltairError, Result, Row, TypeKind, Value};
use altair_expr::coercion::aggregate_result_type;
use altair_expr::AggregateFunction;
use serde::{Deserialize, Serialize};

use crate::eval::ValueEval;

/// Running state of one aggregate. Serializable: partial states travel from
/// nodes to the coordinator inside partial rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AggState {
    Count { n: i64 },
    SumInt { sum: i64, any: bool },
    SumInt128 { sum: i128, any: bool },
    SumDouble { sum: f64, any: bool },
    Min { value: Option<Value> },
    Max { value: Option<Value> },
    Avg { sum: f64, n: i64 },
}

impl AggState {
    /// Merge another partial state of the same shape into this one.
    pub fn merge(&mut self, other: &AggState) -> Result<()> {
        match (self, other) {
            (AggState::Count { n }, AggState::Count { n: o }) => *n += o,
            (AggState::SumInt { sum, any }, AggState::SumInt { sum: os, any: oa }) => {
                *sum = sum.checked_add(*os).ok_or_else(overflow)?;
                *any |= oa;
            }
            (
                AggState::SumInt128 { sum, any },
                AggState::SumInt128 { sum: os, any: oa },
            ) => {
                *sum = sum.checked_add(*os).ok_or_else(overflow)?;
                *any |= oa;
            }
            (
                AggState::SumDouble { sum, any },
                AggState::SumDouble { sum: os, any: oa },
            ) => {
                *sum += os;
                *any |= oa;
            }
            (AggState::Min { value }, AggState::Min { value: ov }) => {
                take_extreme(value, ov, Ordering::Less);
            }
            (AggState::Max { value }, AggState::Max { value: ov }) => {
                take_extreme(value, ov, Ordering::Greater);
            }
            (AggState::Avg { sum, n }, AggState::Avg { sum: os, n: on }) => {
                *sum += os;
                *n += on;
            }
            (state, other) => {
                return Err(AltairError::Internal(format!(
                    "cannot merge aggregate states {state:?} and {other:?}"
                )))
            }
        }
        Ok(())
    }

    /// The final value of this state; `None` when no input contributed.
    pub fn finalize(&self) -> Option<Value> {
        match self {
            AggState::Count { n } => Some(Value::BigInt(*n)),
            AggState::SumInt { sum, any } => any.then_some(Value::BigInt(*sum)),
            AggState::SumInt128 { sum, any } => any.then_some(Value::Int128(*sum)),
            AggState::SumDouble { sum, any } => any.then_some(Value::Double(*sum)),
            AggState::Min { value } | AggState::Max { value } => value.clone(),
            AggState::Avg { sum, n } => (*n > 0).then(|| Value::Double(sum / *n as f64)),
        }
    }
}

fn overflow() -> AltairError {
    AltairError::Internal("sum overflow".into())
}

fn take_extreme(current: &mut Option<Value>, candidate: &Option<Value>, keep: Ordering) {
    if let Some(c) = candidate {
        let better = match current {
            None => true,
            Some(cur) => c.compare(cur) == Some(keep),
        };
        if better {
            *current = Some(c.clone());
        }
    }
}

/// A compiled aggregate: function, input evaluator and output kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateEval {
    pub func: AggregateFunction,
    pub input: ValueEval,
    kind: TypeKind,
}

impl AggregateEval {
    pub fn new(func: AggregateFunction, input: ValueEval) -> Result<Self> {
        let kind = aggregate_result_type(&func, input.kind())?;
        Ok(Self { func, input, kind })
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    /// The empty state this aggregate folds into.
    pub fn init(&self) -> AggState {
        match self.func {
            AggregateFunction::Count => AggState::Count { n: 0 },
            AggregateFunction::Sum => match self.kind {
                TypeKind::Double => AggState::SumDouble { sum: 0.0, any: false },
                TypeKind::Int128 => AggState::SumInt128 { sum: 0, any: false },
                _ => AggState::SumInt { sum: 0, any: false },
            },
            AggregateFunction::Min => AggState::Min { value: None },
            AggregateFunction::Max => AggState::Max { value: None },
            AggregateFunction::Avg => AggState::Avg { sum: 0.0, n: 0 },
        }
    }

    /// Fold one row into the state.
    ///
    /// COUNT never evaluates its input: it increments per qualifying row,
    /// except that COUNT over a bare column reference skips that column's
    /// nulls (count of non-null values).
    pub fn fold(&self, state: &mut AggState, row: &dyn Row) -> Result<()> {
        match (self.func, &mut *state) {
            (AggregateFunction::Count, AggState::Count { n }) => {
                if let ValueEval::Column { name, .. } = &self.input {
                    if row.is_null(name)? {
                        return Ok(());
                    }
                }
                *n += 1;
            }
            (AggregateFunction::Sum, AggState::SumInt { sum, any }) => {
                if let Some(v) = self.input.eval(row)? {
                    let add = v.as_i128().ok_or_else(|| non_numeric(&v))?;
                    let add = i64::try_from(add).map_err(|_| overflow())?;
                    *sum = sum.checked_add(add).ok_or_else(overflow)?;
                    *any = true;
                }
            }
            (AggregateFunction::Sum, AggState::SumInt128 { sum, any }) => {
                if let Some(v) = self.input.eval(row)? {
                    let add = v.as_i128().ok_or_else(|| non_numeric(&v))?;
                    *sum = sum.checked_add(add).ok_or_else(overflow)?;
                    *any = true;
                }
            }
            (AggregateFunction::Sum, AggState::SumDouble { sum, any }) => {
                if let Some(v) = self.input.eval(row)? {
                    *sum += v.as_f64().ok_or_else(|| non_numeric(&v))?;
                    *any = true;
                }
            }
            (AggregateFunction::Min, AggState::Min { value }) => {
                take_extreme(value, &self.input.eval(row)?, Ordering::Less);
            }
            (AggregateFunction::Max, AggState::Max { value }) => {
                take_extreme(value, &self.input.eval(row)?, Ordering::Greater);
            }
            (AggregateFunction::Avg, AggState::Avg { sum, n }) => {
                if let Some(v) = self.input.eval(row)? {
                    *sum += v.as_f64().ok_or_else(|| non_numeric(&v))?;
                    *n += 1;
                }
            }
            (func, state) => {
                return Err(AltairError::Internal(format!(
                    "aggregate {func} folded into mismatched state {state:?}"
                )))
            }
        }
        Ok(())
    }
}

fn non_numeric(v: &Value) -> AltairError {
    AltairError::Internal(format!("non-numeric aggregate input {v:?}"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use altair_common::row::row_of;
    use altair_common::{Schema, SchemaRef, ValueRow};

    use super::*;

    fn schema() -> SchemaRef {
        Arc::new(Schema::parse("ROW<v:INT,s:VARCHAR>").unwrap())
    }

    fn int_row(v: Option<i32>) -> ValueRow {
        let pairs = match v {
            Some(v) => vec![("v", Value::Int(v))],
            None => vec![],
        };
        row_of(&schema(), pairs).unwrap()
    }

    fn agg(func: AggregateFunction) -> AggregateEval {
        AggregateEval::new(func, ValueEval::column("v", TypeKind::Int)).unwrap()
    }

    #[test]
    fn fold_then_merge_equals_single_fold() {
        // associativity: fold rows in two partitions and merge
        let rows: Vec<_> = (1..=10).map(|v| int_row(Some(v))).collect();
        for func in [
            AggregateFunction::Count,
            AggregateFunction::Sum,
            AggregateFunction::Min,
            AggregateFunction::Max,
            AggregateFunction::Avg,
        ] {
            let a = agg(func);
            let mut whole = a.init();
            for row in &rows {
                a.fold(&mut whole, row).unwrap();
            }
            let (left, right) = rows.split_at(4);
            let mut p1 = a.init();
            for row in left {
                a.fold(&mut p1, row).unwrap();
            }
            let mut p2 = a.init();
            for row in right {
                a.fold(&mut p2, row).unwrap();
            }
            p1.merge(&p2).unwrap();
            assert_eq!(p1, whole, "{func} not associative");
        }
    }

    #[test]
    fn sum_of_int_column_is_bigint() {
        let a = agg(AggregateFunction::Sum);
        assert_eq!(a.kind(), &TypeKind::BigInt);
        let mut state = a.init();
        for v in [3, 5] {
            a.fold(&mut state, &int_row(Some(v))).unwrap();
        }
        assert_eq!(state.finalize(), Some(Value::BigInt(8)));
    }

    #[test]
    fn count_skips_column_nulls() {
        let a = agg(AggregateFunction::Count);
        let mut state = a.init();
        a.fold(&mut state, &int_row(Some(1))).unwrap();
        a.fold(&mut state, &int_row(None)).unwrap();
        a.fold(&mut state, &int_row(Some(2))).unwrap();
        assert_eq!(state.finalize(), Some(Value::BigInt(2)));
    }

    #[test]
    fn count_of_constant_counts_every_row() {
        let a = AggregateEval::new(
            AggregateFunction::Count,
            ValueEval::constant(Value::Int(1)).unwrap(),
        )
        .unwrap();
        let mut state = a.init();
        a.fold(&mut state, &int_row(Some(1))).unwrap();
        a.fold(&mut state, &int_row(None)).unwrap();
        assert_eq!(state.finalize(), Some(Value::BigInt(2)));
    }

    #[test]
    fn sum_over_no_rows_is_null() {
        let a = agg(AggregateFunction::Sum);
        assert_eq!(a.init().finalize(), None);
        // but count over no rows is zero
        assert_eq!(
            agg(AggregateFunction::Count).init().finalize(),
            Some(Value::BigInt(0))
        );
    }

    #[test]
    fn avg_is_double() {
        let a = agg(AggregateFunction::Avg);
        let mut state = a.init();
        for v in [1, 2] {
            a.fold(&mut state, &int_row(Some(v))).unwrap();
        }
        assert_eq!(state.finalize(), Some(Value::Double(1.5)));
    }

    #[test]
    fn min_max_over_strings() {
        let a = AggregateEval::new(
            AggregateFunction::Min,
            ValueEval::column("s", TypeKind::Varchar),
        )
        .unwrap();
        let mut state = a.init();
        for s in ["gym", "yoga", "dance"] {
            let row = row_of(&schema(), vec![("s", Value::Varchar(s.into()))]).unwrap();
            a.fold(&mut state, &row).unwrap();
        }
        assert_eq!(state.finalize(), Some(Value::Varchar("dance".into())));
    }

    #[test]
    fn mismatched_merge_is_internal_error() {
        let mut count = AggState::Count { n: 1 };
        let avg = AggState::Avg { sum: 1.0, n: 1 };
        assert!(count.merge(&avg).is_err());
    }
}
