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

//! Expression tree: columns, literals, operators and aggregates.

use std::fmt;
use std::ops;

use altair_common::Value;
use serde::{Deserialize, Serialize};

/// Binary operators over expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Plus,
    Minus,
    Multiply,
    Divide,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl Operator {
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Operator::Plus | Operator::Minus | Operator::Multiply | Operator::Divide
        )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Operator::Eq
                | Operator::NotEq
                | Operator::Lt
                | Operator::LtEq
                | Operator::Gt
                | Operator::GtEq
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, Operator::And | Operator::Or)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::LtEq => "<=",
            Operator::Gt => ">",
            Operator::GtEq => ">=",
            Operator::And => "AND",
            Operator::Or => "OR",
        };
        write!(f, "{token}")
    }
}

/// The supported aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFunction {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Avg => "AVG",
        };
        write!(f, "{name}")
    }
}

/// A typed relational expression. Output types are inferred against a table
/// schema at build time; incompatible operand types are rejected before any
/// execution happens.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(String),
    Literal(Value),
    Binary {
        left: Box<Expr>,
        op: Operator,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Like {
        expr: Box<Expr>,
        pattern: String,
    },
    Aggregate {
        func: AggregateFunction,
        expr: Box<Expr>,
    },
    Alias {
        expr: Box<Expr>,
        name: String,
    },
}

impl Expr {
    fn binary(self, op: Operator, right: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(right),
        }
    }

    pub fn eq(self, other: Expr) -> Expr {
        self.binary(Operator::Eq, other)
    }

    pub fn not_eq(self, other: Expr) -> Expr {
        self.binary(Operator::NotEq, other)
    }

    pub fn lt(self, other: Expr) -> Expr {
        self.binary(Operator::Lt, other)
    }

    pub fn lt_eq(self, other: Expr) -> Expr {
        self.binary(Operator::LtEq, other)
    }

    pub fn gt(self, other: Expr) -> Expr {
        self.binary(Operator::Gt, other)
    }

    pub fn gt_eq(self, other: Expr) -> Expr {
        self.binary(Operator::GtEq, other)
    }

    pub fn and(self, other: Expr) -> Expr {
        self.binary(Operator::And, other)
    }

    pub fn or(self, other: Expr) -> Expr {
        self.binary(Operator::Or, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    pub fn alias(self, name: impl Into<String>) -> Expr {
        Expr::Alias {
            expr: Box::new(self),
            name: name.into(),
        }
    }

    /// The expression with any outer alias removed.
    pub fn unaliased(&self) -> &Expr {
        match self {
            Expr::Alias { expr, .. } => expr.unaliased(),
            other => other,
        }
    }

    /// Output column name: the alias if present, otherwise a rendering of
    /// the expression itself.
    pub fn output_name(&self) -> String {
        match self {
            Expr::Alias { name, .. } => name.clone(),
            Expr::Column(name) => name.clone(),
            Expr::Aggregate { func, expr } => format!("{func}({expr})").to_lowercase(),
            other => other.to_string(),
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self.unaliased(), Expr::Aggregate { .. })
    }

    /// Column names referenced anywhere under this expression.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = vec![];
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Column(name) => out.push(name),
            Expr::Literal(_) => {}
            Expr::Binary { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expr::Not(expr) | Expr::Like { expr, .. } | Expr::Aggregate { expr, .. } => {
                expr.collect_columns(out)
            }
            Expr::Alias { expr, .. } => expr.collect_columns(out),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "{name}"),
            Expr::Literal(Value::Varchar(s)) => write!(f, "'{s}'"),
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::Binary { left, op, right } => write!(f, "({left} {op} {right})"),
            Expr::Not(expr) => write!(f, "NOT {expr}"),
            Expr::Like { expr, pattern } => write!(f, "{expr} LIKE '{pattern}'"),
            Expr::Aggregate { func, expr } => write!(f, "{func}({expr})"),
            Expr::Alias { expr, name } => write!(f, "{expr} AS {name}"),
        }
    }
}

impl ops::Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        self.binary(Operator::Plus, rhs)
    }
}

impl ops::Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        self.binary(Operator::Minus, rhs)
    }
}

impl ops::Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        self.binary(Operator::Multiply, rhs)
    }
}

impl ops::Div for Expr {
    type Output = Expr;

    fn div(self, rhs: Expr) -> Expr {
        self.binary(Operator::Divide, rhs)
    }
}

/// Reference a column by name.
pub fn col(name: impl Into<String>) -> Expr {
    Expr::Column(name.into())
}

/// A literal value.
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Literal(value.into())
}

/// SQL-style LIKE: `%` matches any bytes, `_` exactly one.
pub fn like(expr: Expr, pattern: impl Into<String>) -> Expr {
    Expr::Like {
        expr: Box::new(expr),
        pattern: pattern.into(),
    }
}

fn aggregate(func: AggregateFunction, expr: Expr) -> Expr {
    Expr::Aggregate {
        func,
        expr: Box::new(expr),
    }
}

pub fn count(expr: Expr) -> Expr {
    aggregate(AggregateFunction::Count, expr)
}

pub fn sum(expr: Expr) -> Expr {
    aggregate(AggregateFunction::Sum, expr)
}

pub fn min(expr: Expr) -> Expr {
    aggregate(AggregateFunction::Min, expr)
}

pub fn max(expr: Expr) -> Expr {
    aggregate(AggregateFunction::Max, expr)
}

pub fn avg(expr: Expr) -> Expr {
    aggregate(AggregateFunction::Avg, expr)
}
