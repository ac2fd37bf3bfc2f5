//! Parsed query expressions tagged with their evaluation type.

use promql_parser::parser::value::ValueType;
use promql_parser::parser::{self, Expr};

use crate::error::{QueryError, Result};

/// The type an expression evaluates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprType {
    Scalar,
    Vector,
    Matrix,
    String,
}

impl ExprType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExprType::Scalar => "scalar",
            ExprType::Vector => "vector",
            ExprType::Matrix => "matrix",
            ExprType::String => "string",
        }
    }
}

impl From<ValueType> for ExprType {
    fn from(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Scalar => ExprType::Scalar,
            ValueType::Vector => ExprType::Vector,
            ValueType::Matrix => ExprType::Matrix,
            ValueType::String => ExprType::String,
        }
    }
}

/// An expression known to evaluate to an instant vector.
///
/// Only obtainable through [`Expression::into_vector`], so holding one is
/// proof the range evaluator can step over it.
#[derive(Debug, Clone)]
pub struct VectorExpr(Expr);

impl VectorExpr {
    pub fn expr(&self) -> &Expr {
        &self.0
    }
}

/// A parsed query expression.
#[derive(Debug, Clone)]
pub enum Expression {
    Scalar(Expr),
    Vector(VectorExpr),
    Matrix(Expr),
    String(Expr),
}

impl Expression {
    /// Parses query text and classifies it by evaluation type.
    pub fn parse(text: &str) -> Result<Self> {
        let expr = parser::parse(text).map_err(QueryError::Parse)?;
        Ok(match ExprType::from(expr.value_type()) {
            ExprType::Scalar => Expression::Scalar(expr),
            ExprType::Vector => Expression::Vector(VectorExpr(expr)),
            ExprType::Matrix => Expression::Matrix(expr),
            ExprType::String => Expression::String(expr),
        })
    }

    pub fn expr_type(&self) -> ExprType {
        match self {
            Expression::Scalar(_) => ExprType::Scalar,
            Expression::Vector(_) => ExprType::Vector,
            Expression::Matrix(_) => ExprType::Matrix,
            Expression::String(_) => ExprType::String,
        }
    }

    pub fn expr(&self) -> &Expr {
        match self {
            Expression::Vector(v) => v.expr(),
            Expression::Scalar(e) | Expression::Matrix(e) | Expression::String(e) => e,
        }
    }

    /// Narrows to a vector expression, failing with the canonical type error.
    pub fn into_vector(self) -> Result<VectorExpr> {
        match self {
            Expression::Vector(v) => Ok(v),
            _ => Err(QueryError::not_vector()),
        }
    }
}
