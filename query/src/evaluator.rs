//! Expression evaluation.
//!
//! [`Evaluator`] is the seam the query service evaluates through.
//! [`MemoryEvaluator`] is a reference implementation over a [`SeriesReader`]
//! covering selectors, scalar/vector arithmetic and comparison, and the
//! basic aggregations.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use promql_parser::parser::token::{
    T_ADD, T_AVG, T_COUNT, T_DIV, T_EQLC, T_GTE, T_GTR, T_LSS, T_LTE, T_MAX, T_MIN, T_MOD, T_MUL,
    T_NEQ, T_POW, T_SUB, T_SUM, TokenType,
};
use promql_parser::parser::{AggregateExpr, BinaryExpr, Expr, LabelModifier, VectorSelector};

use crate::clock::unix_millis;
use crate::error::{QueryError, Result};
use crate::expr::{Expression, VectorExpr};
use crate::model::{InstantSample, Labels, Matrix, QueryValue, RangeSample};
use crate::storage::SeriesReader;

/// Default lookback window for instant vector selectors.
pub const DEFAULT_LOOKBACK_DELTA: Duration = Duration::from_secs(5 * 60);

/// Evaluates parsed expressions.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Evaluates `expr` at a single instant.
    async fn eval_instant(&self, expr: &Expression, at: SystemTime) -> Result<QueryValue>;

    /// Evaluates a vector expression at every `step` in `[start, end]`,
    /// both ends inclusive. Series order in the result is unspecified.
    async fn eval_vector_range(
        &self,
        expr: &VectorExpr,
        start: SystemTime,
        end: SystemTime,
        step: Duration,
    ) -> Result<Matrix>;
}

/// Intermediate result of evaluating a sub-expression.
#[derive(Debug)]
enum EvalValue {
    Scalar(f64),
    Vector(Vec<InstantSample>),
    Matrix(Vec<RangeSample>),
    String(String),
}

fn unsupported(what: impl std::fmt::Display) -> QueryError {
    QueryError::Execution(format!("unsupported expression: {}", what))
}

/// Reference evaluator over an in-process [`SeriesReader`].
pub struct MemoryEvaluator<R: SeriesReader> {
    reader: Arc<R>,
    lookback_delta: Duration,
}

impl<R: SeriesReader> MemoryEvaluator<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            reader,
            lookback_delta: DEFAULT_LOOKBACK_DELTA,
        }
    }

    pub fn with_lookback_delta(mut self, lookback_delta: Duration) -> Self {
        self.lookback_delta = lookback_delta;
        self
    }

    // this call recurses to evaluate sub-expressions, so it needs to return a boxed future
    fn evaluate_expr<'a>(
        &'a self,
        expr: &'a Expr,
        ts_ms: i64,
    ) -> Pin<Box<dyn Future<Output = Result<EvalValue>> + Send + 'a>> {
        Box::pin(async move {
            match expr {
                Expr::NumberLiteral(l) => Ok(EvalValue::Scalar(l.val)),
                Expr::StringLiteral(l) => Ok(EvalValue::String(l.val.clone())),
                Expr::Paren(p) => self.evaluate_expr(&p.expr, ts_ms).await,
                Expr::Unary(u) => match self.evaluate_expr(&u.expr, ts_ms).await? {
                    EvalValue::Scalar(v) => Ok(EvalValue::Scalar(-v)),
                    EvalValue::Vector(samples) => Ok(EvalValue::Vector(
                        samples
                            .into_iter()
                            .map(|s| InstantSample {
                                labels: s.labels.without_metric_name(),
                                timestamp_ms: s.timestamp_ms,
                                value: -s.value,
                            })
                            .collect(),
                    )),
                    _ => Err(unsupported("unary minus on a range vector or string")),
                },
                Expr::VectorSelector(vs) => self.evaluate_vector_selector(vs, ts_ms).await,
                Expr::MatrixSelector(ms) => {
                    check_no_modifiers(&ms.vs)?;
                    let range_ms = ms.range.as_millis() as i64;
                    let series = self
                        .reader
                        .select(&ms.vs, ts_ms.saturating_sub(range_ms), ts_ms)
                        .await?;
                    Ok(EvalValue::Matrix(series))
                }
                Expr::Binary(b) => self.evaluate_binary_expr(b, ts_ms).await,
                Expr::Aggregate(agg) => self.evaluate_aggregate(agg, ts_ms).await,
                Expr::Call(call) => Err(unsupported(format!("function {}()", call.func.name))),
                Expr::Subquery(_) => Err(unsupported("subquery")),
                Expr::Extension(_) => Err(unsupported("extension")),
            }
        })
    }

    async fn evaluate_vector_selector(
        &self,
        selector: &VectorSelector,
        ts_ms: i64,
    ) -> Result<EvalValue> {
        check_no_modifiers(selector)?;
        let lookback_ms = self.lookback_delta.as_millis() as i64;
        let series = self
            .reader
            .select(selector, ts_ms.saturating_sub(lookback_ms), ts_ms)
            .await?;
        let samples = series
            .into_iter()
            .filter_map(|rs| {
                rs.samples.last().map(|&(_, value)| InstantSample {
                    labels: rs.labels,
                    timestamp_ms: ts_ms,
                    value,
                })
            })
            .collect();
        Ok(EvalValue::Vector(samples))
    }

    async fn evaluate_binary_expr(&self, expr: &BinaryExpr, ts_ms: i64) -> Result<EvalValue> {
        let left = self.evaluate_expr(&expr.lhs, ts_ms).await?;
        let right = self.evaluate_expr(&expr.rhs, ts_ms).await?;
        let op = expr.op;
        let comparison = is_comparison(op);
        let return_bool = expr.return_bool();

        let apply_to_vector = |samples: Vec<InstantSample>,
                               scalar: f64,
                               scalar_on_left: bool|
         -> Result<EvalValue> {
            let mut result = Vec::with_capacity(samples.len());
            for sample in samples {
                let value = if scalar_on_left {
                    apply_binary_op(op, scalar, sample.value)?
                } else {
                    apply_binary_op(op, sample.value, scalar)?
                };
                if comparison && !return_bool {
                    // Filtering comparison keeps the original sample.
                    if value != 0.0 {
                        result.push(sample);
                    }
                    continue;
                }
                result.push(InstantSample {
                    labels: sample.labels.without_metric_name(),
                    timestamp_ms: sample.timestamp_ms,
                    value,
                });
            }
            Ok(EvalValue::Vector(result))
        };

        match (left, right) {
            (EvalValue::Scalar(l), EvalValue::Scalar(r)) => {
                Ok(EvalValue::Scalar(apply_binary_op(op, l, r)?))
            }
            (EvalValue::Vector(v), EvalValue::Scalar(s)) => apply_to_vector(v, s, false),
            (EvalValue::Scalar(s), EvalValue::Vector(v)) => apply_to_vector(v, s, true),
            (EvalValue::Vector(_), EvalValue::Vector(_)) => {
                Err(unsupported("binary operation between two vectors"))
            }
            _ => Err(unsupported(format!("operands of binary operator {:?}", op))),
        }
    }

    async fn evaluate_aggregate(&self, aggregate: &AggregateExpr, ts_ms: i64) -> Result<EvalValue> {
        let samples = match self.evaluate_expr(&aggregate.expr, ts_ms).await? {
            EvalValue::Vector(samples) => samples,
            _ => {
                return Err(QueryError::Execution(
                    "aggregations require an instant vector".to_string(),
                ));
            }
        };

        let mut groups: HashMap<Labels, Vec<f64>> = HashMap::new();
        for sample in samples {
            let key = grouping_labels(sample.labels, aggregate.modifier.as_ref());
            groups.entry(key).or_default().push(sample.value);
        }

        let mut result = Vec::with_capacity(groups.len());
        for (labels, values) in groups {
            let value = match aggregate.op.id() {
                T_SUM => values.iter().sum(),
                T_AVG => values.iter().sum::<f64>() / values.len() as f64,
                T_MIN => values.iter().fold(f64::INFINITY, |a, &b| f64::min(a, b)),
                T_MAX => values.iter().fold(f64::NEG_INFINITY, |a, &b| f64::max(a, b)),
                T_COUNT => values.len() as f64,
                _ => return Err(unsupported(format!("aggregation {:?}", aggregate.op))),
            };
            result.push(InstantSample {
                labels,
                timestamp_ms: ts_ms,
                value,
            });
        }
        Ok(EvalValue::Vector(result))
    }
}

fn check_no_modifiers(selector: &VectorSelector) -> Result<()> {
    if selector.offset.is_some() || selector.at.is_some() {
        return Err(unsupported("offset and @ modifiers"));
    }
    Ok(())
}

fn is_comparison(op: TokenType) -> bool {
    matches!(op.id(), T_EQLC | T_NEQ | T_LSS | T_GTR | T_LTE | T_GTE)
}

fn apply_binary_op(op: TokenType, left: f64, right: f64) -> Result<f64> {
    let as_f64 = |b: bool| if b { 1.0 } else { 0.0 };
    match op.id() {
        T_ADD => Ok(left + right),
        T_SUB => Ok(left - right),
        T_MUL => Ok(left * right),
        T_DIV => Ok(left / right),
        T_MOD => Ok(left % right),
        T_POW => Ok(left.powf(right)),
        T_EQLC => Ok(as_f64(left == right)),
        T_NEQ => Ok(as_f64(left != right)),
        T_LSS => Ok(as_f64(left < right)),
        T_GTR => Ok(as_f64(left > right)),
        T_LTE => Ok(as_f64(left <= right)),
        T_GTE => Ok(as_f64(left >= right)),
        _ => Err(unsupported(format!("binary operator {:?}", op))),
    }
}

/// Aggregation without a modifier collapses everything into one group;
/// the metric name never survives aggregation.
fn grouping_labels(labels: Labels, modifier: Option<&LabelModifier>) -> Labels {
    match modifier {
        None => Labels::default(),
        Some(LabelModifier::Include(keep)) => {
            labels.retain(|name| keep.labels.iter().any(|l| l == name))
        }
        Some(LabelModifier::Exclude(drop)) => labels
            .without_metric_name()
            .retain(|name| !drop.labels.iter().any(|l| l == name)),
    }
}

#[async_trait]
impl<R: SeriesReader + 'static> Evaluator for MemoryEvaluator<R> {
    async fn eval_instant(&self, expr: &Expression, at: SystemTime) -> Result<QueryValue> {
        let ts_ms = unix_millis(at);
        Ok(match self.evaluate_expr(expr.expr(), ts_ms).await? {
            EvalValue::Scalar(value) => QueryValue::Scalar {
                timestamp_ms: ts_ms,
                value,
            },
            EvalValue::Vector(samples) => QueryValue::Vector(samples),
            EvalValue::Matrix(series) => QueryValue::Matrix(Matrix(series)),
            EvalValue::String(value) => QueryValue::String {
                timestamp_ms: ts_ms,
                value,
            },
        })
    }

    async fn eval_vector_range(
        &self,
        expr: &VectorExpr,
        start: SystemTime,
        end: SystemTime,
        step: Duration,
    ) -> Result<Matrix> {
        let start_ms = unix_millis(start);
        let end_ms = unix_millis(end);
        let step_ms = (step.as_millis() as i64).max(1);

        let mut series_map: HashMap<Labels, Vec<(i64, f64)>> = HashMap::new();
        let mut ts_ms = start_ms;
        let mut steps = 0usize;
        while ts_ms <= end_ms {
            match self.evaluate_expr(expr.expr(), ts_ms).await? {
                EvalValue::Vector(samples) => {
                    for sample in samples {
                        series_map
                            .entry(sample.labels)
                            .or_default()
                            .push((sample.timestamp_ms, sample.value));
                    }
                }
                EvalValue::Scalar(value) => {
                    series_map
                        .entry(Labels::default())
                        .or_default()
                        .push((ts_ms, value));
                }
                _ => {
                    return Err(QueryError::Execution(
                        "range evaluation produced a non-instant value".to_string(),
                    ));
                }
            }
            steps += 1;
            ts_ms = match ts_ms.checked_add(step_ms) {
                Some(next) => next,
                None => break,
            };
        }
        tracing::debug!(steps, series = series_map.len(), "evaluated vector range");

        Ok(Matrix(
            series_map
                .into_iter()
                .map(|(labels, samples)| RangeSample { labels, samples })
                .collect(),
        ))
    }
}
