//! Aggregation functions and the running accumulator behind every pivot cell.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::CohortError;

// ── AggFunc ───────────────────────────────────────────────────────────────────

/// Order-independent aggregation applied to a metric within one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AggFunc {
    Mean,
    Sum,
    Count,
    Min,
    Max,
}

impl AggFunc {
    pub fn as_str(self) -> &'static str {
        match self {
            AggFunc::Mean => "mean",
            AggFunc::Sum => "sum",
            AggFunc::Count => "count",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
        }
    }
}

impl fmt::Display for AggFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggFunc {
    type Err = CohortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mean" | "avg" => Ok(AggFunc::Mean),
            "sum" => Ok(AggFunc::Sum),
            "count" => Ok(AggFunc::Count),
            "min" => Ok(AggFunc::Min),
            "max" => Ok(AggFunc::Max),
            _ => Err(CohortError::UnknownAggregation(s.to_string())),
        }
    }
}

// ── Accumulator ───────────────────────────────────────────────────────────────

/// Running count / sum / min / max over the non-null values of one metric.
///
/// Every [`AggFunc`] can be finished from this state, and two accumulators
/// merge into the same state as accumulating both inputs in one pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Accumulator {
    count: u64,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one non-null value.
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    /// Fold another accumulator into this one.
    pub fn merge(&mut self, other: &Accumulator) {
        self.count += other.count;
        self.sum += other.sum;
        self.min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    /// Number of non-null values seen.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Final value for `func`.
    ///
    /// With no values: `Sum` and `Count` yield `0`, the others yield `None`.
    pub fn finish(&self, func: AggFunc) -> Option<f64> {
        match func {
            AggFunc::Sum => Some(self.sum),
            AggFunc::Count => Some(self.count as f64),
            AggFunc::Mean if self.count == 0 => None,
            AggFunc::Mean => Some(self.sum / self.count as f64),
            AggFunc::Min => self.min,
            AggFunc::Max => self.max,
        }
    }
}

impl Extend<f64> for Accumulator {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for v in iter {
            self.push(v);
        }
    }
}

// ── MetricSpec / MetricName ───────────────────────────────────────────────────

/// A metric column together with the functions to apply to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSpec {
    pub column: String,
    pub functions: Vec<AggFunc>,
}

impl MetricSpec {
    /// Parse function names for `column`.
    ///
    /// Fails on an unknown function name or an empty list. Duplicates are
    /// dropped, keeping the first occurrence.
    pub fn parse<S: AsRef<str>>(column: &str, functions: &[S]) -> Result<Self, CohortError> {
        if column.trim().is_empty() {
            return Err(CohortError::Config("metric column name is empty".into()));
        }
        if functions.is_empty() {
            return Err(CohortError::Config(format!(
                "metric '{}' has no aggregation functions",
                column
            )));
        }
        let mut parsed: Vec<AggFunc> = Vec::with_capacity(functions.len());
        for name in functions {
            let func: AggFunc = name.as_ref().parse()?;
            if !parsed.contains(&func) {
                parsed.push(func);
            }
        }
        Ok(Self {
            column: column.to_string(),
            functions: parsed,
        })
    }

    /// Output names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = MetricName> + '_ {
        self.functions.iter().map(move |&func| MetricName {
            column: self.column.clone(),
            func,
        })
    }
}

/// A pivot column's metric part, displayed as `"{column}_{func}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricName {
    pub column: String,
    pub func: AggFunc,
}

impl MetricName {
    pub fn new(column: impl Into<String>, func: AggFunc) -> Self {
        Self {
            column: column.into(),
            func,
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.column, self.func)
    }
}

impl Serialize for MetricName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
