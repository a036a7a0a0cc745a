//! Domain types for cohort KPI computation.
//!
//! Rows and values, time granularities and buckets, aggregation functions,
//! validated request parameters, timestamp parsing and the CLI/job
//! configuration shared by the data and binary crates.

pub mod aggregation;
pub mod error;
pub mod formatting;
pub mod granularity;
pub mod models;
pub mod request;
pub mod settings;
pub mod time_utils;

pub use aggregation::{Accumulator, AggFunc, MetricName, MetricSpec};
pub use error::{CohortError, Result};
pub use granularity::{CohortKey, Granularity, GranularityPair};
pub use models::{DataIssue, FieldError, IssueKind, Row, Value};
pub use request::{CohortRequest, ColumnMode, IssuePolicy};
