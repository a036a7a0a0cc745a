//! Cohort aggregation over in-memory rows.
//!
//! Responsible for loading JSON / JSONL transaction records, bucketing them
//! into cohort-by-period cells, folding the requested metrics and running
//! multi-granularity jobs.

pub mod aggregator;
pub mod analysis;
pub mod pivot;
pub mod reader;

pub use aggregator::{compute_cohort, CohortAggregator};
pub use analysis::{run_job, run_requests, JobMetadata, JobResult};
pub use pivot::{AggregationSummary, CohortRecord, PeriodColumn, ResultTable, RowKey};

pub use cohort_core as core;
