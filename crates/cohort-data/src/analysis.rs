//! Job pipeline: evaluate every granularity pair of a job over one table.

use chrono::Utc;
use cohort_core::error::Result;
use cohort_core::models::Row;
use cohort_core::request::CohortRequest;
use cohort_core::settings::JobConfig;
use tracing::info;

use crate::aggregator::CohortAggregator;
use crate::pivot::{CohortRecord, ResultTable};

// ── Public types ──────────────────────────────────────────────────────────────

/// Metadata produced alongside a job result.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct JobMetadata {
    /// ISO-8601 timestamp when this result was generated.
    pub generated_at: String,
    /// Number of input rows.
    pub rows_in: usize,
    /// Number of result tables (one per granularity pair).
    pub tables: usize,
    /// Total long-format records across all tables.
    pub records: usize,
    /// Total data issues across all tables.
    pub issues: usize,
    /// Wall-clock seconds spent aggregating.
    pub elapsed_seconds: f64,
}

/// The complete output of [`run_job`].
#[derive(Debug, Clone)]
pub struct JobResult {
    /// One table per granularity pair, in job order.
    pub tables: Vec<ResultTable>,
    pub metadata: JobMetadata,
}

impl JobResult {
    /// Long-format records of every table, concatenated in job order.
    pub fn records(&self) -> Vec<CohortRecord> {
        self.tables.iter().flat_map(|t| t.records()).collect()
    }

    /// `true` when no table holds any cell.
    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(ResultTable::is_empty)
    }
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Run a job described by a [`JobConfig`].
pub fn run_job(rows: &[Row], job: &JobConfig) -> Result<JobResult> {
    run_requests(rows, job.requests()?)
}

/// Run already-validated requests, one table per request.
pub fn run_requests(rows: &[Row], requests: Vec<CohortRequest>) -> Result<JobResult> {
    let start = std::time::Instant::now();

    let mut tables = Vec::with_capacity(requests.len());
    for request in requests {
        tables.push(CohortAggregator::new(request)?.aggregate(rows)?);
    }

    let metadata = JobMetadata {
        generated_at: Utc::now().to_rfc3339(),
        rows_in: rows.len(),
        tables: tables.len(),
        records: tables.iter().map(|t| t.records().len()).sum(),
        issues: tables.iter().map(|t| t.issues().len()).sum(),
        elapsed_seconds: start.elapsed().as_secs_f64(),
    };

    info!(
        "Cohort job: {} rows → {} tables, {} records, {} issues",
        metadata.rows_in, metadata.tables, metadata.records, metadata.issues
    );

    Ok(JobResult { tables, metadata })
}
