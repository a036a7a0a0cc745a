//! Cohort aggregation: bucket rows by cohort and elapsed period, then fold
//! every requested metric into the matching pivot cell.

use cohort_core::error::{CohortError, Result};
use cohort_core::granularity::CohortKey;
use cohort_core::models::{DataIssue, IssueKind, Row};
use cohort_core::request::{CohortRequest, ColumnMode, IssuePolicy};
use tracing::{debug, warn};

use crate::pivot::{PeriodColumn, ResultTable, RowKey};

// ── CohortAggregator ──────────────────────────────────────────────────────────

/// Stateless transform from a flat table of rows into a [`ResultTable`].
#[derive(Debug, Clone)]
pub struct CohortAggregator {
    request: CohortRequest,
}

impl CohortAggregator {
    /// Wrap a request, re-running its structural validation.
    pub fn new(request: CohortRequest) -> Result<Self> {
        request.validate()?;
        Ok(Self { request })
    }

    pub fn request(&self) -> &CohortRequest {
        &self.request
    }

    /// Aggregate `rows` for every cohort event column of the request.
    ///
    /// Rows with a null cohort or transaction timestamp are left out and
    /// counted. Rows with a missing or mistyped field, or whose transaction
    /// falls in an earlier column period than the cohort event, are handled
    /// according to the request's [`IssuePolicy`].
    pub fn aggregate(&self, rows: &[Row]) -> Result<ResultTable> {
        let mut table = ResultTable::new(&self.request);
        let mut pending: Vec<DataIssue> = Vec::new();

        for event in &self.request.cohort_columns {
            for (index, row) in rows.iter().enumerate() {
                table.summary.rows_seen += 1;

                let (row_key, period) = match self.place(index, row, event) {
                    Ok(Some(placed)) => placed,
                    Ok(None) => {
                        table.summary.rows_null_timestamp += 1;
                        continue;
                    }
                    Err(issue) => {
                        self.handle_issue(&mut table, issue)?;
                        table.summary.rows_rejected += 1;
                        continue;
                    }
                };

                let cell = table.cell_mut(row_key, period);
                cell.rows += 1;
                for (acc, spec) in cell.metrics.iter_mut().zip(&self.request.metrics) {
                    match row.number(&spec.column) {
                        Ok(Some(v)) => acc.push(v),
                        Ok(None) => {}
                        Err(e) => pending.push(DataIssue::from_field(index, event, &spec.column, e)),
                    }
                }
                for issue in pending.drain(..) {
                    self.handle_issue(&mut table, issue)?;
                }

                table.summary.rows_aggregated += 1;
            }
        }

        debug!(
            "Aggregated {} of {} rows into {} cohorts ({}, {} columns)",
            table.summary.rows_aggregated,
            table.summary.rows_seen,
            table.row_keys().count(),
            self.request.granularities,
            table.periods().len()
        );
        if !table.issues().is_empty() {
            warn!(
                "{} data issues recorded while aggregating {} ({} rows rejected)",
                table.issues().len(),
                self.request.granularities,
                table.summary.rows_rejected
            );
        }

        Ok(table)
    }

    // ── Private ───────────────────────────────────────────────────────────────

    /// Locate the pivot cell for one row under one cohort event column.
    ///
    /// `Ok(None)` means a timestamp is null.
    fn place(
        &self,
        index: usize,
        row: &Row,
        event: &str,
    ) -> std::result::Result<Option<(RowKey, PeriodColumn)>, DataIssue> {
        let transaction_col = self.request.transaction_column.as_str();

        let cohort_ts = row
            .timestamp(event)
            .map_err(|e| DataIssue::from_field(index, event, event, e))?;
        let transaction_ts = row
            .timestamp(transaction_col)
            .map_err(|e| DataIssue::from_field(index, event, transaction_col, e))?;

        let (Some(cohort_ts), Some(transaction_ts)) = (cohort_ts, transaction_ts) else {
            return Ok(None);
        };

        let pair = self.request.granularities;
        let cohort_date = cohort_ts.date();
        let transaction_date = transaction_ts.date();

        let offset = pair.column.periods_between(cohort_date, transaction_date);
        if offset < 0 {
            return Err(DataIssue {
                row_index: index,
                cohort_event: event.to_string(),
                kind: IssueKind::NegativeOffset { offset },
            });
        }

        let period = match self.request.column_mode {
            ColumnMode::Offset => PeriodColumn::Offset(offset),
            ColumnMode::Calendar => {
                PeriodColumn::Calendar(CohortKey::new(pair.column, transaction_date))
            }
        };
        let row_key = RowKey::new(event, CohortKey::new(pair.row, cohort_date));

        Ok(Some((row_key, period)))
    }

    fn handle_issue(&self, table: &mut ResultTable, issue: DataIssue) -> Result<()> {
        match self.request.issue_policy {
            IssuePolicy::Skip => {
                debug!("Skipping: {}", issue);
                table.issues.push(issue);
                Ok(())
            }
            IssuePolicy::Fail => Err(CohortError::Data(issue)),
        }
    }
}

// ── Public function ───────────────────────────────────────────────────────────

/// Build a request from plain names and aggregate `rows` in one call.
///
/// ```
/// use chrono::NaiveDate;
/// use cohort_core::models::Row;
/// use cohort_data::compute_cohort;
///
/// let day = |m| NaiveDate::from_ymd_opt(2020, m, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let rows = vec![
///     Row::new().with("start", day(1)).with("end", day(3)).with("life", 2.0),
///     Row::new().with("start", day(1)).with("end", day(4)).with("life", 3.0),
/// ];
/// let table = compute_cohort(
///     &rows,
///     &["start"],
///     "end",
///     vec![("life", vec!["mean"])],
///     ("monthly", "monthly"),
/// )
/// .unwrap();
/// assert_eq!(table.get("start", "2020-01", "2", "life_mean"), Some(2.0));
/// assert_eq!(table.get("start", "2020-01", "3", "life_mean"), Some(3.0));
/// ```
pub fn compute_cohort<C, K, F>(
    rows: &[Row],
    cohort_cols: &[C],
    transaction_col: &str,
    metrics: impl IntoIterator<Item = (K, Vec<F>)>,
    granularities: (&str, &str),
) -> Result<ResultTable>
where
    C: AsRef<str>,
    K: AsRef<str>,
    F: AsRef<str>,
{
    let request = CohortRequest::parse(cohort_cols, transaction_col, metrics, granularities)?;
    CohortAggregator::new(request)?.aggregate(rows)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
