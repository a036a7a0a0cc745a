//! The cohort-by-period pivot produced by [`CohortAggregator`](crate::aggregator::CohortAggregator).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use cohort_core::aggregation::{Accumulator, MetricName, MetricSpec};
use cohort_core::granularity::{CohortKey, Granularity, GranularityPair};
use cohort_core::models::DataIssue;
use cohort_core::request::{CohortRequest, ColumnMode};
use serde::Serialize;

// ── Keys ──────────────────────────────────────────────────────────────────────

/// Pivot row index: which cohort event column, and which cohort bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RowKey {
    pub cohort_event: String,
    pub cohort: CohortKey,
}

impl RowKey {
    pub fn new(cohort_event: impl Into<String>, cohort: CohortKey) -> Self {
        Self {
            cohort_event: cohort_event.into(),
            cohort,
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.cohort_event, self.cohort)
    }
}

/// Pivot column index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum PeriodColumn {
    /// Elapsed periods since the cohort event.
    Offset(i64),
    /// Calendar bucket of the transaction event.
    Calendar(CohortKey),
}

impl fmt::Display for PeriodColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodColumn::Offset(n) => write!(f, "{}", n),
            PeriodColumn::Calendar(key) => write!(f, "{}", key),
        }
    }
}

// ── Cell ──────────────────────────────────────────────────────────────────────

/// Everything accumulated for one (row, period) pair.
#[derive(Debug, Clone, Default)]
pub(crate) struct Cell {
    pub(crate) rows: u64,
    /// One accumulator per metric column, aligned with the request's metrics.
    pub(crate) metrics: Vec<Accumulator>,
}

impl Cell {
    fn with_metrics(n: usize) -> Self {
        Self {
            rows: 0,
            metrics: vec![Accumulator::new(); n],
        }
    }
}

// ── AggregationSummary ────────────────────────────────────────────────────────

/// Row accounting for one aggregation.
///
/// Counts are per (row, cohort event column) evaluation, so a table built
/// from two cohort event columns sees every input row twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregationSummary {
    pub rows_seen: usize,
    pub rows_aggregated: usize,
    /// Rows left out because a cohort or transaction timestamp was null.
    pub rows_null_timestamp: usize,
    /// Rows left out because of a data issue.
    pub rows_rejected: usize,
}

// ── CohortRecord ──────────────────────────────────────────────────────────────

/// Long-format view of one pivot value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortRecord {
    pub cohort_row: String,
    pub cohort_column: PeriodColumn,
    pub cohort_event: String,
    pub row_granularity: Granularity,
    pub col_granularity: Granularity,
    pub metric_name: String,
    pub metric_value: Option<f64>,
    /// Input rows that landed in the cell.
    pub rows: u64,
}

// ── ResultTable ───────────────────────────────────────────────────────────────

/// Cohorts as rows, periods as columns, one value per requested metric.
#[derive(Debug, Clone)]
pub struct ResultTable {
    granularities: GranularityPair,
    column_mode: ColumnMode,
    metrics: Vec<MetricSpec>,
    cells: BTreeMap<RowKey, BTreeMap<PeriodColumn, Cell>>,
    pub(crate) issues: Vec<DataIssue>,
    pub(crate) summary: AggregationSummary,
}

impl ResultTable {
    pub(crate) fn new(request: &CohortRequest) -> Self {
        Self {
            granularities: request.granularities,
            column_mode: request.column_mode,
            metrics: request.metrics.clone(),
            cells: BTreeMap::new(),
            issues: Vec::new(),
            summary: AggregationSummary::default(),
        }
    }

    pub(crate) fn cell_mut(&mut self, row: RowKey, period: PeriodColumn) -> &mut Cell {
        let n = self.metrics.len();
        self.cells
            .entry(row)
            .or_default()
            .entry(period)
            .or_insert_with(|| Cell::with_metrics(n))
    }

    /// `true` when no row was aggregated.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn granularities(&self) -> GranularityPair {
        self.granularities
    }

    pub fn column_mode(&self) -> ColumnMode {
        self.column_mode
    }

    /// Row index, ascending by cohort event name then cohort bucket.
    pub fn row_keys(&self) -> impl Iterator<Item = &RowKey> {
        self.cells.keys()
    }

    /// Every period column present in any row, ascending.
    pub fn periods(&self) -> Vec<PeriodColumn> {
        let set: BTreeSet<PeriodColumn> = self
            .cells
            .values()
            .flat_map(|periods| periods.keys().copied())
            .collect();
        set.into_iter().collect()
    }

    /// Output metric names in request order.
    pub fn metric_names(&self) -> Vec<MetricName> {
        self.metrics.iter().flat_map(|m| m.names()).collect()
    }

    /// Aggregated value of one cell, or `None` when the cell is empty or the
    /// metric was not requested.
    pub fn value(&self, row: &RowKey, period: &PeriodColumn, metric: &MetricName) -> Option<f64> {
        let idx = self.metrics.iter().position(|m| {
            m.column == metric.column && m.functions.contains(&metric.func)
        })?;
        let cell = self.cells.get(row)?.get(period)?;
        cell.metrics.get(idx)?.finish(metric.func)
    }

    /// Look a value up by its printed labels, e.g.
    /// `get("month_subscribed", "2020-01", "2", "client_life_mean")`.
    pub fn get(
        &self,
        cohort_event: &str,
        cohort_label: &str,
        period_label: &str,
        metric_label: &str,
    ) -> Option<f64> {
        let row = self
            .cells
            .keys()
            .find(|k| k.cohort_event == cohort_event && k.cohort.label() == cohort_label)?;
        let period = self
            .cells
            .get(row)?
            .keys()
            .find(|p| p.to_string() == period_label)?;
        let metric = self
            .metric_names()
            .into_iter()
            .find(|m| m.to_string() == metric_label)?;
        self.value(row, period, &metric)
    }

    /// Number of input rows that landed in a cell.
    pub fn row_count(&self, row: &RowKey, period: &PeriodColumn) -> u64 {
        self.cells
            .get(row)
            .and_then(|periods| periods.get(period))
            .map_or(0, |cell| cell.rows)
    }

    /// Number of input rows in a cohort across all periods.
    pub fn cohort_size(&self, row: &RowKey) -> u64 {
        self.cells
            .get(row)
            .map_or(0, |periods| periods.values().map(|c| c.rows).sum())
    }

    /// Flatten into one record per (row, period, metric), in index order.
    pub fn records(&self) -> Vec<CohortRecord> {
        let names = self.metric_names();
        let mut out = Vec::new();
        for (row, periods) in &self.cells {
            let cohort_row = row.cohort.label();
            for (period, cell) in periods {
                for name in &names {
                    out.push(CohortRecord {
                        cohort_row: cohort_row.clone(),
                        cohort_column: *period,
                        cohort_event: row.cohort_event.clone(),
                        row_granularity: self.granularities.row,
                        col_granularity: self.granularities.column,
                        metric_name: name.to_string(),
                        metric_value: self.value(row, period, name),
                        rows: cell.rows,
                    });
                }
            }
        }
        out
    }

    /// Data issues recorded under the skip policy.
    pub fn issues(&self) -> &[DataIssue] {
        &self.issues
    }

    pub fn summary(&self) -> &AggregationSummary {
        &self.summary
    }
}
