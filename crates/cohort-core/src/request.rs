//! Validated description of one cohort computation.

use serde::{Deserialize, Serialize};

use crate::aggregation::{MetricName, MetricSpec};
use crate::error::{CohortError, Result};
use crate::granularity::GranularityPair;

/// How the pivot's period columns are keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnMode {
    /// Elapsed column-granularity periods since the cohort event.
    #[default]
    Offset,
    /// The transaction's own bucket under the column granularity.
    Calendar,
}

/// What to do with a row that fails a data-quality check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssuePolicy {
    /// Leave the row (or the bad metric value) out and record the issue.
    #[default]
    Skip,
    /// Abort with [`CohortError::Data`] on the first issue.
    Fail,
}

/// Typed, validated parameters for one cohort aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortRequest {
    pub cohort_columns: Vec<String>,
    pub transaction_column: String,
    pub metrics: Vec<MetricSpec>,
    pub granularities: GranularityPair,
    pub column_mode: ColumnMode,
    pub issue_policy: IssuePolicy,
}

impl CohortRequest {
    /// Build a request from the string names a caller would write by hand.
    ///
    /// Unknown granularity or aggregation names, and empty column lists,
    /// are reported as configuration errors.
    pub fn parse<C, K, F>(
        cohort_columns: &[C],
        transaction_column: &str,
        metrics: impl IntoIterator<Item = (K, Vec<F>)>,
        granularities: (&str, &str),
    ) -> Result<Self>
    where
        C: AsRef<str>,
        K: AsRef<str>,
        F: AsRef<str>,
    {
        let granularities = GranularityPair::parse(granularities.0, granularities.1)?;

        let mut specs: Vec<MetricSpec> = Vec::new();
        for (column, functions) in metrics {
            let spec = MetricSpec::parse(column.as_ref(), &functions[..])?;
            if specs.iter().any(|s| s.column == spec.column) {
                return Err(CohortError::Config(format!(
                    "metric column '{}' listed more than once",
                    spec.column
                )));
            }
            specs.push(spec);
        }

        let request = Self {
            cohort_columns: cohort_columns
                .iter()
                .map(|c| c.as_ref().to_string())
                .collect(),
            transaction_column: transaction_column.to_string(),
            metrics: specs,
            granularities,
            column_mode: ColumnMode::default(),
            issue_policy: IssuePolicy::default(),
        };
        request.validate()?;
        Ok(request)
    }

    pub fn with_column_mode(mut self, mode: ColumnMode) -> Self {
        self.column_mode = mode;
        self
    }

    pub fn with_issue_policy(mut self, policy: IssuePolicy) -> Self {
        self.issue_policy = policy;
        self
    }

    /// Structural checks that do not depend on the data.
    pub fn validate(&self) -> Result<()> {
        if self.cohort_columns.is_empty() {
            return Err(CohortError::Config("no cohort event columns given".into()));
        }
        if let Some(blank) = self.cohort_columns.iter().find(|c| c.trim().is_empty()) {
            return Err(CohortError::Config(format!(
                "invalid cohort event column name '{}'",
                blank
            )));
        }
        if self.transaction_column.trim().is_empty() {
            return Err(CohortError::Config(
                "transaction event column is empty".into(),
            ));
        }
        if self.metrics.is_empty() {
            return Err(CohortError::Config("no metrics requested".into()));
        }
        Ok(())
    }

    /// Every output metric name, in declaration order.
    pub fn metric_names(&self) -> Vec<MetricName> {
        self.metrics.iter().flat_map(|m| m.names()).collect()
    }
}
