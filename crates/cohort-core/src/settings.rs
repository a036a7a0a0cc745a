use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CohortError, Result};
use crate::request::{CohortRequest, ColumnMode, IssuePolicy};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Cohort KPI tables from JSON / JSONL transaction records
#[derive(Parser, Debug, Clone)]
#[command(
    name = "cohort-kpi",
    about = "Cohort KPI tables from JSON / JSONL transaction records",
    version
)]
pub struct Settings {
    /// Input file or directory (.jsonl, .ndjson, .json)
    #[arg(long)]
    pub input: PathBuf,

    /// JSON job file; command-line values override its fields
    #[arg(long)]
    pub job: Option<PathBuf>,

    /// Cohort event column (repeatable)
    #[arg(long = "cohort-col")]
    pub cohort_cols: Vec<String>,

    /// Transaction event column
    #[arg(long)]
    pub transaction_col: Option<String>,

    /// Metric and functions as `column:fn[,fn...]` (repeatable)
    #[arg(long = "metric")]
    pub metrics: Vec<String>,

    /// Granularity pair as `row:column` (repeatable, default monthly:monthly)
    #[arg(long = "granularity")]
    pub granularities: Vec<String>,

    /// Key period columns by calendar bucket instead of elapsed offset
    #[arg(long)]
    pub calendar_columns: bool,

    /// Fail on the first data issue instead of skipping the row
    #[arg(long)]
    pub strict: bool,

    /// Timezone used to bucket timestamps
    #[arg(long, default_value = "UTC")]
    pub timezone: String,

    /// Output format
    #[arg(long, default_value = "table", value_parser = ["table", "json", "jsonl"])]
    pub format: String,

    /// Decimal places in table output
    #[arg(long, default_value = "2", value_parser = clap::value_parser!(u32).range(0..=10))]
    pub decimals: u32,

    /// Logging level
    #[arg(long, default_value = "WARNING", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Settings {
    /// Parse CLI arguments and apply the `--debug` flag.
    pub fn load() -> Self {
        Self::load_from_args(std::env::args_os())
    }

    /// Same as [`Settings::load`] with an explicit argument list.
    pub fn load_from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut settings = Settings::parse_from(args);
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Merge the job file (if any) with command-line values and validate.
    pub fn job_config(&self) -> Result<JobConfig> {
        let mut job = match &self.job {
            Some(path) => JobConfig::load_from(path)?,
            None => JobConfig::default(),
        };

        if !self.cohort_cols.is_empty() {
            job.cohort_event_cols = self.cohort_cols.clone();
        }
        if let Some(col) = &self.transaction_col {
            job.transaction_event_col = col.clone();
        }
        if !self.metrics.is_empty() {
            job.metrics = self
                .metrics
                .iter()
                .map(|m| parse_metric_arg(m))
                .collect::<Result<_>>()?;
        }
        if !self.granularities.is_empty() {
            job.row_col_granularities = self
                .granularities
                .iter()
                .map(|g| parse_granularity_arg(g))
                .collect::<Result<_>>()?;
        }
        if self.calendar_columns {
            job.calendar_columns = true;
        }
        if self.strict {
            job.strict = true;
        }

        job.requests()?;
        Ok(job)
    }
}

// ── JobConfig ─────────────────────────────────────────────────────────────────

/// A complete cohort job as stored in a JSON job file.
///
/// ```json
/// {
///   "cohort_event_cols": ["month_subscribed"],
///   "transaction_event_col": "unsubscribed_at",
///   "metrics": {"client_life": ["mean"]},
///   "row_col_granularities": [["monthly", "monthly"]]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    #[serde(default)]
    pub cohort_event_cols: Vec<String>,
    #[serde(default)]
    pub transaction_event_col: String,
    /// Metric column → function names, in document order.
    #[serde(default, with = "ordered_metrics")]
    pub metrics: Vec<(String, Vec<String>)>,
    /// `(row, column)` granularity names; empty means monthly/monthly.
    #[serde(default)]
    pub row_col_granularities: Vec<(String, String)>,
    #[serde(default, alias = "use_months")]
    pub calendar_columns: bool,
    #[serde(default)]
    pub strict: bool,
}

impl JobConfig {
    /// Read and parse a job file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CohortError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Granularity pairs to evaluate, defaulting to monthly/monthly.
    pub fn granularity_pairs(&self) -> Vec<(String, String)> {
        if self.row_col_granularities.is_empty() {
            vec![("monthly".to_string(), "monthly".to_string())]
        } else {
            self.row_col_granularities.clone()
        }
    }

    /// One validated request per granularity pair.
    pub fn requests(&self) -> Result<Vec<CohortRequest>> {
        let mode = if self.calendar_columns {
            ColumnMode::Calendar
        } else {
            ColumnMode::Offset
        };
        let policy = if self.strict {
            IssuePolicy::Fail
        } else {
            IssuePolicy::Skip
        };

        self.granularity_pairs()
            .iter()
            .map(|(row, col)| {
                CohortRequest::parse(
                    &self.cohort_event_cols,
                    &self.transaction_event_col,
                    self.metrics.iter().map(|(k, v)| (k.as_str(), v.clone())),
                    (row.as_str(), col.as_str()),
                )
                .map(|r| r.with_column_mode(mode).with_issue_policy(policy))
            })
            .collect()
    }
}

// ── Ordered metrics object ────────────────────────────────────────────────────

/// (De)serializes the `metrics` object as a list of entries so that column
/// order is kept and a repeated column reaches request validation.
mod ordered_metrics {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    type Entries = Vec<(String, Vec<String>)>;

    pub fn serialize<S: Serializer>(
        metrics: &[(String, Vec<String>)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(metrics.len()))?;
        for (column, functions) in metrics {
            map.serialize_entry(column, functions)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Entries, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = Entries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping metric columns to function names")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Entries, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, Vec<String>>()? {
                    entries.push(entry);
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

// ── Argument helpers ──────────────────────────────────────────────────────────

/// Parse `column:fn[,fn...]`.
fn parse_metric_arg(arg: &str) -> Result<(String, Vec<String>)> {
    let (column, funcs) = arg.split_once(':').ok_or_else(|| {
        CohortError::Config(format!("metric '{}' must look like column:fn[,fn]", arg))
    })?;
    let funcs: Vec<String> = funcs
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect();
    Ok((column.trim().to_string(), funcs))
}

/// Parse `row:column`.
fn parse_granularity_arg(arg: &str) -> Result<(String, String)> {
    let (row, col) = arg.split_once(':').ok_or_else(|| {
        CohortError::Config(format!("granularity '{}' must look like row:column", arg))
    })?;
    Ok((row.trim().to_string(), col.trim().to_string()))
}

// ── Tests ──────────────────────────────────────────────────────────────────────
