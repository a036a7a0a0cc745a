mod bootstrap;
mod report;

use std::io::Write;

use anyhow::{Context, Result};
use cohort_core::settings::Settings;
use cohort_data::{reader, run_job};

fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("cohort-kpi v{} starting", env!("CARGO_PKG_VERSION"));

    let job = settings.job_config()?;
    tracing::info!(
        "Job: cohorts {:?} by {}, {} metric columns, {} granularity pairs",
        job.cohort_event_cols,
        job.transaction_event_col,
        job.metrics.len(),
        job.granularity_pairs().len()
    );

    let mut timestamp_columns = job.cohort_event_cols.clone();
    timestamp_columns.push(job.transaction_event_col.clone());

    let rows = reader::load_rows(&settings.input, &timestamp_columns, &settings.timezone)
        .with_context(|| format!("loading rows from {}", settings.input.display()))?;

    let result = run_job(&rows, &job)?;
    if result.is_empty() {
        tracing::warn!("No rows were aggregated");
    }

    let output = match settings.format.as_str() {
        "json" => report::render_json(&result)?,
        "jsonl" => report::render_jsonl(&result)?,
        _ => report::render_text(&result, settings.decimals),
    };

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(output.as_bytes())?;
    handle.flush()?;

    Ok(())
}
