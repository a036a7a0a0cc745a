//! Plain-text, JSON and JSONL rendering of job results.
//!
//! The text view prints one block per (table, cohort event): cohorts down the
//! side, one line per metric, periods across the top.

use cohort_core::formatting;
use cohort_data::{JobResult, PeriodColumn, ResultTable, RowKey};
use unicode_width::UnicodeWidthStr;

/// Render every table of `result` as aligned text.
pub fn render_text(result: &JobResult, decimals: u32) -> String {
    let mut out = String::new();
    for table in &result.tables {
        out.push_str(&render_table(table, decimals));
        out.push('\n');
    }
    out.push_str(&format!(
        "{} rows in, {} records, {} issues ({:.3}s)\n",
        result.metadata.rows_in,
        result.metadata.records,
        result.metadata.issues,
        result.metadata.elapsed_seconds
    ));
    out
}

/// Render one table.
pub fn render_table(table: &ResultTable, decimals: u32) -> String {
    let pair = table.granularities();
    let periods = table.periods();
    let metrics = table.metric_names();

    let mut out = String::new();

    if table.is_empty() {
        out.push_str(&format!("== {} ==\n(no rows)\n", pair));
    }

    let mut events: Vec<&str> = table.row_keys().map(|k| k.cohort_event.as_str()).collect();
    events.dedup();

    for event in events {
        out.push_str(&format!("== {} · {} ==\n", event, pair));

        let mut grid: Vec<Vec<String>> = Vec::new();
        let mut header = vec!["cohort".to_string(), "size".to_string(), "metric".to_string()];
        header.extend(periods.iter().map(PeriodColumn::to_string));
        grid.push(header);

        let keys: Vec<&RowKey> = table
            .row_keys()
            .filter(|k| k.cohort_event == event)
            .collect();
        for key in keys {
            for (i, metric) in metrics.iter().enumerate() {
                let (label, size) = if i == 0 {
                    (key.cohort.label(), table.cohort_size(key).to_string())
                } else {
                    (String::new(), String::new())
                };
                let mut line = vec![label, size, metric.to_string()];
                line.extend(
                    periods
                        .iter()
                        .map(|p| formatting::format_cell(table.value(key, p, metric), decimals)),
                );
                grid.push(line);
            }
        }

        out.push_str(&align(&grid));
    }

    let summary = table.summary();
    if summary.rows_rejected > 0 || !table.issues().is_empty() {
        let share = if summary.rows_seen == 0 {
            0.0
        } else {
            100.0 * summary.rows_rejected as f64 / summary.rows_seen as f64
        };
        out.push_str(&format!(
            "{} issues, {} of {} rows rejected ({:.1}%)\n",
            table.issues().len(),
            summary.rows_rejected,
            summary.rows_seen,
            share
        ));
    }
    out
}

/// All records of all tables as one pretty-printed JSON array.
pub fn render_json(result: &JobResult) -> serde_json::Result<String> {
    let mut json = serde_json::to_string_pretty(&result.records())?;
    json.push('\n');
    Ok(json)
}

/// All records of all tables, one JSON object per line.
pub fn render_jsonl(result: &JobResult) -> serde_json::Result<String> {
    let mut out = String::new();
    for record in result.records() {
        out.push_str(&serde_json::to_string(&record)?);
        out.push('\n');
    }
    Ok(out)
}

/// Left-align the first three columns, right-align the rest.
fn align(grid: &[Vec<String>]) -> String {
    let cols = grid.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..cols)
        .map(|c| {
            grid.iter()
                .filter_map(|row| row.get(c))
                .map(|cell| UnicodeWidthStr::width(cell.as_str()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    for row in grid {
        let mut line = String::new();
        for (c, cell) in row.iter().enumerate() {
            let pad = " ".repeat(widths[c].saturating_sub(UnicodeWidthStr::width(cell.as_str())));
            if c > 0 {
                line.push_str("  ");
            }
            if c < 3 {
                line.push_str(cell);
                line.push_str(&pad);
            } else {
                line.push_str(&pad);
                line.push_str(cell);
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_core::models::{Row, Value};
    use cohort_core::time_utils::TimestampParser;
    use cohort_data::compute_cohort;

    fn ts(s: &str) -> Value {
        Value::Timestamp(TimestampParser::utc().parse_str(s).expect("valid timestamp"))
    }

    fn sample() -> ResultTable {
        let rows = vec![
            Row::new()
                .with("signup", ts("2020-01-01"))
                .with("churn", ts("2020-03-01"))
                .with("life", 2.0),
            Row::new()
                .with("signup", ts("2020-01-01"))
                .with("churn", ts("2020-04-01"))
                .with("life", 3.0),
            Row::new()
                .with("signup", ts("2020-02-01"))
                .with("churn", ts("2020-03-01"))
                .with("life", 1.5),
        ];
        compute_cohort(
            &rows,
            &["signup"],
            "churn",
            vec![("life", vec!["mean", "count"])],
            ("monthly", "monthly"),
        )
        .unwrap()
    }

    fn job(table: ResultTable) -> JobResult {
        JobResult {
            metadata: cohort_data::JobMetadata {
                generated_at: "2020-01-01T00:00:00+00:00".to_string(),
                rows_in: 3,
                tables: 1,
                records: table.records().len(),
                issues: 0,
                elapsed_seconds: 0.0,
            },
            tables: vec![table],
        }
    }

    #[test]
    fn test_render_table_layout() {
        let text = render_table(&sample(), 2);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "== signup · monthly/monthly ==");
        assert!(lines[1].starts_with("cohort"));
        assert!(lines[1].ends_with("1  2  3"));
        assert!(lines[2].starts_with("2020-01  2"));
        assert!(lines[2].contains("life_mean"));
        assert!(lines[2].ends_with("-  2  3"));
        assert!(lines[3].contains("life_count"));
        assert!(lines[4].starts_with("2020-02  1"));
        assert!(lines[4].contains("1.50"));
    }

    #[test]
    fn test_render_empty_table() {
        let table = compute_cohort(
            &[],
            &["signup"],
            "churn",
            vec![("life", vec!["mean"])],
            ("weekly", "daily"),
        )
        .unwrap();
        assert_eq!(render_table(&table, 2), "== weekly/daily ==\n(no rows)\n");
    }

    #[test]
    fn test_render_table_issue_footer() {
        let rows = vec![
            Row::new()
                .with("signup", ts("2020-03-01"))
                .with("churn", ts("2020-01-01"))
                .with("life", 1.0),
            Row::new()
                .with("signup", ts("2020-01-01"))
                .with("churn", ts("2020-02-01"))
                .with("life", 1.0),
            Row::new()
                .with("signup", ts("2020-01-01"))
                .with("churn", ts("2020-02-01"))
                .with("life", 1.0),
            Row::new()
                .with("signup", ts("2020-01-01"))
                .with("churn", ts("2020-03-01"))
                .with("life", 1.0),
        ];
        let table = compute_cohort(
            &rows,
            &["signup"],
            "churn",
            vec![("life", vec!["sum"])],
            ("monthly", "monthly"),
        )
        .unwrap();
        let text = render_table(&table, 2);
        assert!(text.ends_with("1 issues, 1 of 4 rows rejected (25.0%)\n"));
    }

    #[test]
    fn test_render_json_and_jsonl() {
        let result = job(sample());

        let json: serde_json::Value = serde_json::from_str(&render_json(&result).unwrap()).unwrap();
        let records = json.as_array().unwrap();
        assert_eq!(records.len(), 6);
        assert_eq!(records[0]["cohort_row"], "2020-01");
        assert_eq!(records[0]["cohort_column"], 2);
        assert_eq!(records[0]["metric_name"], "life_mean");
        assert_eq!(records[0]["metric_value"], 2.0);

        let jsonl = render_jsonl(&result).unwrap();
        assert_eq!(jsonl.lines().count(), 6);
    }

    #[test]
    fn test_render_text_footer() {
        let text = render_text(&job(sample()), 2);
        assert!(text.ends_with("3 rows in, 6 records, 0 issues (0.000s)\n"));
    }

    #[test]
    fn test_align_pads_by_display_width() {
        let grid = vec![
            vec!["a".to_string(), "b".to_string(), "c".to_string(), "1".to_string()],
            vec!["ääh".to_string(), "".to_string(), "".to_string(), "100".to_string()],
        ];
        let text = align(&grid);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "a    b  c    1");
        assert_eq!(lines[1], "ääh        100");
    }
}
