//! JSON / JSONL row loading.
//!
//! Reads transaction records from `.jsonl` / `.ndjson` files (one object per
//! line) or `.json` files (a top-level array of objects) and converts them
//! into [`Row`]s, parsing the named timestamp columns on the way.

use std::collections::HashSet;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use cohort_core::error::{CohortError, Result};
use cohort_core::models::{Row, Value};
use cohort_core::time_utils::TimestampParser;
use serde_json::Map;
use tracing::{debug, warn};

const LINE_EXTENSIONS: &[&str] = &["jsonl", "ndjson"];
const DOCUMENT_EXTENSIONS: &[&str] = &["json"];

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all input files under `path`, sorted by path.
///
/// A file path is returned as-is; a directory is walked recursively for
/// `.jsonl`, `.ndjson` and `.json` files.
pub fn find_input_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && input_kind(entry.path()).is_some())
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Load every row under `path`, parsing `timestamp_columns` in `timezone`.
pub fn load_rows<S: AsRef<str>>(
    path: &Path,
    timestamp_columns: &[S],
    timezone: &str,
) -> Result<Vec<Row>> {
    RowLoader::new(TimestampParser::new(timezone), timestamp_columns).load(path)
}

// ── RowLoader ─────────────────────────────────────────────────────────────────

/// Converts JSON objects into [`Row`]s.
#[derive(Debug, Clone)]
pub struct RowLoader {
    parser: TimestampParser,
    timestamp_columns: HashSet<String>,
}

impl RowLoader {
    pub fn new<S: AsRef<str>>(parser: TimestampParser, timestamp_columns: &[S]) -> Self {
        Self {
            parser,
            timestamp_columns: timestamp_columns
                .iter()
                .map(|c| c.as_ref().to_string())
                .collect(),
        }
    }

    /// Load a file, or every input file under a directory.
    pub fn load(&self, path: &Path) -> Result<Vec<Row>> {
        if !path.exists() {
            return Err(CohortError::InputPathNotFound(path.to_path_buf()));
        }

        let files = find_input_files(path);
        if files.is_empty() {
            return Err(CohortError::NoInputFiles(path.to_path_buf()));
        }

        let mut rows: Vec<Row> = Vec::new();
        for file in &files {
            rows.extend(self.load_file(file)?);
        }

        debug!("Loaded {} rows from {} files", rows.len(), files.len());
        Ok(rows)
    }

    /// Load one file. Files without a `.json` extension are read line by line.
    pub fn load_file(&self, path: &Path) -> Result<Vec<Row>> {
        let file = std::fs::File::open(path).map_err(|source| CohortError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        match input_kind(path) {
            Some(InputKind::Document) => {
                let value: serde_json::Value =
                    serde_json::from_reader(std::io::BufReader::new(file))?;
                Ok(self.rows_from_document(path, value))
            }
            _ => self.rows_from_lines(path, std::io::BufReader::new(file)),
        }
    }

    /// Convert one JSON object.
    pub fn parse_object(&self, object: &Map<String, serde_json::Value>) -> Row {
        object
            .iter()
            .map(|(name, raw)| (name.as_str(), self.convert(name, raw)))
            .collect()
    }

    // ── Private ───────────────────────────────────────────────────────────────

    fn rows_from_lines(&self, path: &Path, reader: impl BufRead) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        let mut skipped = 0usize;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| CohortError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<serde_json::Value>(trimmed) {
                Ok(serde_json::Value::Object(object)) => rows.push(self.parse_object(&object)),
                Ok(_) => {
                    warn!("{}:{}: not a JSON object, skipped", path.display(), line_no + 1);
                    skipped += 1;
                }
                Err(e) => {
                    warn!("{}:{}: invalid JSON ({}), skipped", path.display(), line_no + 1, e);
                    skipped += 1;
                }
            }
        }

        debug!(
            "File {}: {} rows, {} lines skipped",
            path.display(),
            rows.len(),
            skipped
        );
        Ok(rows)
    }

    fn rows_from_document(&self, path: &Path, value: serde_json::Value) -> Vec<Row> {
        match value {
            serde_json::Value::Array(items) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| match item {
                    serde_json::Value::Object(object) => Some(self.parse_object(object)),
                    _ => {
                        warn!("{}[{}]: not a JSON object, skipped", path.display(), i);
                        None
                    }
                })
                .collect(),
            serde_json::Value::Object(object) => vec![self.parse_object(&object)],
            _ => {
                warn!("{}: expected an array of objects", path.display());
                Vec::new()
            }
        }
    }

    fn convert(&self, name: &str, raw: &serde_json::Value) -> Value {
        if raw.is_null() {
            return Value::Null;
        }
        if self.timestamp_columns.contains(name) {
            return match (self.parser.parse(raw), raw) {
                (Some(ts), _) => Value::Timestamp(ts),
                (None, serde_json::Value::String(s)) => Value::Text(s.clone()),
                (None, other) => Value::Text(other.to_string()),
            };
        }
        match raw {
            serde_json::Value::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
            serde_json::Value::Bool(b) => Value::Number(if *b { 1.0 } else { 0.0 }),
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    Lines,
    Document,
}

fn input_kind(path: &Path) -> Option<InputKind> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    if LINE_EXTENSIONS.contains(&ext.as_str()) {
        Some(InputKind::Lines)
    } else if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
        Some(InputKind::Document)
    } else {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    fn loader() -> RowLoader {
        RowLoader::new(TimestampParser::utc(), &["start", "end"])
    }

    #[test]
    fn test_load_jsonl_file() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            tmp.path(),
            "rows.jsonl",
            concat!(
                r#"{"start": "2020-01-01", "end": "2020-03-01T00:00:00Z", "life": 2}"#,
                "\n\n",
                r#"{"start": "2020-02-01", "end": null, "life": 1.5, "vip": true}"#,
                "\n",
            ),
        );

        let rows = loader().load(&path).unwrap();
        assert_eq!(rows.len(), 2);

        let jan = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(rows[0].timestamp("start"), Ok(Some(jan)));
        assert_eq!(rows[0].number("life"), Ok(Some(2.0)));
        assert_eq!(rows[1].timestamp("end"), Ok(None));
        assert_eq!(rows[1].number("vip"), Ok(Some(1.0)));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            tmp.path(),
            "rows.ndjson",
            "{\"start\": \"2020-01-01\"}\nnot json\n[1, 2]\n{\"start\": \"2020-01-02\"}\n",
        );
        let rows = loader().load(&path).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_load_json_array() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            tmp.path(),
            "rows.json",
            r#"[{"start": "2020-01-01", "life": 3}, 7, {"start": "2020-01-05"}]"#,
        );
        let rows = loader().load(&path).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_invalid_json_document_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = write(tmp.path(), "rows.json", "[{\"start\": ");
        let err = loader().load(&path).unwrap_err();
        assert!(matches!(err, CohortError::JsonParse(_)));
    }

    #[test]
    fn test_unparseable_timestamp_kept_as_text() {
        let loader = loader();
        let object = serde_json::json!({"start": "someday", "name": "x"});
        let row = loader.parse_object(object.as_object().unwrap());
        assert_eq!(row.get("start"), Some(&Value::Text("someday".to_string())));
        assert_eq!(row.get("name"), Some(&Value::Text("x".to_string())));
    }

    #[test]
    fn test_directory_walk_sorted_and_filtered() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "b.jsonl", "{\"start\": \"2020-01-02\"}\n");
        write(tmp.path(), "a.jsonl", "{\"start\": \"2020-01-01\"}\n");
        write(tmp.path(), "nested/c.json", "[{\"start\": \"2020-01-03\"}]");
        write(tmp.path(), "notes.txt", "ignored");

        let files = find_input_files(tmp.path());
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.jsonl", "b.jsonl", "c.json"]);

        let rows = load_rows(tmp.path(), &["start"], "UTC").unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_missing_path_and_empty_dir() {
        let tmp = TempDir::new().unwrap();
        let err = loader().load(&tmp.path().join("absent")).unwrap_err();
        assert!(matches!(err, CohortError::InputPathNotFound(_)));

        let err = loader().load(tmp.path()).unwrap_err();
        assert!(matches!(err, CohortError::NoInputFiles(_)));
    }
}
