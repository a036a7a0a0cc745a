use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single cell of an input row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Explicitly empty (JSON `null`).
    Null,
    /// Any numeric metric value.
    Number(f64),
    /// A naive wall-clock timestamp in the configured timezone.
    Timestamp(NaiveDateTime),
    /// Anything else, including timestamps that failed to parse.
    Text(String),
}

impl Value {
    /// Short type name used in data-issue messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Number(_) => "number",
            Value::Timestamp(_) => "timestamp",
            Value::Text(_) => "text",
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Why a field lookup could not produce a value of the requested type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The row has no field with that name.
    Missing,
    /// The field exists but holds a value of another type.
    WrongType(&'static str),
}

/// One input record: field name → value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Row {
    fields: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Timestamp field lookup. `Ok(None)` means the field is present but null.
    pub fn timestamp(&self, name: &str) -> Result<Option<NaiveDateTime>, FieldError> {
        match self.fields.get(name) {
            None => Err(FieldError::Missing),
            Some(Value::Null) => Ok(None),
            Some(Value::Timestamp(ts)) => Ok(Some(*ts)),
            Some(other) => Err(FieldError::WrongType(other.kind())),
        }
    }

    /// Numeric field lookup. `NaN` is treated like null.
    pub fn number(&self, name: &str) -> Result<Option<f64>, FieldError> {
        match self.fields.get(name) {
            None => Err(FieldError::Missing),
            Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) if n.is_nan() => Ok(None),
            Some(Value::Number(n)) => Ok(Some(*n)),
            Some(other) => Err(FieldError::WrongType(other.kind())),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

// ── Data issues ───────────────────────────────────────────────────────────────

/// What went wrong with a single row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    /// A required timestamp or metric field is absent.
    MissingField { field: String },
    /// A field holds a value of the wrong type.
    WrongType { field: String, found: String },
    /// The transaction event falls in an earlier period than the cohort event.
    NegativeOffset { offset: i64 },
}

/// A data-quality problem found while aggregating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataIssue {
    /// Zero-based index of the row in the input table.
    pub row_index: usize,
    /// Cohort event column being evaluated when the issue was found.
    pub cohort_event: String,
    pub kind: IssueKind,
}

impl DataIssue {
    /// Build an issue from a failed field lookup.
    pub fn from_field(
        row_index: usize,
        cohort_event: &str,
        field: &str,
        error: FieldError,
    ) -> Self {
        let kind = match error {
            FieldError::Missing => IssueKind::MissingField {
                field: field.to_string(),
            },
            FieldError::WrongType(found) => IssueKind::WrongType {
                field: field.to_string(),
                found: found.to_string(),
            },
        };
        Self {
            row_index,
            cohort_event: cohort_event.to_string(),
            kind,
        }
    }
}

impl fmt::Display for DataIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {} ({}): ", self.row_index, self.cohort_event)?;
        match &self.kind {
            IssueKind::MissingField { field } => write!(f, "missing field '{}'", field),
            IssueKind::WrongType { field, found } => {
                write!(f, "field '{}' has unexpected type {}", field, found)
            }
            IssueKind::NegativeOffset { offset } => write!(
                f,
                "transaction precedes cohort event (period offset {})",
                offset
            ),
        }
    }
}
