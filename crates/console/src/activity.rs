//! Append-only activity log of invocations and manual notes.

use crate::form::FormState;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};

/// Outcome of an invocation: exactly one of a response or an error message.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationOutput {
    Response(Value),
    Error(String),
}

impl InvocationOutput {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn response(&self) -> Option<&Value> {
        match self {
            Self::Response(value) => Some(value),
            Self::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            Self::Response(_) => None,
        }
    }
}

/// A completed invocation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InvocationRecord {
    pub function: String,
    pub inputs: FormState,
    pub output: InvocationOutput,
    pub date: DateTime<Utc>,
}

impl InvocationRecord {
    /// Creates a record timestamped now.
    pub fn new(function: impl Into<String>, inputs: FormState, output: InvocationOutput) -> Self {
        Self { function: function.into(), inputs, output, date: Utc::now() }
    }
}

/// A line of the activity log.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LogEntry {
    Invocation(InvocationRecord),
    Text(String),
    Data(Map<String, Value>),
}

impl LogEntry {
    /// Whether the entry records a failed invocation.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Invocation(record) if record.output.is_error())
    }

    /// Pretty JSON rendering of the entry.
    pub fn render(&self) -> String {
        serde_json::to_string_pretty(self)
            .unwrap_or_else(|err| format!("<unrenderable entry: {err}>"))
    }
}

/// Ordered, append-only list of [`LogEntry`]s.
///
/// Appends go through a shared reference, so concurrently running invocations can each record
/// their outcome.
#[derive(Debug, Default)]
pub struct ActivityLog {
    entries: RwLock<Vec<LogEntry>>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an invocation record.
    pub fn append(&self, record: InvocationRecord) {
        trace!(function = %record.function, error = record.output.is_error(), "logging invocation");
        self.entries.write().push(LogEntry::Invocation(record));
    }

    /// Appends a plain message.
    pub fn push_text(&self, text: impl Into<String>) {
        self.entries.write().push(LogEntry::Text(text.into()));
    }

    /// Appends a manual note, timestamped now.
    ///
    /// JSON objects, arrays and `null` are stored as structured data with an added `date` field.
    /// Array elements are keyed by index and `null` contributes no fields. Anything else is
    /// stored as text with ` date: <timestamp>` appended. Returns `false` for empty input.
    pub fn note(&self, input: &str) -> bool {
        if input.is_empty() {
            return false;
        }
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut data = match serde_json::from_str::<Value>(input) {
            Ok(Value::Object(data)) => data,
            Ok(Value::Array(items)) => {
                items.into_iter().enumerate().map(|(i, item)| (i.to_string(), item)).collect()
            }
            Ok(Value::Null) => Map::new(),
            _ => {
                self.entries.write().push(LogEntry::Text(format!("{input} date: {now}")));
                return true;
            }
        };
        data.insert("date".to_string(), Value::String(now));
        self.entries.write().push(LogEntry::Data(data));
        true
    }

    /// A snapshot of every entry, in insertion order.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().clone()
    }

    /// The most recent entry.
    pub fn last(&self) -> Option<LogEntry> {
        self.entries.read().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
