use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::util::iso::When;

/// Task identity: `path::line`. Derived from the source position on every
/// reload, so a task whose line moves gets a new id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(path: &str, line: usize) -> Self {
        TaskId(format!("{}::{}", path, line))
    }

    /// Split back into `(path, line)`.
    pub fn parts(&self) -> Option<(&str, usize)> {
        let (path, line) = self.0.rsplit_once("::")?;
        Some((path, line.parse().ok()?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

/// Task priority. Variant order is the sort order: `Highest` sorts first and
/// `Default` sits between `Medium` and `Low`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Highest,
    High,
    Medium,
    #[default]
    Default,
    Low,
    Lowest,
}

impl Priority {
    pub const ALL: [Priority; 6] = [
        Priority::Highest,
        Priority::High,
        Priority::Medium,
        Priority::Default,
        Priority::Low,
        Priority::Lowest,
    ];

    /// Emoji markers in lookup precedence (highest first). `Default` has none.
    pub const EMOJI: [(Priority, &'static str); 5] = [
        (Priority::Highest, "🔺"),
        (Priority::High, "⏫"),
        (Priority::Medium, "🔼"),
        (Priority::Low, "🔽"),
        (Priority::Lowest, "⏬"),
    ];

    pub fn name(self) -> &'static str {
        match self {
            Priority::Highest => "highest",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Default => "default",
            Priority::Low => "low",
            Priority::Lowest => "lowest",
        }
    }

    pub fn from_name(s: &str) -> Option<Priority> {
        let s = s.trim();
        Priority::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
    }

    pub fn from_ordinal(n: i64) -> Option<Priority> {
        usize::try_from(n)
            .ok()
            .and_then(|i| Priority::ALL.get(i).copied())
    }

    pub fn emoji(self) -> Option<&'static str> {
        Priority::EMOJI
            .iter()
            .find(|(p, _)| *p == self)
            .map(|(_, e)| *e)
    }

    /// Marker used by the `simple` field format.
    pub fn simple_token(self) -> Option<&'static str> {
        match self {
            Priority::Highest => Some("!!!"),
            Priority::High => Some("!!"),
            Priority::Medium => Some("!"),
            Priority::Default => None,
            Priority::Low => Some("?"),
            Priority::Lowest => Some("??"),
        }
    }

    pub fn from_simple_token(s: &str) -> Option<Priority> {
        Priority::ALL
            .into_iter()
            .find(|p| p.simple_token() == Some(s))
    }
}

/// An explicit duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Length {
    pub hour: u32,
    pub minute: u32,
}

impl Length {
    pub fn from_minutes(total: u32) -> Self {
        Length {
            hour: total / 60,
            minute: total % 60,
        }
    }

    pub fn as_minutes(self) -> u32 {
        self.hour * 60 + self.minute
    }

    pub fn is_zero(self) -> bool {
        self.as_minutes() == 0
    }

    pub fn as_duration(self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.as_minutes()))
    }
}

/// Source anchor of a task (0-indexed line, column of the bullet)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

/// A task with all its parsed fields and source tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Display title: fields, tags and link syntax removed
    pub title: String,
    /// Title before link stripping, used when writing the task back
    pub original_title: String,
    /// Free text below the task line
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    /// Tags (without the `#` prefix)
    pub tags: BTreeSet<String>,
    /// Unrecognised `key:: value` fields, kept verbatim
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_fields: BTreeMap<String, String>,
    /// Raw checkbox character
    pub status: char,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled: Option<When>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<Length>,
    pub priority: Priority,
    /// Recurrence rule, stored but never expanded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<String>,
    pub children: Vec<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<TaskId>,
    /// Set when the task was pulled in by a query nested under another task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_parent: Option<TaskId>,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    pub position: Position,
}

impl Task {
    /// Create an empty open task at the given source location
    pub fn new(path: &str, line: usize, title: &str) -> Self {
        Task {
            id: TaskId::new(path, line),
            title: title.to_string(),
            original_title: title.to_string(),
            notes: String::new(),
            tags: BTreeSet::new(),
            extra_fields: BTreeMap::new(),
            status: ' ',
            scheduled: None,
            due: None,
            completion: None,
            start: None,
            created: None,
            length: None,
            priority: Priority::Default,
            repeat: None,
            children: Vec::new(),
            parent: None,
            query_parent: None,
            path: path.to_string(),
            heading: None,
            position: Position { line, col: 0 },
        }
    }

    pub fn completed(&self) -> bool {
        matches!(self.status, 'x' | 'X') || self.completion.is_some()
    }

    /// The date used to place the task: scheduled, else due, else completion.
    pub fn effective_date(&self) -> Option<When> {
        self.scheduled
            .or(self.due.map(When::Date))
            .or(self.completion.map(When::Date))
    }

    /// Stable secondary sort key: file, then line.
    pub fn source_key(&self) -> (&str, usize) {
        (&self.path, self.position.line)
    }
}

/// A value the host already extracted from the task or its page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum MetaValue {
    Date(NaiveDate),
    DateTime(chrono::NaiveDateTime),
    Duration(Length),
    Number(f64),
    Text(String),
    Bool(bool),
    List(Vec<MetaValue>),
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Date(d) => write!(f, "{}", When::Date(*d)),
            MetaValue::DateTime(dt) => write!(f, "{}", When::DateTime(*dt)),
            MetaValue::Duration(l) => f.write_str(&crate::util::iso::format_length(*l)),
            MetaValue::Number(n) => write!(f, "{}", n),
            MetaValue::Text(s) => f.write_str(s),
            MetaValue::Bool(b) => write!(f, "{}", b),
            MetaValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                f.write_str(&parts.join(", "))
            }
        }
    }
}

/// One task-like record as the document collaborator hands it over
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTask {
    /// The checkbox line, followed by any notes lines
    pub text: String,
    #[serde(default)]
    pub metadata: indexmap::IndexMap<String, MetaValue>,
    pub path: String,
    pub position: Position,
    #[serde(default)]
    pub heading: Option<String>,
    /// Line of the enclosing task, if nested
    #[serde(default)]
    pub parent: Option<usize>,
    /// Lines of directly nested tasks
    #[serde(default)]
    pub children: Vec<usize>,
    #[serde(default)]
    pub query_parent: Option<String>,
    /// Whether the containing document is flagged as a page
    #[serde(default)]
    pub page: bool,
}
