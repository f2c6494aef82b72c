//! Inline field dialects.
//!
//! A [`FieldFormat`] is picked once from configuration and decides how task
//! metadata is written into a checkbox line. Reading is permissive: bracketed
//! `[key:: value]` fields and emoji fields are recognised under every format,
//! while the `simple` shorthand is only recognised when that format is active
//! (its tokens are too easy to hit in ordinary prose).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::model::task::{Length, Priority, Task};
use crate::util::iso::{self, When};

/// Named convention for encoding task metadata inline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldFormat {
    /// `[scheduled:: 2024-01-01T09:00] [length:: 30m]`
    #[default]
    Dataview,
    /// `⏳ 2024-01-01 📅 2024-01-05 ⏫`
    Tasks,
    /// `[date:: 2024-01-01] [startTime:: 09:00] [endTime:: 10:00]`
    FullCalendar,
    /// `[[2024-01-01]] 09:00-10:00 > 2024-01-05 !!`
    Simple,
}

impl FieldFormat {
    pub const ALL: [FieldFormat; 4] = [
        FieldFormat::Dataview,
        FieldFormat::Tasks,
        FieldFormat::FullCalendar,
        FieldFormat::Simple,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FieldFormat::Dataview => "dataview",
            FieldFormat::Tasks => "tasks",
            FieldFormat::FullCalendar => "full-calendar",
            FieldFormat::Simple => "simple",
        }
    }
}

impl fmt::Display for FieldFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown field format {0:?} (expected dataview, tasks, full-calendar or simple)")]
pub struct UnknownFieldFormat(pub String);

impl FromStr for FieldFormat {
    type Err = UnknownFieldFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldFormat::ALL
            .into_iter()
            .find(|f| f.name() == s.trim())
            .ok_or_else(|| UnknownFieldFormat(s.to_string()))
    }
}

/// End of a scheduled span as written in text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndTime {
    /// Wall-clock time on the scheduled day
    Clock(NaiveTime),
    /// Full date-time
    At(NaiveDateTime),
}

/// Field values recovered from one syntax family
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValues {
    pub scheduled: Option<When>,
    /// Full-calendar style day, combined with `start_time`
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<EndTime>,
    pub all_day: Option<bool>,
    pub length: Option<Length>,
    pub due: Option<NaiveDate>,
    pub start: Option<NaiveDate>,
    pub created: Option<NaiveDate>,
    pub completion: Option<NaiveDate>,
    pub priority: Option<Priority>,
    pub repeat: Option<String>,
}

/// Everything the inline syntaxes found in one task line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineFields {
    /// `[key:: value]` fields
    pub bracket: FieldValues,
    /// The active format's own shorthand (only `simple` has one)
    pub shorthand: FieldValues,
    /// Emoji-prefixed fields
    pub emoji: FieldValues,
    /// Unreserved `[key:: value]` pairs, plus reserved ones whose value did
    /// not parse, kept verbatim
    pub extra: BTreeMap<String, String>,
}

/// Inline keys with a meaning of their own (compared case-insensitively)
pub const RESERVED_KEYS: [&str; 12] = [
    "scheduled",
    "due",
    "start",
    "created",
    "completion",
    "priority",
    "repeat",
    "length",
    "date",
    "starttime",
    "endtime",
    "allday",
];

pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key.to_ascii_lowercase().as_str())
}

static BRACKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([A-Za-z][\w-]*)::\s*([^\]]*)\]").unwrap());

static DATE_EMOJI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(⏳|⌛|📅|📆|🗓|🛫|➕|✅)\x{FE0F}?\s*(\d{4}-\d{2}-\d{2}(?:T\d{2}:\d{2})?)").unwrap()
});

static PRIORITY_EMOJI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(🔺|⏫|🔼|🔽|⏬)\x{FE0F}?").unwrap());

/// A rule runs up to the next field emoji, bracket field or tag.
static REPEAT_EMOJI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"🔁\x{FE0F}?\s*([^⏳⌛📅📆🗓🛫➕✅🔺⏫🔼🔽⏬🔁\[#]*)").unwrap()
});

static SIMPLE_SCHEDULED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[(\d{4}-\d{2}-\d{2})\]\](?:\s+(\d{1,2}:\d{2})(?:\s*-\s*(\d{1,2}:\d{2}))?)?")
        .unwrap()
});

static SIMPLE_DUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)>\s?(\d{4}-\d{2}-\d{2})").unwrap());

impl FieldFormat {
    /// Pull every recognised field out of `text`. Returns the fields and the
    /// text with them removed (whitespace not yet normalised).
    pub fn parse_fields(self, text: &str) -> (InlineFields, String) {
        let mut fields = InlineFields::default();
        let mut rest = strip_bracket_fields(text, &mut fields);
        if self == FieldFormat::Simple {
            rest = strip_simple_fields(&rest, &fields.bracket, &mut fields.shorthand);
        }
        rest = strip_emoji_fields(&rest, &mut fields.emoji);
        (fields, rest)
    }

    /// Render the task's dialect fields, in emission order. Fields this
    /// format cannot express are left out.
    pub fn serialize_fields(self, task: &Task) -> Vec<String> {
        match self {
            FieldFormat::Dataview => dataview_fields(task),
            FieldFormat::Tasks => tasks_fields(task),
            FieldFormat::FullCalendar => full_calendar_fields(task),
            FieldFormat::Simple => simple_fields(task),
        }
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

fn strip_bracket_fields(text: &str, fields: &mut InlineFields) -> String {
    BRACKET_RE
        .replace_all(text, |caps: &Captures| {
            let key = &caps[1];
            let value = caps[2].trim();
            let parsed = is_reserved_key(key) && assign_bracket(&mut fields.bracket, key, value);
            if !parsed {
                fields
                    .extra
                    .entry(key.to_string())
                    .or_insert_with(|| value.to_string());
            }
            " "
        })
        .into_owned()
}

/// Store one reserved bracket field. Returns false when the value is
/// malformed. A repeated key keeps its first value.
fn assign_bracket(values: &mut FieldValues, key: &str, value: &str) -> bool {
    fn set<T>(slot: &mut Option<T>, parsed: Option<T>) -> bool {
        match parsed {
            Some(v) => {
                if slot.is_none() {
                    *slot = Some(v);
                }
                true
            }
            None => false,
        }
    }

    match key.to_ascii_lowercase().as_str() {
        "scheduled" => set(&mut values.scheduled, iso::parse_when(value)),
        "date" => set(&mut values.date, iso::parse_date(value)),
        "starttime" => set(&mut values.start_time, iso::parse_time(value)),
        "endtime" => set(&mut values.end_time, parse_end_time(value)),
        "allday" => set(&mut values.all_day, value.parse::<bool>().ok()),
        "length" => set(&mut values.length, iso::parse_length(value)),
        "due" => set(&mut values.due, parse_day(value)),
        "start" => set(&mut values.start, parse_day(value)),
        "created" => set(&mut values.created, parse_day(value)),
        "completion" => set(&mut values.completion, parse_day(value)),
        "priority" => set(&mut values.priority, parse_priority(value)),
        "repeat" => set(
            &mut values.repeat,
            Some(value.to_string()).filter(|v| !v.is_empty()),
        ),
        _ => false,
    }
}

fn parse_end_time(value: &str) -> Option<EndTime> {
    if let Some(t) = iso::parse_time(value) {
        return Some(EndTime::Clock(t));
    }
    match iso::parse_when(value)? {
        When::DateTime(dt) => Some(EndTime::At(dt)),
        When::Date(_) => None,
    }
}

/// A day value; a date-time keeps only its date.
fn parse_day(value: &str) -> Option<NaiveDate> {
    iso::parse_when(value).map(|w| w.date())
}

/// Priority by name (`high`) or ordinal (`1`).
pub fn parse_priority(value: &str) -> Option<Priority> {
    Priority::from_name(value).or_else(|| {
        value
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(Priority::from_ordinal)
    })
}

fn strip_emoji_fields(text: &str, values: &mut FieldValues) -> String {
    let rest = DATE_EMOJI_RE.replace_all(text, |caps: &Captures| {
        let value = &caps[2];
        match &caps[1] {
            "⏳" | "⌛" => {
                if values.scheduled.is_none() {
                    values.scheduled = iso::parse_when(value);
                }
            }
            "📅" | "📆" | "🗓" => set_day(&mut values.due, value),
            "🛫" => set_day(&mut values.start, value),
            "➕" => set_day(&mut values.created, value),
            "✅" => set_day(&mut values.completion, value),
            _ => {}
        }
        " "
    });

    let rest = REPEAT_EMOJI_RE.replace_all(&rest, |caps: &Captures| {
        let rule = caps[1].trim().trim_end_matches(',').trim();
        if values.repeat.is_none() && !rule.is_empty() {
            values.repeat = Some(rule.to_string());
        }
        " "
    });

    let mut found = Vec::new();
    let rest = PRIORITY_EMOJI_RE.replace_all(&rest, |caps: &Captures| {
        found.push(caps[1].to_string());
        " "
    });
    values.priority = Priority::EMOJI
        .iter()
        .find(|(_, emoji)| found.iter().any(|f| f == emoji))
        .map(|(p, _)| *p);

    rest.into_owned()
}

fn set_day(slot: &mut Option<NaiveDate>, value: &str) {
    if slot.is_none() {
        *slot = parse_day(value);
    }
}

/// Read the `simple` shorthand. A date or due token is only taken out of the
/// text when no bracket field already supplies that value; otherwise it stays
/// as ordinary title text. The last token wins.
fn strip_simple_fields(text: &str, bracket: &FieldValues, values: &mut FieldValues) -> String {
    let mut rest = text.to_string();
    if bracket.scheduled.is_none()
        && bracket.date.is_none()
        && let Some(stripped) = strip_simple_scheduled(&rest, values)
    {
        rest = stripped;
    }
    if bracket.due.is_none()
        && let Some(stripped) = strip_simple_due(&rest, values)
    {
        rest = stripped;
    }

    // Priority markers are whole words
    let mut found = Vec::new();
    let words: Vec<&str> = rest
        .split(' ')
        .filter(|w| match Priority::from_simple_token(w) {
            Some(p) => {
                found.push(p);
                false
            }
            None => true,
        })
        .collect();
    values.priority = found.into_iter().min();
    words.join(" ")
}

fn strip_simple_scheduled(text: &str, values: &mut FieldValues) -> Option<String> {
    let (caps, rest) = last_match(&SIMPLE_SCHEDULED_RE, text)?;
    let date = iso::parse_date(&caps[1])?;
    let start = caps.get(2).and_then(|m| iso::parse_time(m.as_str()));
    values.scheduled = Some(match start {
        Some(t) => When::Date(date).at(t),
        None => When::Date(date),
    });
    values.end_time = caps
        .get(3)
        .and_then(|m| iso::parse_time(m.as_str()))
        .map(EndTime::Clock);
    Some(rest)
}

fn strip_simple_due(text: &str, values: &mut FieldValues) -> Option<String> {
    let (caps, rest) = last_match(&SIMPLE_DUE_RE, text)?;
    values.due = Some(iso::parse_date(&caps[1])?);
    Some(rest)
}

/// The last match of `re` and the text with that match blanked out.
fn last_match<'t>(re: &Regex, text: &'t str) -> Option<(Captures<'t>, String)> {
    let caps = re.captures_iter(text).last()?;
    let whole = caps.get(0)?;
    let rest = format!("{} {}", &text[..whole.start()], &text[whole.end()..]);
    Some((caps, rest))
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

fn bracket(key: &str, value: impl fmt::Display) -> String {
    format!("[{}:: {}]", key, value)
}

fn day(d: NaiveDate) -> String {
    When::Date(d).to_string()
}

/// Fields every bracket-based dialect writes the same way
fn common_bracket_fields(task: &Task, out: &mut Vec<String>) {
    if let Some(d) = task.due {
        out.push(bracket("due", day(d)));
    }
    if let Some(d) = task.start {
        out.push(bracket("start", day(d)));
    }
    if let Some(d) = task.created {
        out.push(bracket("created", day(d)));
    }
    if let Some(d) = task.completion {
        out.push(bracket("completion", day(d)));
    }
    if task.priority != Priority::Default {
        out.push(bracket("priority", task.priority.name()));
    }
    if let Some(rule) = &task.repeat {
        out.push(bracket("repeat", rule));
    }
}

fn dataview_fields(task: &Task) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(s) = task.scheduled {
        out.push(bracket("scheduled", s));
    }
    if let Some(l) = task.length.filter(|l| !l.is_zero()) {
        out.push(bracket("length", iso::format_length(l)));
    }
    common_bracket_fields(task, &mut out);
    out
}

fn tasks_fields(task: &Task) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(e) = task.priority.emoji() {
        out.push(e.to_string());
    }
    if let Some(rule) = &task.repeat {
        out.push(format!("🔁 {}", rule));
    }
    if let Some(d) = task.created {
        out.push(format!("➕ {}", day(d)));
    }
    if let Some(d) = task.start {
        out.push(format!("🛫 {}", day(d)));
    }
    if let Some(s) = task.scheduled {
        out.push(format!("⏳ {}", s));
    }
    if let Some(d) = task.due {
        out.push(format!("📅 {}", day(d)));
    }
    if let Some(d) = task.completion {
        out.push(format!("✅ {}", day(d)));
    }
    if let Some(l) = task.length.filter(|l| !l.is_zero()) {
        out.push(bracket("length", iso::format_length(l)));
    }
    out
}

/// Clock end of a timed task, if it ends on the day it starts
fn same_day_end(task: &Task) -> Option<(NaiveTime, NaiveTime)> {
    let When::DateTime(start) = task.scheduled? else {
        return None;
    };
    let length = task.length.filter(|l| !l.is_zero())?;
    let end = start.checked_add_signed(length.as_duration())?;
    (end.date() == start.date()).then(|| (start.time(), end.time()))
}

/// Length as a bracket field, for tasks whose length cannot be written as a
/// same-day end time.
fn push_unspanned_length(task: &Task, out: &mut Vec<String>) {
    if same_day_end(task).is_some() {
        return;
    }
    if let Some(l) = task.length.filter(|l| !l.is_zero()) {
        out.push(bracket("length", iso::format_length(l)));
    }
}

fn full_calendar_fields(task: &Task) -> Vec<String> {
    let mut out = Vec::new();
    match task.scheduled {
        Some(When::Date(d)) => {
            out.push(bracket("date", day(d)));
            out.push(bracket("allDay", true));
        }
        Some(When::DateTime(dt)) => {
            out.push(bracket("date", day(dt.date())));
            out.push(bracket("startTime", iso::format_time(dt.time())));
            if let Some((_, end)) = same_day_end(task) {
                out.push(bracket("endTime", iso::format_time(end)));
            }
        }
        None => {}
    }
    push_unspanned_length(task, &mut out);
    common_bracket_fields(task, &mut out);
    out
}

fn simple_fields(task: &Task) -> Vec<String> {
    let mut out = Vec::new();
    match task.scheduled {
        Some(When::Date(d)) => out.push(format!("[[{}]]", day(d))),
        Some(When::DateTime(dt)) => {
            let mut s = format!("[[{}]] {}", day(dt.date()), iso::format_time(dt.time()));
            if let Some((_, end)) = same_day_end(task) {
                s.push('-');
                s.push_str(&iso::format_time(end));
            }
            out.push(s);
        }
        None => {}
    }
    push_unspanned_length(task, &mut out);
    if let Some(d) = task.due {
        out.push(format!("> {}", day(d)));
    }
    if let Some(token) = task.priority.simple_token() {
        out.push(token.to_string());
    }
    if let Some(d) = task.start {
        out.push(bracket("start", day(d)));
    }
    if let Some(d) = task.created {
        out.push(bracket("created", day(d)));
    }
    if let Some(d) = task.completion {
        out.push(bracket("completion", day(d)));
    }
    if let Some(rule) = &task.repeat {
        out.push(bracket("repeat", rule));
    }
    out
}
