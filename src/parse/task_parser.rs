use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use regex::{Captures, Regex};

use crate::model::config::DailyNoteConfig;
use crate::model::task::{Length, MetaValue, Position, Priority, RawTask, Task, TaskId};
use crate::parse::field_format::{self, EndTime, FieldFormat, FieldValues};
use crate::util::iso::{self, When};

/// Settings the parser needs from configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseContext<'a> {
    pub field_format: FieldFormat,
    pub daily_notes: Option<&'a DailyNoteConfig>,
}

/// Metadata keys the host uses for its own bookkeeping. Never copied into
/// `extra_fields`.
const HOST_KEYS: [&str; 20] = [
    "text",
    "status",
    "checked",
    "completed",
    "fullycompleted",
    "line",
    "linecount",
    "path",
    "section",
    "position",
    "children",
    "parent",
    "task",
    "annotated",
    "link",
    "subtasks",
    "header",
    "list",
    "symbol",
    "tags",
];

static CHECKBOX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([ \t]*)([-*+]|\d+[.)]) +\[(.)\](.*)$").unwrap());

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|\s)#([\p{L}\p{N}_/-]+)").unwrap());

static WIKILINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]|]*)(?:\|([^\]]*))?\]\]").unwrap());

static MDLINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\(([^)]*)\)").unwrap());

/// A checkbox list item split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkbox<'a> {
    /// Leading whitespace
    pub indent: &'a str,
    /// `-`, `*`, `+`, `1.` or `1)`
    pub bullet: &'a str,
    pub status: char,
    /// Everything after `]`, leading space removed
    pub body: &'a str,
}

/// Split `  - [x] Body` into its parts. None for lines that are not
/// checkbox list items.
pub fn parse_checkbox(line: &str) -> Option<Checkbox<'_>> {
    let caps = CHECKBOX_RE.captures(line)?;
    let status = caps[3].chars().next()?;
    Some(Checkbox {
        indent: caps.get(1)?.as_str(),
        bullet: caps.get(2)?.as_str(),
        status,
        body: caps.get(4)?.as_str().trim_start(),
    })
}

/// Build a task record from one raw record.
///
/// Never fails: a field that cannot be read is simply absent. Each field
/// takes the first value found in this order: host metadata (native values
/// only), `[key:: value]` fields, the active format's shorthand, emoji.
pub fn parse_task(raw: &RawTask, ctx: &ParseContext) -> Task {
    let mut lines = raw.text.lines();
    let first = lines.next().unwrap_or("");
    let notes = collect_notes(lines);

    let (status, body) = match parse_checkbox(first) {
        Some(cb) => (cb.status, cb.body),
        None => (' ', first.trim()),
    };

    let (fields, stripped) = ctx.field_format.parse_fields(body);
    let sources = [&fields.bracket, &fields.shorthand, &fields.emoji];
    let (original_title, tags) = parse_title_and_tags(&stripped);
    let title = collapse_whitespace(&strip_links(&original_title));

    let scheduled = resolve_scheduled(raw, ctx, &fields.bracket, &sources);

    let length = meta(raw, "length")
        .and_then(meta_length)
        .or_else(|| first_of(&sources, |v| v.length))
        .or_else(|| {
            let end = meta(raw, "endTime")
                .and_then(meta_end_time)
                .or_else(|| first_of(&sources, |v| v.end_time))?;
            derived_length(scheduled?, end)
        });

    let day_field = |key: &str, pick: fn(&FieldValues) -> Option<NaiveDate>| {
        meta(raw, key)
            .and_then(meta_when)
            .map(|w| w.date())
            .or_else(|| first_of(&sources, pick))
    };

    let priority = meta(raw, "priority")
        .and_then(meta_priority)
        .or_else(|| first_of(&sources, |v| v.priority))
        .unwrap_or_default();

    let repeat = meta(raw, "repeat")
        .and_then(|v| match v {
            MetaValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
        .or_else(|| first_of(&sources, |v| v.repeat.clone()));

    let mut extra_fields = fields.extra.clone();
    merge_metadata_extras(raw, &mut extra_fields);

    Task {
        id: TaskId::new(&raw.path, raw.position.line),
        title,
        original_title,
        notes,
        tags,
        extra_fields,
        status,
        scheduled,
        due: day_field("due", |v| v.due),
        completion: day_field("completion", |v| v.completion),
        start: day_field("start", |v| v.start),
        created: day_field("created", |v| v.created),
        length,
        priority,
        repeat,
        children: raw
            .children
            .iter()
            .map(|line| TaskId::new(&raw.path, *line))
            .collect(),
        parent: raw.parent.map(|line| TaskId::new(&raw.path, line)),
        query_parent: raw.query_parent.as_deref().map(TaskId::from),
        path: raw.path.clone(),
        heading: raw.heading.clone(),
        position: Position {
            line: raw.position.line,
            col: raw.position.col,
        },
    }
}

fn first_of<T>(sources: &[&FieldValues], pick: impl Fn(&FieldValues) -> Option<T>) -> Option<T> {
    sources.iter().find_map(|v| pick(*v))
}

fn resolve_scheduled(
    raw: &RawTask,
    ctx: &ParseContext,
    bracket: &FieldValues,
    sources: &[&FieldValues],
) -> Option<When> {
    let mut scheduled = meta(raw, "scheduled")
        .and_then(meta_when)
        .or_else(|| meta(raw, "date").and_then(meta_when))
        .or(bracket.scheduled)
        .or(bracket.date.map(When::Date))
        .or_else(|| first_of(&sources[1..], |v| v.scheduled));

    // Children follow their parent's schedule, so only top-level tasks
    // pick up the daily note's date.
    if scheduled.is_none() && raw.parent.is_none() {
        scheduled = ctx
            .daily_notes
            .and_then(|cfg| daily_note_date(&raw.path, cfg))
            .map(When::Date);
    }

    let start_time = meta(raw, "startTime")
        .and_then(meta_time)
        .or(bracket.start_time);
    if let (Some(When::Date(d)), Some(t)) = (scheduled, start_time) {
        scheduled = Some(When::Date(d).at(t));
    }

    let all_day = match meta(raw, "allDay") {
        Some(MetaValue::Bool(b)) => Some(*b),
        _ => bracket.all_day,
    };
    if all_day == Some(true) {
        scheduled = scheduled.map(|w| When::Date(w.date()));
    }
    scheduled
}

/// `end - start` for a timed task. Zero, negative or date-only spans give
/// no length.
fn derived_length(scheduled: When, end: EndTime) -> Option<Length> {
    let When::DateTime(start) = scheduled else {
        return None;
    };
    let end = match end {
        EndTime::Clock(t) => start.date().and_time(t),
        EndTime::At(dt) => dt,
    };
    let minutes = u32::try_from((end - start).num_minutes()).ok()?;
    (minutes > 0).then(|| Length::from_minutes(minutes))
}

/// Date of a daily note from its path, if the path matches the configured
/// folder and file name format.
pub fn daily_note_date(path: &str, cfg: &DailyNoteConfig) -> Option<NaiveDate> {
    let folder = cfg.folder.trim_matches('/');
    let rel = if folder.is_empty() {
        path
    } else {
        path.strip_prefix(folder)?.strip_prefix('/')?
    };
    let rel = rel.strip_suffix(".md").unwrap_or(rel);
    NaiveDate::parse_from_str(rel, &cfg.format).ok().or_else(|| {
        let stem = Path::new(rel).file_name()?.to_str()?;
        NaiveDate::parse_from_str(stem, &cfg.format).ok()
    })
}

// ---------------------------------------------------------------------------
// Host metadata
// ---------------------------------------------------------------------------

fn meta<'a>(raw: &'a RawTask, key: &str) -> Option<&'a MetaValue> {
    raw.metadata
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

fn meta_when(v: &MetaValue) -> Option<When> {
    match v {
        MetaValue::Date(d) => Some(When::Date(*d)),
        MetaValue::DateTime(dt) => Some(When::DateTime(iso::truncate_to_minute(*dt))),
        _ => None,
    }
}

fn meta_time(v: &MetaValue) -> Option<NaiveTime> {
    match v {
        MetaValue::Text(s) => iso::parse_time(s),
        MetaValue::DateTime(dt) => Some(iso::truncate_to_minute(*dt).time()),
        _ => None,
    }
}

fn meta_end_time(v: &MetaValue) -> Option<EndTime> {
    match v {
        MetaValue::Text(s) => iso::parse_time(s).map(EndTime::Clock),
        MetaValue::DateTime(dt) => Some(EndTime::At(iso::truncate_to_minute(*dt))),
        _ => None,
    }
}

fn meta_length(v: &MetaValue) -> Option<Length> {
    match v {
        MetaValue::Duration(l) => Some(*l).filter(|l| !l.is_zero()),
        MetaValue::Text(s) => iso::parse_length(s),
        MetaValue::Number(n) if *n >= 1.0 && n.fract() == 0.0 => {
            u32::try_from(*n as i64).ok().map(Length::from_minutes)
        }
        _ => None,
    }
}

fn meta_priority(v: &MetaValue) -> Option<Priority> {
    match v {
        MetaValue::Number(n) if n.fract() == 0.0 => Priority::from_ordinal(*n as i64),
        MetaValue::Text(s) => field_format::parse_priority(s),
        _ => None,
    }
}

/// Copy unreserved metadata into `extra`, without overriding what the text
/// itself says.
fn merge_metadata_extras(raw: &RawTask, extra: &mut BTreeMap<String, String>) {
    for (key, value) in &raw.metadata {
        let lower = key.to_ascii_lowercase();
        if field_format::is_reserved_key(key) || HOST_KEYS.contains(&lower.as_str()) {
            continue;
        }
        extra
            .entry(key.clone())
            .or_insert_with(|| value.to_string());
    }
}

// ---------------------------------------------------------------------------
// Title text
// ---------------------------------------------------------------------------

/// Split a string into title and tags. Every `#tag` preceded by whitespace
/// (or at the start) is a tag unless it is all digits, like `#3`.
pub fn parse_title_and_tags(s: &str) -> (String, BTreeSet<String>) {
    let mut tags = BTreeSet::new();
    let rest = TAG_RE.replace_all(s, |caps: &Captures| {
        let tag = &caps[2];
        if tag.chars().all(|c| c.is_ascii_digit()) {
            caps[0].to_string()
        } else {
            tags.insert(tag.to_string());
            caps[1].to_string()
        }
    });
    (collapse_whitespace(&rest), tags)
}

/// Replace `[[target|alias]]` with the alias (or target) and
/// `[label](url)` with the label.
pub fn strip_links(s: &str) -> String {
    let s = WIKILINK_RE.replace_all(s, |caps: &Captures| {
        match caps.get(2).map(|m| m.as_str()).filter(|alias| !alias.is_empty()) {
            Some(alias) => alias.to_string(),
            None => caps[1].to_string(),
        }
    });
    MDLINK_RE.replace_all(&s, "$1").into_owned()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Notes lines, dedented by their common indent, trailing blanks dropped
fn collect_notes<'a>(lines: impl Iterator<Item = &'a str>) -> String {
    let lines: Vec<&str> = lines.collect();
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    let mut out: Vec<&str> = lines
        .iter()
        .map(|l| l.get(indent..).unwrap_or_else(|| l.trim_start()))
        .collect();
    while out.last().is_some_and(|l| l.trim().is_empty()) {
        out.pop();
    }
    while out.first().is_some_and(|l| l.trim().is_empty()) {
        out.remove(0);
    }
    out.join("\n")
}
