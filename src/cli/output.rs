use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::model::event::Event;
use crate::model::task::{Priority, Task, TaskId};
use crate::ops::blocks::Block;
use crate::ops::classify::Classification;
use crate::ops::forest::TaskNode;
use crate::util::iso::{format_length, format_time, to_iso};
use crate::util::unicode::truncate_to_width;

/// Widest title printed in list views
const TITLE_CELLS: usize = 60;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TaskJson {
    pub id: String,
    pub title: String,
    pub status: String,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<String>,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat: Option<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
    pub path: String,
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<TaskJson>,
}

#[derive(Serialize)]
pub struct EventJson {
    pub id: String,
    pub title: String,
    pub start: String,
    pub end: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub calendar_id: String,
}

#[derive(Serialize)]
pub struct BlockJson {
    pub start: String,
    pub end: String,
    pub tasks: Vec<TaskJson>,
    pub events: Vec<EventJson>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<BlockJson>,
}

#[derive(Serialize)]
pub struct DayJson {
    pub date: String,
    pub now: String,
    pub past: Vec<TaskJson>,
    pub all_day: Vec<TaskJson>,
    pub all_day_events: Vec<EventJson>,
    pub blocks: Vec<BlockJson>,
    pub upcoming: Vec<TaskJson>,
    pub excluded: usize,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn task_to_json(task: &Task) -> TaskJson {
    let date = |d: Option<NaiveDate>| d.map(|d| d.format("%Y-%m-%d").to_string());
    TaskJson {
        id: task.id.to_string(),
        title: task.title.clone(),
        status: task.status.to_string(),
        completed: task.completed(),
        scheduled: task.scheduled.map(|w| w.to_string()),
        due: date(task.due),
        start: date(task.start),
        created: date(task.created),
        completion: date(task.completion),
        length: task.length.map(format_length),
        priority: task.priority,
        repeat: task.repeat.clone(),
        tags: task.tags.iter().cloned().collect(),
        extra: task.extra_fields.clone(),
        path: task.path.clone(),
        line: task.position.line,
        heading: task.heading.clone(),
        notes: (!task.notes.is_empty()).then(|| task.notes.clone()),
        collapsed: None,
        subtasks: Vec::new(),
    }
}

pub fn event_to_json(event: &Event) -> EventJson {
    EventJson {
        id: event.id.clone(),
        title: event.title.clone(),
        start: event.start.to_string(),
        end: event.end.to_string(),
        calendar_id: event.calendar_id.clone(),
    }
}

pub fn block_to_json(block: &Block<'_>) -> BlockJson {
    BlockJson {
        start: to_iso(block.start),
        end: to_iso(block.end),
        tasks: block.tasks.iter().map(|t| task_to_json(t)).collect(),
        events: block.events.iter().map(|e| event_to_json(e)).collect(),
        nested: block.nested.iter().map(block_to_json).collect(),
    }
}

pub fn node_to_json(node: &TaskNode<'_>, collapsed: &BTreeMap<TaskId, bool>) -> TaskJson {
    let mut tj = task_to_json(node.task);
    tj.collapsed = collapsed.get(&node.task.id).copied();
    tj.subtasks = node
        .subtasks
        .iter()
        .map(|n| node_to_json(n, collapsed))
        .collect();
    tj
}

pub fn day_to_json(
    date: NaiveDate,
    now: NaiveDateTime,
    c: &Classification<'_>,
    blocks: &[Block<'_>],
) -> DayJson {
    let tasks = |v: &[&Task]| v.iter().map(|t| task_to_json(t)).collect();
    DayJson {
        date: date.format("%Y-%m-%d").to_string(),
        now: to_iso(now),
        past: tasks(&c.past),
        all_day: tasks(&c.all_day),
        all_day_events: c.all_day_events.iter().map(|e| event_to_json(e)).collect(),
        blocks: blocks.iter().map(block_to_json).collect(),
        upcoming: tasks(&c.upcoming),
        excluded: c.excluded.len(),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// `[ ] Title #tag ~30m due 2024-01-05 !high  (path::line)`
pub fn format_task_line(task: &Task) -> String {
    let mut line = format!(
        "[{}] {}",
        task.status,
        truncate_to_width(&task.title, TITLE_CELLS)
    );
    for tag in &task.tags {
        line.push_str(&format!(" #{}", tag));
    }
    if let Some(length) = task.length {
        line.push_str(&format!(" ~{}", format_length(length)));
    }
    if let Some(due) = task.due {
        line.push_str(&format!(" due {}", due.format("%Y-%m-%d")));
    }
    if task.priority != Priority::Default {
        line.push_str(&format!(" !{}", task.priority.name()));
    }
    line.push_str(&format!("  ({})", task.id));
    line
}

/// Detailed single-task view
pub fn format_task_detail(task: &Task) -> Vec<String> {
    let mut lines = vec![format!("[{}] {}", task.status, task.title)];
    lines.push(format!("id: {}", task.id));
    match &task.heading {
        Some(h) => lines.push(format!("in: {} > {}", task.path, h)),
        None => lines.push(format!("in: {}", task.path)),
    }

    let mut field = |name: &str, value: Option<String>| {
        if let Some(v) = value {
            lines.push(format!("{}: {}", name, v));
        }
    };
    let date = |d: Option<NaiveDate>| d.map(|d| d.format("%Y-%m-%d").to_string());
    field("scheduled", task.scheduled.map(|w| w.to_string()));
    field("length", task.length.map(format_length));
    field("due", date(task.due));
    field("start", date(task.start));
    field("created", date(task.created));
    field("completion", date(task.completion));
    field(
        "priority",
        (task.priority != Priority::Default).then(|| task.priority.name().to_string()),
    );
    field("repeat", task.repeat.clone());
    field(
        "tags",
        (!task.tags.is_empty()).then(|| {
            task.tags
                .iter()
                .map(|t| format!("#{}", t))
                .collect::<Vec<_>>()
                .join(" ")
        }),
    );
    for (key, value) in &task.extra_fields {
        lines.push(format!("{}: {}", key, value));
    }
    if let Some(parent) = &task.parent {
        lines.push(format!("parent: {}", parent));
    }

    if !task.notes.is_empty() {
        lines.push("notes:".to_string());
        for line in task.notes.lines() {
            lines.push(format!("  {}", line));
        }
    }
    lines
}

/// Forest as an indented outline. Subtasks of collapsed tasks are hidden
/// unless `all` is set; a collapsed parent is marked with `+`.
pub fn format_tree(
    nodes: &[TaskNode<'_>],
    collapsed: &BTreeMap<TaskId, bool>,
    all: bool,
) -> Vec<String> {
    fn walk(
        nodes: &[TaskNode<'_>],
        depth: usize,
        collapsed: &BTreeMap<TaskId, bool>,
        all: bool,
        out: &mut Vec<String>,
    ) {
        for node in nodes {
            let hidden = !all
                && !node.subtasks.is_empty()
                && collapsed.get(&node.task.id).copied().unwrap_or(false);
            let marker = if hidden { "+ " } else { "" };
            out.push(format!(
                "{}{}{}",
                "  ".repeat(depth),
                marker,
                format_task_line(node.task)
            ));
            if !hidden {
                walk(&node.subtasks, depth + 1, collapsed, all, out);
            }
        }
    }
    let mut out = Vec::new();
    walk(nodes, 0, collapsed, all, &mut out);
    out
}

/// The day view: past, all-day, timeline blocks, upcoming.
pub fn format_day(date: NaiveDate, c: &Classification<'_>, blocks: &[Block<'_>]) -> Vec<String> {
    let mut lines = vec![format!("== {} ==", date.format("%Y-%m-%d (%a)"))];

    let mut section = |title: &str, body: Vec<String>| {
        if !body.is_empty() {
            lines.push(String::new());
            lines.push(format!("-- {} --", title));
            lines.extend(body);
        }
    };

    section("Past", c.past.iter().map(|t| format_task_line(t)).collect());

    let mut all_day: Vec<String> = c
        .all_day_events
        .iter()
        .map(|e| format!("* {}", e.title))
        .collect();
    all_day.extend(c.all_day.iter().map(|t| format_task_line(t)));
    section("All day", all_day);

    let mut timeline = Vec::new();
    for block in blocks {
        format_block(block, date, 0, &mut timeline);
    }
    section("Timeline", timeline);

    section(
        "Upcoming",
        c.upcoming.iter().map(|t| format_task_line(t)).collect(),
    );

    lines
}

fn format_block(block: &Block<'_>, day: NaiveDate, depth: usize, out: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    let span = if block.is_zero_width() {
        clock(block.start, day)
    } else {
        format!("{}-{}", clock(block.start, day), clock(block.end, day))
    };
    out.push(format!("{}{}", indent, span));
    for event in &block.events {
        out.push(format!("{}  * {}", indent, event.title));
    }
    for task in &block.tasks {
        out.push(format!("{}  {}", indent, format_task_line(task)));
    }
    for nested in &block.nested {
        format_block(nested, day, depth + 1, out);
    }
}

/// `HH:mm` on the shown day, the full ISO form otherwise.
fn clock(at: NaiveDateTime, day: NaiveDate) -> String {
    if at.date() == day {
        format_time(at.time())
    } else {
        to_iso(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::iso::When;

    fn task() -> Task {
        let mut t = Task::new("inbox.md", 4, "Buy milk");
        t.scheduled = Some("2024-01-01T09:00".parse().unwrap());
        t.length = Some(crate::model::task::Length { hour: 0, minute: 30 });
        t.tags.insert("errand".to_string());
        t
    }

    #[test]
    fn test_task_line() {
        insta::assert_snapshot!(format_task_line(&task()), @"[ ] Buy milk #errand ~30m  (inbox.md::4)");
    }

    #[test]
    fn test_task_json_skips_empty_fields() {
        let json = serde_json::to_value(task_to_json(&task())).unwrap();
        assert_eq!(json["scheduled"], "2024-01-01T09:00");
        assert_eq!(json["length"], "30m");
        assert_eq!(json["priority"], "default");
        assert!(json.get("due").is_none());
        assert!(json.get("subtasks").is_none());
    }

    #[test]
    fn test_block_lines() {
        let t = task();
        let at = |s: &str| s.parse::<When>().unwrap().start();
        let block = Block {
            start: at("2024-01-01T09:00"),
            end: at("2024-01-01T09:30"),
            tasks: vec![&t],
            events: Vec::new(),
            nested: vec![Block {
                start: at("2024-01-01T09:15"),
                end: at("2024-01-01T09:15"),
                tasks: vec![&t],
                events: Vec::new(),
                nested: Vec::new(),
            }],
        };
        let mut out = Vec::new();
        format_block(&block, at("2024-01-01").date(), 0, &mut out);
        assert_eq!(
            out,
            vec![
                "09:00-09:30",
                "  [ ] Buy milk #errand ~30m  (inbox.md::4)",
                "  09:15",
                "    [ ] Buy milk #errand ~30m  (inbox.md::4)",
            ]
        );
    }
}
