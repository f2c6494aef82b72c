use crate::model::task::Task;
use crate::parse::field_format::FieldFormat;

/// Serialize a task to a single checkbox line in the given format.
///
/// Layout: `- [s] Title #tag… [extra:: value]… <format fields>`. Notes are
/// not written; the caller keeps them. Extra fields are emitted sorted by
/// key. Empty and default-valued fields are left out.
pub fn serialize_task(task: &Task, format: FieldFormat) -> String {
    let mut parts = vec![format!("- [{}]", task.status)];

    if !task.original_title.is_empty() {
        parts.push(task.original_title.clone());
    }

    for tag in &task.tags {
        parts.push(format!("#{}", tag));
    }

    for (key, value) in &task.extra_fields {
        parts.push(format!("[{}:: {}]", key, value));
    }

    parts.extend(format.serialize_fields(task));
    parts.join(" ")
}

/// Serialize a task, keeping the indent and bullet of the line it replaces.
pub fn serialize_task_line(task: &Task, format: FieldFormat, indent: &str, bullet: &str) -> String {
    let line = serialize_task(task, format);
    let rest = line.strip_prefix('-').unwrap_or(&line);
    format!("{}{}{}", indent, bullet, rest)
}
