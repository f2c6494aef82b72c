use std::sync::LazyLock;

use regex::Regex;

use crate::model::task::{Position, RawTask};
use crate::parse::task_parser::parse_checkbox;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s+(.*?)\s*#*\s*$").unwrap());

static PAGE_FLAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^page:\s*(true|yes)\s*$").unwrap());

/// Find every checkbox item in a markdown document.
///
/// Nesting is inferred from indentation: an item belongs to the nearest
/// preceding item with a smaller indent. Lines indented under an item that
/// are not checkbox items themselves become that item's notes. Fenced code
/// blocks and YAML frontmatter are skipped.
pub fn scan_document(path: &str, text: &str) -> Vec<RawTask> {
    let lines: Vec<&str> = text.lines().collect();
    let (body_start, page) = frontmatter(&lines);

    let mut tasks: Vec<RawTask> = Vec::new();
    // (indent width, index into `tasks`)
    let mut stack: Vec<(usize, usize)> = Vec::new();
    let mut heading: Option<String> = None;
    let mut fence: Option<&str> = None;

    for (idx, &line) in lines.iter().enumerate().skip(body_start) {
        let trimmed = line.trim_start();

        if let Some(marker) = fence {
            if trimmed.starts_with(marker) {
                fence = None;
            }
            attach_note(&mut tasks, &stack, line, indent_width(line));
            continue;
        }
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            fence = Some(&trimmed[..3]);
            attach_note(&mut tasks, &stack, line, indent_width(line));
            if indent_width(line) == 0 {
                stack.clear();
            }
            continue;
        }

        if let Some(caps) = HEADING_RE.captures(line) {
            heading = Some(caps[1].to_string());
            stack.clear();
            continue;
        }

        if line.trim().is_empty() {
            if let Some(&(_, i)) = stack.last() {
                tasks[i].text.push('\n');
            }
            continue;
        }

        let width = indent_width(line);
        while stack.last().is_some_and(|(w, _)| *w >= width) {
            stack.pop();
        }

        if let Some(cb) = parse_checkbox(line) {
            let parent = stack.last().map(|&(_, i)| i);
            let parent_line = parent.map(|p| tasks[p].position.line);
            let index = tasks.len();
            if let Some(p) = parent {
                tasks[p].children.push(idx);
            }
            tasks.push(RawTask {
                text: line.to_string(),
                path: path.to_string(),
                position: Position {
                    line: idx,
                    col: cb.indent.len(),
                },
                heading: heading.clone(),
                parent: parent_line,
                page,
                ..Default::default()
            });
            stack.push((width, index));
        } else if let Some(&(_, i)) = stack.last() {
            tasks[i].text.push('\n');
            tasks[i].text.push_str(line);
        }
    }

    tasks
}

fn attach_note(tasks: &mut [RawTask], stack: &[(usize, usize)], line: &str, width: usize) {
    if let Some(&(w, i)) = stack.last()
        && width > w
    {
        tasks[i].text.push('\n');
        tasks[i].text.push_str(line);
    }
}

/// Indent in columns; a tab counts as 4.
pub(crate) fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// Index of the first body line, and whether frontmatter sets `page: true`.
fn frontmatter(lines: &[&str]) -> (usize, bool) {
    if lines.first().map(|l| l.trim_end()) != Some("---") {
        return (0, false);
    }
    match lines.iter().skip(1).position(|l| l.trim_end() == "---") {
        Some(end) => {
            let page = lines[1..=end].iter().any(|l| PAGE_FLAG_RE.is_match(l.trim()));
            (end + 2, page)
        }
        None => (0, false),
    }
}
