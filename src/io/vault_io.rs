use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use regex::Regex;
use tempfile::NamedTempFile;

use crate::model::config::Config;
use crate::model::task::{RawTask, Task, TaskId};
use crate::parse::field_format::FieldFormat;
use crate::parse::markdown::{indent_width, scan_document};
use crate::parse::task_parser::parse_checkbox;
use crate::parse::task_serializer::serialize_task_line;

/// Error type for vault I/O
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    WriteError { path: PathBuf, source: io::Error },
    #[error("invalid exclude pattern: {0}")]
    BadExclude(#[from] regex::Error),
    #[error("task {id} is stale: the line no longer holds a task")]
    StaleTask { id: TaskId },
    #[error("not a task id: {0}")]
    BadId(TaskId),
    #[error("could not parse .dayplan.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("could not edit .dayplan.toml: {0}")]
    ConfigEditError(#[from] toml_edit::TomlError),
    #[error("could not read events from {path}: {source}")]
    EventParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Scan every markdown file under `root` for checkbox tasks.
///
/// Files are visited in path order. Hidden files and directories are
/// skipped, as is any file whose vault-relative path matches
/// `config.vault.exclude`.
pub fn load_vault(root: &Path, config: &Config) -> Result<Vec<RawTask>, VaultError> {
    if !root.is_dir() {
        return Err(VaultError::NotADirectory(root.to_path_buf()));
    }
    let exclude = config.vault.exclude.as_deref().map(Regex::new).transpose()?;

    let mut files = Vec::new();
    collect_markdown(root, root, &mut files)?;
    files.sort();

    let mut raws = Vec::new();
    for rel in files {
        if let Some(re) = &exclude
            && re.is_match(&rel)
        {
            tracing::trace!(path = %rel, "excluded");
            continue;
        }
        let path = root.join(&rel);
        let text = fs::read_to_string(&path).map_err(|e| VaultError::ReadError {
            path: path.clone(),
            source: e,
        })?;
        let found = scan_document(&rel, &text);
        tracing::trace!(path = %rel, tasks = found.len(), "scanned");
        raws.extend(found);
    }

    tracing::debug!(root = %root.display(), tasks = raws.len(), "vault loaded");
    Ok(raws)
}

fn collect_markdown(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<(), VaultError> {
    let entries = fs::read_dir(dir).map_err(|e| VaultError::ReadError {
        path: dir.to_path_buf(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| VaultError::ReadError {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden {
            continue;
        }
        if path.is_dir() {
            collect_markdown(root, &path, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("md")
            && let Ok(rel) = path.strip_prefix(root)
        {
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write-back
// ---------------------------------------------------------------------------

/// Rewrite the line a task came from, in `format`.
///
/// The original indent and bullet are kept and notes below are left alone.
/// Fails with [`VaultError::StaleTask`] if that line is no longer a checkbox
/// item, which happens when the file changed since it was loaded.
pub fn save_task(root: &Path, task: &Task, format: FieldFormat) -> Result<(), VaultError> {
    let path = root.join(&task.path);
    let doc = Document::read(&path)?;
    let mut lines = doc.lines.clone();

    let line = lines
        .get(task.position.line)
        .ok_or_else(|| VaultError::StaleTask {
            id: task.id.clone(),
        })?;
    let cb = parse_checkbox(line).ok_or_else(|| VaultError::StaleTask {
        id: task.id.clone(),
    })?;
    let new_line = serialize_task_line(task, format, cb.indent, cb.bullet);
    tracing::debug!(id = %task.id, line = %new_line, "saving task");

    lines[task.position.line] = new_line;
    doc.write(&path, &lines)
}

/// Remove the given tasks from their files.
///
/// Each task takes its notes and everything nested under it along. Files
/// are rewritten once each, atomically.
pub fn delete_tasks(root: &Path, ids: &[TaskId]) -> Result<usize, VaultError> {
    let mut by_file: BTreeMap<&str, Vec<(usize, &TaskId)>> = BTreeMap::new();
    for id in ids {
        let (path, line) = id.parts().ok_or_else(|| VaultError::BadId(id.clone()))?;
        by_file.entry(path).or_default().push((line, id));
    }

    let mut removed = 0;
    for (rel, targets) in by_file {
        let path = root.join(rel);
        let doc = Document::read(&path)?;
        let mut keep = vec![true; doc.lines.len()];

        for (line, id) in targets {
            let text = doc
                .lines
                .get(line)
                .ok_or_else(|| VaultError::StaleTask { id: id.clone() })?;
            if parse_checkbox(text).is_none() {
                return Err(VaultError::StaleTask { id: id.clone() });
            }
            for flag in &mut keep[line..block_end(&doc.lines, line)] {
                *flag = false;
            }
        }

        let lines: Vec<String> = doc
            .lines
            .iter()
            .zip(&keep)
            .filter(|(_, k)| **k)
            .map(|(l, _)| l.clone())
            .collect();
        removed += doc.lines.len() - lines.len();
        doc.write(&path, &lines)?;
        tracing::debug!(path = %rel, "deleted tasks");
    }
    Ok(removed)
}

/// One past the last line belonging to the item at `start`: its notes and
/// nested items. Trailing blank lines stay with whatever follows.
fn block_end(lines: &[String], start: usize) -> usize {
    let indent = indent_width(&lines[start]);
    let mut end = start + 1;
    let mut last_content = start + 1;
    while end < lines.len() {
        let line = &lines[end];
        if !line.trim().is_empty() {
            if indent_width(line) <= indent {
                break;
            }
            last_content = end + 1;
        }
        end += 1;
    }
    last_content
}

/// File contents as lines, remembering the line ending style.
struct Document {
    lines: Vec<String>,
    eol: &'static str,
    trailing_newline: bool,
}

impl Document {
    fn read(path: &Path) -> Result<Self, VaultError> {
        let text = fs::read_to_string(path).map_err(|e| VaultError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Document {
            lines: text.lines().map(str::to_string).collect(),
            eol: if text.contains("\r\n") { "\r\n" } else { "\n" },
            trailing_newline: text.ends_with('\n'),
        })
    }

    fn write(&self, path: &Path, lines: &[String]) -> Result<(), VaultError> {
        let mut text = lines.join(self.eol);
        if self.trailing_newline && !lines.is_empty() {
            text.push_str(self.eol);
        }
        atomic_write(path, text.as_bytes()).map_err(|e| VaultError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Write `content` to `path` through a temp file in the same directory.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
