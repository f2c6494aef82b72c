use std::collections::BTreeMap;

use indexmap::IndexMap;
use sha2::{Digest, Sha256};

use crate::model::task::{RawTask, Task, TaskId};
use crate::parse::task_parser::{ParseContext, parse_task};

/// The current set of parsed tasks.
///
/// Tasks are rebuilt from scratch on every reload that sees new input. The
/// collapsed map belongs to the UI and survives reloads untouched, even for
/// ids that disappear.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: IndexMap<TaskId, Task>,
    fingerprint: Option<String>,
    collapsed: BTreeMap<TaskId, bool>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collapsed(collapsed: BTreeMap<TaskId, bool>) -> Self {
        TaskStore {
            collapsed,
            ..Self::default()
        }
    }

    /// Reparse `raws` unless they match the last input. Returns whether the
    /// task set was replaced.
    pub fn reload(&mut self, raws: &[RawTask], ctx: &ParseContext) -> bool {
        let print = fingerprint(raws, ctx);
        if self.fingerprint.as_deref() == Some(print.as_str()) {
            tracing::debug!(fingerprint = %print, "input unchanged, skipping reparse");
            return false;
        }

        self.tasks = raws
            .iter()
            .map(|raw| {
                let task = parse_task(raw, ctx);
                (task.id.clone(), task)
            })
            .collect();
        tracing::debug!(tasks = self.tasks.len(), fingerprint = %print, "reloaded tasks");
        self.fingerprint = Some(print);
        true
    }

    /// Drop the fingerprint so the next reload reparses.
    pub fn invalidate(&mut self) {
        self.fingerprint = None;
    }

    pub fn tasks(&self) -> &IndexMap<TaskId, Task> {
        &self.tasks
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    pub fn collapsed(&self) -> &BTreeMap<TaskId, bool> {
        &self.collapsed
    }

    pub fn is_collapsed(&self, id: &TaskId) -> bool {
        self.collapsed.get(id).copied().unwrap_or(false)
    }

    /// Flip the collapsed flag of `id`, returning the new value.
    pub fn toggle_collapsed(&mut self, id: &TaskId) -> bool {
        let flag = self.collapsed.entry(id.clone()).or_insert(false);
        *flag = !*flag;
        *flag
    }
}

/// SHA-256 over the parse settings and every raw record, hex encoded.
pub fn fingerprint(raws: &[RawTask], ctx: &ParseContext) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ctx.field_format.name().as_bytes());
    if let Some(daily) = ctx.daily_notes {
        hasher.update(daily.folder.as_bytes());
        hasher.update(daily.format.as_bytes());
    }
    for raw in raws {
        match serde_json::to_vec(raw) {
            Ok(bytes) => hasher.update(&bytes),
            Err(_) => hasher.update(raw.text.as_bytes()),
        }
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
