use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::io::vault_io::atomic_write;
use crate::model::task::TaskId;

/// UI state file name at the vault root
pub const STATE_FILE: &str = ".dayplan-state.json";

/// Persisted UI state (written to .dayplan-state.json)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiState {
    /// Collapsed flag per task; entries outlive the tasks they name
    #[serde(default)]
    pub collapsed: BTreeMap<TaskId, bool>,
}

/// Read the state file. Missing or unreadable state is treated as none.
pub fn read_ui_state(root: &Path) -> Option<UiState> {
    let content = fs::read_to_string(root.join(STATE_FILE)).ok()?;
    match serde_json::from_str(&content) {
        Ok(state) => Some(state),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring malformed {}", STATE_FILE);
            None
        }
    }
}

pub fn write_ui_state(root: &Path, state: &UiState) -> Result<(), std::io::Error> {
    let content = serde_json::to_string_pretty(state)?;
    atomic_write(&root.join(STATE_FILE), content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_and_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let state = UiState {
            collapsed: BTreeMap::from([
                (TaskId::new("day.md", 3), true),
                (TaskId::new("day.md", 9), false),
            ]),
        };
        write_ui_state(dir.path(), &state).unwrap();

        let raw = fs::read_to_string(dir.path().join(STATE_FILE)).unwrap();
        assert!(raw.contains("\"day.md::3\": true"));
        assert_eq!(read_ui_state(dir.path()), Some(state));
    }

    #[test]
    fn write_replaces_previous_state() {
        let dir = TempDir::new().unwrap();
        let many = UiState {
            collapsed: (0..50).map(|i| (TaskId::new("day.md", i), true)).collect(),
        };
        write_ui_state(dir.path(), &many).unwrap();
        let one = UiState {
            collapsed: BTreeMap::from([(TaskId::new("day.md", 1), false)]),
        };
        write_ui_state(dir.path(), &one).unwrap();

        assert_eq!(read_ui_state(dir.path()), Some(one));
        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn read_missing_file_returns_none() {
        let dir = TempDir::new().unwrap();
        assert!(read_ui_state(dir.path()).is_none());
    }

    #[test]
    fn read_malformed_json_returns_none() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(STATE_FILE), "not json {{{").unwrap();
        assert!(read_ui_state(dir.path()).is_none());
    }

    #[test]
    fn empty_object_uses_defaults() {
        let state: UiState = serde_json::from_str("{}").unwrap();
        assert!(state.collapsed.is_empty());
    }
}
