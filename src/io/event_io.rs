use std::fs;
use std::path::Path;

use crate::io::vault_io::VaultError;
use crate::model::event::Event;

/// Read calendar events from a JSON array.
///
/// Every record is validated on the way in; one bad event fails the whole
/// file so a broken export is noticed rather than half-shown.
pub fn load_events(path: &Path) -> Result<Vec<Event>, VaultError> {
    let text = fs::read_to_string(path).map_err(|e| VaultError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let events: Vec<Event> =
        serde_json::from_str(&text).map_err(|e| VaultError::EventParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
    tracing::debug!(path = %path.display(), events = events.len(), "events loaded");
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_events() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.json");
        fs::write(
            &path,
            r#"[
  {"id": "standup", "start": "2024-01-01T09:00", "end": "2024-01-01T09:15", "title": "Standup", "calendar_id": "work"},
  {"id": "holiday", "start": "2024-01-01", "end": "2024-01-02", "title": "Holiday", "location": "home"}
]"#,
        )
        .unwrap();

        let events = load_events(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert!(!events[0].is_all_day());
        assert!(events[1].is_all_day());
        assert_eq!(events[1].location.as_deref(), Some("home"));
        assert_eq!(events[1].calendar_id, "");
    }

    #[test]
    fn test_invalid_event_fails_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.json");
        fs::write(
            &path,
            r#"[{"id": "x", "start": "2024-01-01T10:00", "end": "2024-01-01T09:00", "title": "Backwards"}]"#,
        )
        .unwrap();
        let err = load_events(&path).unwrap_err();
        assert!(matches!(err, VaultError::EventParseError { .. }));
        assert!(err.to_string().contains("ends before it starts"));
    }
}
