use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::util::iso::When;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    #[error("event {id}: start and end must both be dates or both be date-times")]
    MixedBounds { id: String },
    #[error("event {id}: ends before it starts")]
    EndBeforeStart { id: String },
}

/// A calendar event. Read-only; owned by the calendar side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EventRecord")]
pub struct Event {
    pub id: String,
    pub start: When,
    pub end: When,
    pub title: String,
    pub calendar_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Unvalidated wire shape of [`Event`]
#[derive(Deserialize)]
struct EventRecord {
    id: String,
    start: When,
    end: When,
    title: String,
    #[serde(default)]
    calendar_id: String,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    location: Option<String>,
}

impl TryFrom<EventRecord> for Event {
    type Error = EventError;

    fn try_from(r: EventRecord) -> Result<Self, Self::Error> {
        let mut event = Event::new(&r.id, r.start, r.end, &r.title, &r.calendar_id)?;
        event.notes = r.notes;
        event.location = r.location;
        Ok(event)
    }
}

impl Event {
    pub fn new(
        id: &str,
        start: When,
        end: When,
        title: &str,
        calendar_id: &str,
    ) -> Result<Self, EventError> {
        if start.is_date_only() != end.is_date_only() {
            return Err(EventError::MixedBounds { id: id.to_string() });
        }
        if end.start() < start.start() {
            return Err(EventError::EndBeforeStart { id: id.to_string() });
        }
        Ok(Event {
            id: id.to_string(),
            start,
            end,
            title: title.to_string(),
            calendar_id: calendar_id.to_string(),
            notes: None,
            location: None,
        })
    }

    pub fn is_all_day(&self) -> bool {
        self.start.is_date_only()
    }

    /// Span of a timed event. All-day events contribute no length.
    pub fn duration(&self) -> Duration {
        if self.is_all_day() {
            Duration::zero()
        } else {
            self.end.start() - self.start.start()
        }
    }

    /// Whether an all-day event covers `date`. The end date is exclusive,
    /// except that an event ending on its start date covers that one day.
    pub fn covers_date(&self, date: NaiveDate) -> bool {
        let first = self.start.date();
        let last = if self.end.date() > first {
            self.end.date().pred_opt().unwrap_or(first)
        } else {
            first
        };
        first <= date && date <= last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mixed_bounds() {
        let err = Event::new(
            "e1",
            "2024-01-01".parse().unwrap(),
            "2024-01-01T10:00".parse().unwrap(),
            "Standup",
            "work",
        )
        .unwrap_err();
        assert_eq!(err, EventError::MixedBounds { id: "e1".into() });
    }

    #[test]
    fn rejects_end_before_start() {
        let err = Event::new(
            "e1",
            "2024-01-01T10:00".parse().unwrap(),
            "2024-01-01T09:00".parse().unwrap(),
            "Standup",
            "work",
        )
        .unwrap_err();
        assert!(matches!(err, EventError::EndBeforeStart { .. }));
    }

    #[test]
    fn all_day_coverage_is_end_exclusive() {
        let e = Event::new(
            "trip",
            "2024-01-01".parse().unwrap(),
            "2024-01-03".parse().unwrap(),
            "Trip",
            "home",
        )
        .unwrap();
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        assert!(e.covers_date(d("2024-01-01")));
        assert!(e.covers_date(d("2024-01-02")));
        assert!(!e.covers_date(d("2024-01-03")));
        assert_eq!(e.duration(), Duration::zero());
    }

    #[test]
    fn deserialize_validates() {
        let ok: Event = serde_json::from_str(
            r#"{"id":"a","start":"2024-01-01T09:00","end":"2024-01-01T10:00","title":"Sync","calendar_id":"work"}"#,
        )
        .unwrap();
        assert_eq!(ok.duration(), Duration::minutes(60));

        let bad = serde_json::from_str::<Event>(
            r#"{"id":"a","start":"2024-01-01","end":"2024-01-01T10:00","title":"Sync"}"#,
        );
        assert!(bad.is_err());
    }
}
