use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::model::event::Event;
use crate::model::task::{Task, TaskId};
use crate::util::iso::When;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    #[error("window ends ({end}) before it starts ({start})")]
    InvalidWindow {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

/// Half-open display window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl Window {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, ClassifyError> {
        if end < start {
            return Err(ClassifyError::InvalidWindow { start, end });
        }
        Ok(Window { start, end })
    }

    /// The whole calendar day `date`.
    pub fn day(date: NaiveDate) -> Self {
        let start = date.and_time(NaiveTime::MIN);
        let end = date.succ_opt().map_or(start, |d| d.and_time(NaiveTime::MIN));
        Window { start, end }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.start <= at && at < self.end
    }

    /// Whether the window is the one containing the present moment.
    pub fn is_now(&self, now: NaiveDateTime) -> bool {
        self.start <= now && now <= self.end
    }

    /// Whether any part of calendar day `date` falls inside the window. An
    /// empty window covers the day it sits on.
    pub fn covers_date(&self, date: NaiveDate) -> bool {
        if self.start == self.end {
            return date == self.start.date();
        }
        let day_start = date.and_time(NaiveTime::MIN);
        let after_start = date
            .succ_opt()
            .is_none_or(|next| next.and_time(NaiveTime::MIN) > self.start);
        day_start < self.end && after_start
    }

    /// Calendar days the window touches, in order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let first = self.start.date();
        let last = if self.end > self.start {
            (self.end - Duration::minutes(1)).date()
        } else {
            first
        };
        first.iter_days().take_while(move |d| *d <= last)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyOptions {
    pub now: NaiveDateTime,
    /// Browsing backwards: show completed work instead of open work
    pub past_mode: bool,
    /// Keep completed tasks of the shown day(s) in the live view
    pub show_completed: bool,
}

/// Tasks and events sharing one exact start instant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bucket<'a> {
    pub tasks: Vec<&'a Task>,
    pub events: Vec<&'a Event>,
}

impl Bucket<'_> {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.events.is_empty()
    }
}

/// Every input task lands in exactly one of `past`, `all_day`, `upcoming`,
/// a time bucket, or `excluded`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification<'a> {
    pub past: Vec<&'a Task>,
    pub all_day: Vec<&'a Task>,
    pub upcoming: Vec<&'a Task>,
    pub all_day_events: Vec<&'a Event>,
    pub time_buckets: BTreeMap<NaiveDateTime, Bucket<'a>>,
    pub excluded: Vec<TaskId>,
}

impl Classification<'_> {
    /// Number of tasks placed in a visible section.
    pub fn placed(&self) -> usize {
        self.past.len()
            + self.all_day.len()
            + self.upcoming.len()
            + self
                .time_buckets
                .values()
                .map(|b| b.tasks.len())
                .sum::<usize>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Past,
    AllDay,
    Time(NaiveDateTime),
    Upcoming,
    Excluded,
}

/// Sort tasks and events of one window into display sections.
///
/// Pure: the result depends only on the arguments. Lists are ordered by
/// file and line; time buckets by instant.
pub fn classify<'a, T, E>(
    tasks: T,
    events: E,
    window: &Window,
    opts: &ClassifyOptions,
) -> Classification<'a>
where
    T: IntoIterator<Item = &'a Task>,
    E: IntoIterator<Item = &'a Event>,
{
    let is_now = window.is_now(opts.now);
    let mut out = Classification::default();

    for task in tasks {
        match place(task, window, opts, is_now) {
            Placement::Past => out.past.push(task),
            Placement::AllDay => out.all_day.push(task),
            Placement::Time(at) => out.time_buckets.entry(at).or_default().tasks.push(task),
            Placement::Upcoming => out.upcoming.push(task),
            Placement::Excluded => out.excluded.push(task.id.clone()),
        }
    }

    for event in events {
        if event.is_all_day() {
            if window.dates().any(|d| event.covers_date(d)) {
                out.all_day_events.push(event);
            }
            continue;
        }

        let (start, end) = (event.start.start(), event.end.start());
        let overlaps = if start == end {
            window.contains(start)
        } else {
            start < window.end && end > window.start
        };
        if !overlaps {
            continue;
        }
        if is_now {
            let visible = if opts.past_mode {
                start < opts.now
            } else {
                end > opts.now
            };
            if !visible {
                continue;
            }
        }
        out.time_buckets.entry(start).or_default().events.push(event);
    }

    let by_source = |a: &&Task, b: &&Task| a.source_key().cmp(&b.source_key());
    out.past.sort_by(by_source);
    out.all_day.sort_by(by_source);
    out.upcoming.sort_by(by_source);
    out.excluded.sort();
    out.all_day_events
        .sort_by(|a, b| (a.start.start(), &a.id).cmp(&(b.start.start(), &b.id)));
    for bucket in out.time_buckets.values_mut() {
        bucket.tasks.sort_by(by_source);
        bucket.events
            .sort_by(|a, b| (a.end.start(), &a.id).cmp(&(b.end.start(), &b.id)));
    }

    out
}

fn place(task: &Task, window: &Window, opts: &ClassifyOptions, is_now: bool) -> Placement {
    // In past mode a finished task without a schedule sits on its completion day.
    let anchor = match task.scheduled {
        Some(s) => Some(s),
        None if opts.past_mode && task.due.is_none() => task.completion.map(When::Date),
        None => None,
    };

    if anchor.is_none() && task.due.is_none() {
        return Placement::Excluded;
    }
    if task.query_parent.is_some() {
        return Placement::Excluded;
    }
    if task.completed() != opts.past_mode {
        let same_day = opts.show_completed
            && !opts.past_mode
            && task
                .effective_date()
                .is_some_and(|w| window.covers_date(w.date()));
        if !same_day {
            return Placement::Excluded;
        }
    }

    if is_now && let Some(s) = anchor {
        let past = if opts.past_mode {
            s.start() >= window.end
        } else {
            !task.completed() && starts_before(s, window)
        };
        if past {
            return Placement::Past;
        }
    }

    if let Some(s) = anchor {
        match s {
            When::DateTime(at) if window.contains(at) => return Placement::Time(at),
            _ if window.covers_date(s.date()) => return Placement::AllDay,
            _ => {}
        }
    }

    if let Some(due) = task.due
        && (due >= window.start.date() || is_now)
        && task.scheduled.is_none_or(|s| s.start() < window.start)
    {
        return Placement::Upcoming;
    }

    Placement::Excluded
}

/// A whole day counts as before the window only when the day itself is.
fn starts_before(when: When, window: &Window) -> bool {
    match when {
        When::Date(d) => d < window.start.date(),
        When::DateTime(at) => at < window.start,
    }
}
