use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime};

use crate::model::event::Event;
use crate::model::task::Task;
use crate::ops::classify::Bucket;

/// A bucket with a resolved time span and the buckets that overlap it
#[derive(Debug, Clone, PartialEq)]
pub struct Block<'a> {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub tasks: Vec<&'a Task>,
    pub events: Vec<&'a Event>,
    pub nested: Vec<Block<'a>>,
}

impl Block<'_> {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn is_zero_width(&self) -> bool {
        self.end == self.start
    }
}

/// Turn time buckets into blocks.
///
/// A bucket spans the summed length of its events and tasks. Buckets that
/// start inside that span nest under it instead of following it. With
/// `extend` set, a bucket with no length stretches to the next block (or
/// `window_end`). Buckets given twice for one instant are merged.
pub fn resolve_blocks<'a, I>(buckets: I, window_end: NaiveDateTime, extend: bool) -> Vec<Block<'a>>
where
    I: IntoIterator<Item = (NaiveDateTime, Bucket<'a>)>,
{
    let mut merged: BTreeMap<NaiveDateTime, Bucket<'a>> = BTreeMap::new();
    for (at, bucket) in buckets {
        let slot = merged.entry(at).or_default();
        slot.tasks.extend(bucket.tasks);
        slot.events.extend(bucket.events);
    }
    let items: Vec<(NaiveDateTime, Bucket<'a>)> =
        merged.into_iter().filter(|(_, b)| !b.is_empty()).collect();

    resolve(&items, window_end, extend)
}

fn resolve<'a>(
    items: &[(NaiveDateTime, Bucket<'a>)],
    window_end: NaiveDateTime,
    extend: bool,
) -> Vec<Block<'a>> {
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < items.len() {
        let (start, bucket) = &items[i];
        let natural_end = start
            .checked_add_signed(span(bucket))
            .unwrap_or(NaiveDateTime::MAX);

        let mut next = i + 1;
        while next < items.len() && items[next].0 < natural_end {
            next += 1;
        }
        let nested = resolve(&items[i + 1..next], natural_end, extend);

        let mut end = natural_end;
        if extend && natural_end == *start {
            end = items.get(next).map_or(window_end, |(at, _)| *at);
        }

        blocks.push(Block {
            start: *start,
            end: end.max(natural_end),
            tasks: bucket.tasks.clone(),
            events: bucket.events.clone(),
            nested,
        });
        i = next;
    }

    blocks
}

/// Summed length of everything in the bucket.
fn span(bucket: &Bucket<'_>) -> Duration {
    let events = bucket
        .events
        .iter()
        .fold(Duration::zero(), |acc, e| acc + e.duration());
    bucket
        .tasks
        .iter()
        .filter_map(|t| t.length)
        .fold(events, |acc, l| acc + l.as_duration())
}
