//! Trailing time window over timestamped entries

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Entries older than `span` relative to the latest prune instant drop out
///
/// An entry stamped exactly `now - span` is already outside the window.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    span: Duration,
    entries: VecDeque<(DateTime<Utc>, T)>,
}

impl<T> RollingWindow<T> {
    pub fn new(span: Duration) -> Self {
        Self {
            span,
            entries: VecDeque::new(),
        }
    }

    pub fn span(&self) -> Duration {
        self.span
    }

    pub fn push(&mut self, at: DateTime<Utc>, item: T) {
        self.entries.push_back((at, item));
    }

    /// Drop entries at or before `now - span`; returns how many were dropped
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.span;
        let before = self.entries.len();
        self.entries.retain(|(at, _)| *at > cutoff);
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, item)| item)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
