//! Timestamp to position map of the keyframes in a range.
//!
//! Positions are stored relative to a moving base so that dropping buffers
//! from the front of a range only bumps the base instead of rewriting every
//! entry.

use std::collections::BTreeMap;
use std::ops::Bound;

use mediabuf_common::MediaTime;

#[derive(Debug, Clone, Default)]
pub(crate) struct KeyframeIndex {
    positions: BTreeMap<MediaTime, usize>,
    base: usize,
}

impl KeyframeIndex {
    /// Record a keyframe at buffer `index`. A second keyframe with the same
    /// timestamp keeps the first entry.
    pub(crate) fn insert(&mut self, timestamp: MediaTime, index: usize) {
        self.positions.entry(timestamp).or_insert(index + self.base);
    }

    pub(crate) fn len(&self) -> usize {
        self.positions.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.positions.clear();
    }

    /// First keyframe at or after `timestamp` (strictly after when `exclusive`).
    pub(crate) fn first_from(
        &self,
        timestamp: MediaTime,
        exclusive: bool,
    ) -> Option<(MediaTime, usize)> {
        let lower = if exclusive {
            Bound::Excluded(timestamp)
        } else {
            Bound::Included(timestamp)
        };
        self.positions
            .range((lower, Bound::Unbounded))
            .next()
            .map(|(ts, pos)| (*ts, pos - self.base))
    }

    /// Keyframe a seek to `timestamp` lands on: the last one at or before
    /// it, or the first keyframe when all of them lie after it.
    pub(crate) fn at_or_before(&self, timestamp: MediaTime) -> Option<(MediaTime, usize)> {
        self.positions
            .range(..=timestamp)
            .next_back()
            .or_else(|| self.positions.iter().next())
            .map(|(ts, pos)| (*ts, pos - self.base))
    }

    /// Buffer index of the n'th keyframe.
    pub(crate) fn nth_index(&self, n: usize) -> Option<usize> {
        self.positions.values().nth(n).map(|pos| pos - self.base)
    }

    /// Buffer index of the last keyframe.
    pub(crate) fn last_index(&self) -> Option<usize> {
        self.positions.values().next_back().map(|pos| pos - self.base)
    }

    pub(crate) fn pop_first(&mut self) -> Option<(MediaTime, usize)> {
        let base = self.base;
        self.positions.pop_first().map(|(ts, pos)| (ts, pos - base))
    }

    pub(crate) fn pop_last(&mut self) -> Option<(MediaTime, usize)> {
        let base = self.base;
        self.positions.pop_last().map(|(ts, pos)| (ts, pos - base))
    }

    /// Drop every keyframe at buffer `index` or later.
    pub(crate) fn truncate_from(&mut self, index: usize) {
        let limit = index + self.base;
        self.positions.retain(|_, pos| *pos < limit);
    }

    /// Account for `count` buffers removed from the front.
    pub(crate) fn advance_base(&mut self, count: usize) {
        self.base += count;
    }

    pub(crate) fn timestamps(&self) -> impl Iterator<Item = MediaTime> + '_ {
        self.positions.keys().copied()
    }
}
