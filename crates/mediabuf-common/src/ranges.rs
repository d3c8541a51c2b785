//! Ordered sets of disjoint time intervals.
//!
//! `TimeRanges` is what a buffering stream reports as "buffered": a sorted list
//! of half-open `[start, end)` intervals with no two intervals overlapping or
//! touching.

use crate::time::MediaTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A sorted set of disjoint half-open time intervals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeRanges {
    ranges: Vec<(MediaTime, MediaTime)>,
}

impl TimeRanges {
    /// Create an empty set.
    pub fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Add `[start, end)`, merging with any interval it overlaps or touches.
    ///
    /// Empty intervals are ignored. Returns the number of intervals afterwards.
    pub fn add(&mut self, start: MediaTime, end: MediaTime) -> usize {
        if start == end {
            return self.ranges.len();
        }
        assert!(start < end, "interval start {} is after end {}", start, end);

        let mut i = 0;
        while i < self.ranges.len() && self.ranges[i].1 < start {
            i += 1;
        }

        if i == self.ranges.len() {
            self.ranges.push((start, end));
            return self.ranges.len();
        }

        if end < self.ranges[i].0 {
            self.ranges.insert(i, (start, end));
            return self.ranges.len();
        }

        // Overlaps (or touches) the i'th interval: widen it, then absorb
        // any followers the widened interval now reaches.
        let current = &mut self.ranges[i];
        current.0 = current.0.min(start);
        current.1 = current.1.max(end);

        while i + 1 < self.ranges.len() && self.ranges[i + 1].0 <= self.ranges[i].1 {
            self.ranges[i].1 = self.ranges[i].1.max(self.ranges[i + 1].1);
            self.ranges.remove(i + 1);
        }

        self.ranges.len()
    }

    /// Number of disjoint intervals.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// True if no interval is present.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Start of the i'th interval.
    pub fn start(&self, i: usize) -> MediaTime {
        self.ranges[i].0
    }

    /// End (exclusive) of the i'th interval.
    pub fn end(&self, i: usize) -> MediaTime {
        self.ranges[i].1
    }

    /// Iterate over `(start, end)` pairs in time order.
    pub fn iter(&self) -> impl Iterator<Item = (MediaTime, MediaTime)> + '_ {
        self.ranges.iter().copied()
    }

    /// Remove every interval.
    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    /// Intervals covered by both `self` and `other`.
    pub fn intersection_with(&self, other: &TimeRanges) -> TimeRanges {
        let mut result = TimeRanges::new();
        let (mut i, mut j) = (0, 0);

        while i < self.len() && j < other.len() {
            let max_start = self.start(i).max(other.start(j));
            let min_end = self.end(i).min(other.end(j));

            if max_start < min_end {
                result.add(max_start, min_end);
            }

            if self.end(i) < other.end(j) {
                i += 1;
            } else {
                j += 1;
            }
        }

        result
    }
}

impl fmt::Display for TimeRanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (start, end)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "[{}, {})", start, end)?;
        }
        write!(f, "}}")
    }
}
