//! Contiguous runs of buffered access units.
//!
//! A `BufferRange` holds access units with no gap larger than the stream's
//! fudge room between neighbours. It always begins with a keyframe, keeps an
//! index of its keyframes and owns an optional read cursor. Only the range a
//! stream has selected for playback ever has its cursor set.

mod keyframe_index;

use std::collections::VecDeque;
use std::sync::Arc;

use mediabuf_common::MediaTime;

use crate::access_unit::{AccessUnit, ConfigId};
use keyframe_index::KeyframeIndex;

/// Buffer spacing of the owning stream.
///
/// Ranges never store this themselves; the stream measures it while
/// appending and hands the current value to every adjacency check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spacing {
    /// Largest observed gap between consecutive buffers.
    pub interbuffer_distance: MediaTime,
    /// Multiple of `interbuffer_distance` still considered contiguous.
    pub fudge_multiplier: i64,
}

impl Spacing {
    /// Largest gap two buffers may have and still be adjacent.
    pub fn fudge_room(self) -> MediaTime {
        self.interbuffer_distance * self.fudge_multiplier
    }

    /// True if `timestamp` may directly follow a buffer at `last`.
    pub fn is_next_in_sequence(self, last: MediaTime, timestamp: MediaTime) -> bool {
        timestamp > last && timestamp <= last + self.fudge_room()
    }
}

/// Buffers cut from a range.
#[derive(Debug, Default)]
pub struct Removed {
    /// Every removed buffer in decode order.
    pub buffers: Vec<Arc<AccessUnit>>,
    /// Offset into `buffers` of the first buffer the cursor had not yet
    /// delivered, set when the cut region held the cursor.
    pub pending_from: Option<usize>,
}

impl Removed {
    /// True if the range lost its cursor.
    pub fn cursor_removed(&self) -> bool {
        self.pending_from.is_some()
    }

    /// Removed buffers the reader had not consumed yet.
    pub fn pending(&self) -> &[Arc<AccessUnit>] {
        match self.pending_from {
            Some(offset) => &self.buffers[offset..],
            None => &[],
        }
    }

    pub fn into_pending(mut self) -> Vec<Arc<AccessUnit>> {
        match self.pending_from {
            Some(offset) => self.buffers.split_off(offset),
            None => Vec::new(),
        }
    }
}

/// A run of contiguous access units starting at a keyframe.
#[derive(Debug, Clone)]
pub struct BufferRange {
    buffers: VecDeque<Arc<AccessUnit>>,
    keyframes: KeyframeIndex,
    /// `None` until the range is seeked; may equal `buffers.len()` when the
    /// reader has caught up with the end of the range.
    next_buffer_index: Option<usize>,
    media_segment_start: Option<MediaTime>,
    size_in_bytes: usize,
}

impl BufferRange {
    /// Create a range from buffers whose first element is a keyframe.
    ///
    /// `media_segment_start` lets the range claim time before its first
    /// buffer when it was opened by a media segment.
    ///
    /// # Panics
    ///
    /// Panics if `buffers` is empty or does not start with a keyframe.
    pub fn new(
        buffers: impl IntoIterator<Item = Arc<AccessUnit>>,
        media_segment_start: Option<MediaTime>,
    ) -> Self {
        let mut range = Self {
            buffers: VecDeque::new(),
            keyframes: KeyframeIndex::default(),
            next_buffer_index: None,
            media_segment_start,
            size_in_bytes: 0,
        };
        range.append_buffers_to_end(buffers);
        assert!(
            range.buffers.front().is_some_and(|b| b.is_keyframe()),
            "a range must begin with a keyframe"
        );
        range
    }

    /// Append buffers to the end without any adjacency check.
    pub fn append_buffers_to_end(&mut self, buffers: impl IntoIterator<Item = Arc<AccessUnit>>) {
        for buffer in buffers {
            debug_assert!(self
                .buffers
                .back()
                .map_or(true, |last| last.timestamp() <= buffer.timestamp()));
            if buffer.is_keyframe() {
                self.keyframes.insert(buffer.timestamp(), self.buffers.len());
            }
            self.size_in_bytes += buffer.data_size();
            self.buffers.push_back(buffer);
        }
    }

    /// True if a batch starting with `first` can extend this range.
    pub fn can_append_buffers_to_end(&self, first: &AccessUnit, spacing: Spacing) -> bool {
        match self.buffers.back() {
            Some(last) => spacing.is_next_in_sequence(last.timestamp(), first.timestamp()),
            None => true,
        }
    }

    /// True if `other` starts within fudge room of this range's end.
    pub fn can_append_range_to_end(&self, other: &BufferRange, spacing: Spacing) -> bool {
        match other.buffers.front() {
            Some(first) => self.can_append_buffers_to_end(first, spacing),
            None => false,
        }
    }

    /// Move all of `other` onto the end of this range. With
    /// `transfer_cursor`, `other`'s cursor carries over.
    pub fn append_range_to_end(&mut self, other: BufferRange, transfer_cursor: bool) {
        if transfer_cursor {
            if let Some(cursor) = other.next_buffer_index {
                self.next_buffer_index = Some(self.buffers.len() + cursor);
            }
        }
        self.append_buffers_to_end(other.buffers);
    }

    /// Place the cursor on the keyframe at or before `timestamp`.
    ///
    /// # Panics
    ///
    /// Panics if `can_seek_to(timestamp)` is false.
    pub fn seek(&mut self, timestamp: MediaTime, spacing: Spacing) {
        assert!(
            self.can_seek_to(timestamp, spacing),
            "range [{}, {}) cannot seek to {}",
            self.start_timestamp(),
            self.buffered_end_timestamp(spacing),
            timestamp
        );
        let (_, index) = self
            .keyframes
            .at_or_before(timestamp)
            .expect("seekable range has a keyframe");
        self.next_buffer_index = Some(index);
    }

    /// Place the cursor on the first buffer.
    pub fn seek_to_start(&mut self) {
        assert!(!self.buffers.is_empty(), "cannot seek an empty range");
        self.next_buffer_index = Some(0);
    }

    /// Split off everything from the first keyframe at or after `timestamp`
    /// (strictly after when `exclusive`) into a new range.
    ///
    /// The cursor moves with the split if it pointed into the moved part.
    /// Returns `None` when no such keyframe exists.
    pub fn split_range(&mut self, timestamp: MediaTime, exclusive: bool) -> Option<BufferRange> {
        let (_, index) = self.keyframes.first_from(timestamp, exclusive)?;

        let moved = self.buffers.split_off(index);
        self.keyframes.truncate_from(index);
        self.size_in_bytes -= total_size(&moved);

        let mut tail = BufferRange::new(moved, None);
        if let Some(cursor) = self.next_buffer_index.filter(|&c| c >= index) {
            tail.next_buffer_index = Some(cursor - index);
            self.next_buffer_index = None;
        }
        Some(tail)
    }

    /// Delete every buffer from `timestamp` onward (strictly after when
    /// `exclusive`).
    pub fn truncate_at(&mut self, timestamp: MediaTime, exclusive: bool) -> Removed {
        let start = if exclusive {
            self.buffers.partition_point(|b| b.timestamp() <= timestamp)
        } else {
            self.buffers.partition_point(|b| b.timestamp() < timestamp)
        };
        self.truncate_from(start)
    }

    /// Delete every buffer.
    pub fn delete_all(&mut self) -> Removed {
        self.truncate_from(0)
    }

    fn truncate_from(&mut self, start: usize) -> Removed {
        if start >= self.buffers.len() {
            return Removed::default();
        }

        let mut pending_from = None;
        if let Some(cursor) = self.next_buffer_index.filter(|&c| c >= start) {
            pending_from = Some(cursor - start);
            self.next_buffer_index = None;
        }

        self.keyframes.truncate_from(start);
        let buffers: Vec<_> = self.buffers.drain(start..).collect();
        self.size_in_bytes -= total_size(&buffers);

        Removed {
            buffers,
            pending_from,
        }
    }

    /// Remove the first GOP.
    ///
    /// # Panics
    ///
    /// Panics if the first GOP holds the cursor.
    pub fn delete_gop_from_front(&mut self) -> Vec<Arc<AccessUnit>> {
        assert!(
            !self.first_gop_contains_cursor(),
            "cannot delete the GOP holding the cursor"
        );
        if self.keyframes.pop_first().is_none() {
            return Vec::new();
        }

        let end = self.keyframes.nth_index(0).unwrap_or(self.buffers.len());
        let gop: Vec<_> = self.buffers.drain(..end).collect();
        self.size_in_bytes -= total_size(&gop);
        self.keyframes.advance_base(gop.len());
        if let Some(cursor) = self.next_buffer_index.as_mut() {
            *cursor -= gop.len();
        }
        // The range no longer begins where its media segment did.
        self.media_segment_start = None;
        gop
    }

    /// Remove the last GOP.
    ///
    /// # Panics
    ///
    /// Panics if the last GOP holds the cursor.
    pub fn delete_gop_from_back(&mut self) -> Vec<Arc<AccessUnit>> {
        assert!(
            !self.last_gop_contains_cursor(),
            "cannot delete the GOP holding the cursor"
        );
        let Some((_, start)) = self.keyframes.pop_last() else {
            return Vec::new();
        };
        let gop: Vec<_> = self.buffers.drain(start..).collect();
        self.size_in_bytes -= total_size(&gop);
        gop
    }

    pub fn first_gop_contains_cursor(&self) -> bool {
        let Some(cursor) = self.next_buffer_index else {
            return false;
        };
        match self.keyframes.nth_index(1) {
            Some(second) => cursor < second,
            None => true,
        }
    }

    pub fn last_gop_contains_cursor(&self) -> bool {
        let Some(cursor) = self.next_buffer_index else {
            return false;
        };
        if self.keyframes.len() <= 1 {
            return true;
        }
        self.keyframes.last_index().is_some_and(|last| last <= cursor)
    }

    /// Hand out the buffer under the cursor and advance.
    pub fn next_buffer(&mut self) -> Option<Arc<AccessUnit>> {
        let index = self.next_buffer_index?;
        let buffer = Arc::clone(self.buffers.get(index)?);
        self.next_buffer_index = Some(index + 1);
        Some(buffer)
    }

    /// True if the cursor points at a buffer.
    pub fn has_next_buffer(&self) -> bool {
        self.next_buffer_index
            .is_some_and(|index| index < self.buffers.len())
    }

    /// Config of the buffer under the cursor.
    pub fn next_config_id(&self) -> Option<ConfigId> {
        self.cursor_buffer().map(|b| b.config_id())
    }

    /// Timestamp of the buffer under the cursor; `None` when unseeked or
    /// caught up with the end.
    pub fn next_timestamp(&self) -> Option<MediaTime> {
        self.cursor_buffer().map(|b| b.timestamp())
    }

    /// True if the range has been seeked, even when the cursor sits at the end.
    pub fn has_cursor(&self) -> bool {
        self.next_buffer_index.is_some()
    }

    pub fn reset_cursor(&mut self) {
        self.next_buffer_index = None;
    }

    fn cursor_buffer(&self) -> Option<&Arc<AccessUnit>> {
        self.buffers.get(self.next_buffer_index?)
    }

    /// Media segment start if the range still begins there, otherwise the
    /// first buffer's timestamp.
    pub fn start_timestamp(&self) -> MediaTime {
        self.media_segment_start
            .or_else(|| self.buffers.front().map(|b| b.timestamp()))
            .unwrap_or(MediaTime::ZERO)
    }

    /// Timestamp of the last buffer.
    pub fn end_timestamp(&self) -> MediaTime {
        self.buffers
            .back()
            .map(|b| b.timestamp())
            .unwrap_or_else(|| self.start_timestamp())
    }

    /// End of the last buffer: its duration when known, otherwise the
    /// stream's inter-buffer distance.
    pub fn buffered_end_timestamp(&self, spacing: Spacing) -> MediaTime {
        let Some(last) = self.buffers.back() else {
            return self.start_timestamp();
        };
        let duration = last
            .duration()
            .filter(|d| *d > MediaTime::ZERO)
            .unwrap_or(spacing.interbuffer_distance);
        last.timestamp() + duration
    }

    /// First keyframe at or after `timestamp`, if the range covers it.
    pub fn next_keyframe_timestamp(&self, timestamp: MediaTime, spacing: Spacing) -> Option<MediaTime> {
        if !self.covers(timestamp, spacing) {
            return None;
        }
        self.keyframes.first_from(timestamp, false).map(|(ts, _)| ts)
    }

    /// Keyframe a seek to `timestamp` would land on, if the range covers it.
    pub fn keyframe_before_timestamp(&self, timestamp: MediaTime, spacing: Spacing) -> Option<MediaTime> {
        if !self.covers(timestamp, spacing) {
            return None;
        }
        self.keyframes.at_or_before(timestamp).map(|(ts, _)| ts)
    }

    fn covers(&self, timestamp: MediaTime, spacing: Spacing) -> bool {
        timestamp >= self.start_timestamp() && timestamp < self.buffered_end_timestamp(spacing)
    }

    /// True if a buffer at `timestamp` would land inside or directly after
    /// this range.
    pub fn belongs_to_range(&self, timestamp: MediaTime, spacing: Spacing) -> bool {
        let Some(last) = self.buffers.back() else {
            return false;
        };
        spacing.is_next_in_sequence(last.timestamp(), timestamp)
            || (self.start_timestamp() <= timestamp && timestamp <= last.timestamp())
    }

    pub fn can_seek_to(&self, timestamp: MediaTime, spacing: Spacing) -> bool {
        let earliest = (self.start_timestamp() - spacing.fudge_room()).max(MediaTime::ZERO);
        !self.keyframes.is_empty()
            && earliest <= timestamp
            && timestamp < self.buffered_end_timestamp(spacing)
    }

    /// True if `other` lies entirely within this range.
    pub fn completely_overlaps(&self, other: &BufferRange) -> bool {
        self.start_timestamp() <= other.start_timestamp()
            && other.end_timestamp() <= self.end_timestamp()
    }

    /// True if this range's end lies inside `other`.
    pub fn end_overlaps(&self, other: &BufferRange) -> bool {
        other.start_timestamp() <= self.end_timestamp()
            && self.end_timestamp() < other.end_timestamp()
    }

    pub fn media_segment_start(&self) -> Option<MediaTime> {
        self.media_segment_start
    }

    /// Total payload bytes held.
    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn buffers(&self) -> impl Iterator<Item = &Arc<AccessUnit>> + '_ {
        self.buffers.iter()
    }

    pub fn keyframe_timestamps(&self) -> Vec<MediaTime> {
        self.keyframes.timestamps().collect()
    }
}

fn total_size<'a>(buffers: impl IntoIterator<Item = &'a Arc<AccessUnit>>) -> usize {
    buffers.into_iter().map(|b| b.data_size()).sum()
}
