//! Explicit removal and duration truncation.

use std::sync::Arc;

use mediabuf_common::MediaTime;
use tracing::debug;

use super::BufferStream;
use crate::access_unit::AccessUnit;

impl BufferStream {
    /// Remove buffered data in `[start, end)`.
    ///
    /// `end` is pushed forward to the next keyframe so no range is left
    /// starting on a non-keyframe; with no keyframe after it, everything up
    /// to `duration` goes.
    pub fn remove(&mut self, start: MediaTime, end: MediaTime, duration: MediaTime) {
        if start >= end {
            debug!(start = %start, end = %end, "Ignoring empty removal");
            return;
        }

        let remove_end = match self.find_keyframe_after_timestamp(end) {
            Some(keyframe) => keyframe,
            None => end.min(duration),
        };
        debug!(start = %start, end = %remove_end, "Removing buffered data");

        let deleted = self.remove_internal(start, remove_end, false);

        while self
            .track_buffer
            .back()
            .is_some_and(|b| b.timestamp() >= start)
        {
            self.track_buffer.pop_back();
        }

        if let Some(first) = deleted.first() {
            self.set_selected_range_if_needed(Some(first.timestamp()));
        }
    }

    /// Delete buffers from `start` up to the first keyframe at or after
    /// `end`. Returns the deleted buffers the reader had not consumed.
    fn remove_internal(
        &mut self,
        start: MediaTime,
        end: MediaTime,
        exclusive: bool,
    ) -> Vec<Arc<AccessUnit>> {
        let mut deleted = Vec::new();
        let mut index = 0;

        while index < self.ranges.len() {
            if self.ranges[index].start_timestamp() >= end {
                break;
            }

            if let Some(tail) = self.ranges[index].split_range(end, exclusive) {
                let tail_has_cursor = tail.has_cursor();
                self.insert_range_at(index + 1, tail);
                if tail_has_cursor {
                    self.selected = Some(index + 1);
                }
            }

            if start <= self.ranges[index].start_timestamp() {
                if self.selected == Some(index) {
                    deleted.extend(self.ranges[index].delete_all().into_pending());
                    self.set_selected_range(None);
                }
                self.remove_range_at(index);
                continue;
            }

            let removed = self.ranges[index].truncate_at(start, exclusive);
            deleted.extend(removed.into_pending());
            if self.selected == Some(index) && !self.ranges[index].has_cursor() {
                self.set_selected_range(None);
            }
            if self.ranges[index].is_empty() {
                self.remove_range_at(index);
                continue;
            }
            self.release_append_target_if_cut(index);
            index += 1;
        }

        deleted
    }

    /// Stop appending to the range at `index` once it no longer ends at the
    /// last appended buffer. The next batch then looks up the range that
    /// covers it, which may be a tail split off by the cut.
    fn release_append_target_if_cut(&mut self, index: usize) {
        if self.append_target != Some(index) {
            return;
        }
        let Some((last, _)) = self.last_appended else {
            return;
        };
        let next = last + MediaTime::from_micros(1);
        if !self.ranges[index].belongs_to_range(next, self.spacing()) {
            debug!(index, last = %last, "Append target no longer ends at the last appended buffer");
            self.append_target = None;
        }
    }

    /// Drop everything buffered at or after `duration`.
    pub fn on_set_duration(&mut self, duration: MediaTime) {
        let Some(mut index) = self
            .ranges
            .iter()
            .position(|range| range.end_timestamp() > duration)
        else {
            return;
        };
        debug!(duration = %duration, "Truncating to new duration");

        if self.ranges[index].start_timestamp() < duration {
            self.ranges[index].truncate_at(duration, false);
            if self.selected == Some(index) && !self.ranges[index].has_cursor() {
                self.set_selected_range(None);
            }
            if self.ranges[index].is_empty() {
                self.remove_range_at(index);
            } else {
                self.release_append_target_if_cut(index);
                index += 1;
            }
        }

        while index < self.ranges.len() {
            if self.selected == Some(index) {
                self.reset_seek_state();
            }
            self.remove_range_at(index);
        }

        while self
            .track_buffer
            .back()
            .is_some_and(|b| b.timestamp() >= duration)
        {
            self.track_buffer.pop_back();
        }
    }
}
