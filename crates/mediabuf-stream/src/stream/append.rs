//! Appending media segments: validation, overwrite of existing data,
//! overlap resolution and merging.

use std::sync::Arc;

use mediabuf_common::{MediaTime, TrackKind};
use tracing::{debug, trace, warn};

use super::BufferStream;
use crate::access_unit::AccessUnit;
use crate::error::AppendError;
use crate::range::BufferRange;

impl BufferStream {
    /// Announce that the next appended buffers belong to a media segment
    /// starting at `start`.
    pub fn on_new_media_segment(&mut self, start: MediaTime) {
        debug!(start = %start, "New media segment");
        self.media_segment_start = Some(start);
        self.new_media_segment = true;
        self.append_target = self.find_existing_range_for(start);

        // A segment that picks up right where the previous one ended keeps
        // the monotonicity check going across the boundary.
        let spacing = self.spacing();
        let continues = self.append_target.is_some()
            && self
                .last_appended
                .is_some_and(|(last, _)| spacing.is_next_in_sequence(last, start));
        if !continues {
            self.last_appended = None;
        }
    }

    /// Append a batch of buffers in decode order to the current media segment.
    ///
    /// Existing data the batch overlaps is overwritten. Buffers the reader
    /// had not yet consumed from overwritten data are kept in the track
    /// buffer so playback stays continuous. A rejected batch leaves the
    /// stream unchanged.
    pub fn append(&mut self, buffers: Vec<AccessUnit>) -> Result<(), AppendError> {
        if let Err(e) = self.validate_append(&buffers) {
            warn!(kind = %self.kind(), error = %e, "Rejecting append");
            return Err(e);
        }
        self.update_max_interbuffer_distance(&buffers);

        let config_id = self.append_config;
        let buffers: Vec<Arc<AccessUnit>> = buffers
            .into_iter()
            .map(|mut buffer| {
                buffer.set_config_id(config_id);
                Arc::new(buffer)
            })
            .collect();
        let first_timestamp = buffers[0].timestamp();
        let last = Arc::clone(&buffers[buffers.len() - 1]);
        trace!(
            count = buffers.len(),
            first = %first_timestamp,
            last = %last.timestamp(),
            "Appending buffers"
        );

        let next_buffer_timestamp = self.next_buffer_timestamp();
        let mut deleted = Vec::new();

        let target = match self
            .append_target
            .or_else(|| self.find_existing_range_for(first_timestamp))
        {
            Some(index) => self.insert_into_existing_range(index, buffers, &mut deleted),
            None => {
                let segment_start = if self.new_media_segment {
                    self.media_segment_start
                } else {
                    None
                };
                self.add_new_range(buffers, segment_start, &mut deleted)
            }
        };

        self.append_target = target;
        self.last_appended = Some((last.timestamp(), last.is_keyframe()));
        self.new_media_segment = false;

        if let Some(index) = target {
            self.resolve_complete_overlaps(index, &mut deleted);
            self.resolve_end_overlap(index, &mut deleted);
            self.merge_with_next_range_if_necessary(index);
        }

        if self.seek_pending {
            debug_assert!(self.selected.is_none());
            let seek_target = self.seek_target;
            self.seek(seek_target);
        }

        if !deleted.is_empty() {
            debug_assert!(self
                .track_buffer
                .back()
                .map_or(true, |b| b.timestamp() < deleted[0].timestamp()));
            debug!(count = deleted.len(), "Keeping overwritten buffers in track buffer");
            self.track_buffer.extend(deleted);
        }
        self.prune_track_buffer();

        self.set_selected_range_if_needed(next_buffer_timestamp);
        self.garbage_collect_if_needed();
        Ok(())
    }

    fn validate_append(&self, buffers: &[AccessUnit]) -> Result<(), AppendError> {
        if self.end_of_stream {
            return Err(AppendError::EndOfStream);
        }
        let Some(first) = buffers.first() else {
            return Err(AppendError::EmptyBatch);
        };
        if buffers.iter().any(AccessUnit::is_end_of_stream) {
            return Err(AppendError::EndOfStreamMarker);
        }
        let Some(segment_start) = self.media_segment_start else {
            return Err(AppendError::NoMediaSegment);
        };
        if self.new_media_segment && !first.is_keyframe() {
            return Err(AppendError::SegmentStartNotKeyframe {
                timestamp: first.timestamp(),
            });
        }
        if segment_start.is_negative() {
            return Err(AppendError::NegativeTimestamp {
                timestamp: segment_start,
            });
        }

        let mut previous = self.last_appended;
        for buffer in buffers {
            let timestamp = buffer.timestamp();
            if timestamp.is_negative() {
                return Err(AppendError::NegativeTimestamp { timestamp });
            }
            if buffer.duration().is_some_and(|d| d.is_negative()) {
                return Err(AppendError::NegativeDuration { timestamp });
            }
            if let Some((prev_timestamp, prev_is_keyframe)) = previous {
                if timestamp < prev_timestamp {
                    return Err(AppendError::NonMonotonic {
                        previous: prev_timestamp,
                        current: timestamp,
                    });
                }
                if timestamp == prev_timestamp
                    && !self.allow_same_timestamp(prev_is_keyframe, buffer.is_keyframe())
                {
                    return Err(AppendError::InvalidSameTimestamp { timestamp });
                }
            }
            previous = Some((timestamp, buffer.is_keyframe()));
        }
        Ok(())
    }

    fn allow_same_timestamp(&self, prev_is_keyframe: bool, current_is_keyframe: bool) -> bool {
        match self.kind() {
            TrackKind::Video => !prev_is_keyframe && !current_is_keyframe,
            TrackKind::Audio => prev_is_keyframe || !current_is_keyframe,
        }
    }

    fn update_max_interbuffer_distance(&mut self, buffers: &[AccessUnit]) {
        let mut previous = self.last_appended.map(|(ts, _)| ts);
        for buffer in buffers {
            let timestamp = buffer.timestamp();
            if let Some(prev) = previous {
                let distance = timestamp - prev;
                // Same-timestamp pairs carry no spacing information.
                if distance > MediaTime::ZERO {
                    self.max_interbuffer_distance = Some(
                        self.max_interbuffer_distance
                            .map_or(distance, |max| max.max(distance)),
                    );
                }
            }
            previous = Some(timestamp);
        }
    }

    /// Write `buffers` into the range at `index`, deleting whatever they
    /// replace. Falls back to a new range when the batch cannot extend the
    /// range after the deletions.
    fn insert_into_existing_range(
        &mut self,
        index: usize,
        buffers: Vec<Arc<AccessUnit>>,
        deleted: &mut Vec<Arc<AccessUnit>>,
    ) -> Option<usize> {
        let spacing = self.spacing();
        let first = Arc::clone(&buffers[0]);
        let first_timestamp = first.timestamp();
        let last_timestamp = buffers[buffers.len() - 1].timestamp();

        let temporarily_selected = self.select_gops_ahead_of_track_buffer(index, first_timestamp);

        let same_timestamp_continuation = self
            .last_appended
            .is_some_and(|(ts, _)| ts == first_timestamp)
            && self.ranges[index].end_timestamp() == first_timestamp;

        // Drop stale data between the previous append and this one.
        if let Some((prev, _)) = self.last_appended {
            if prev != first_timestamp {
                self.delete_between(index, prev, first_timestamp, true, deleted);
            }
        }

        // Overwrite whatever the batch itself covers.
        if !same_timestamp_continuation
            && !self.ranges[index].can_append_buffers_to_end(&first, spacing)
        {
            self.delete_between(index, first_timestamp, last_timestamp, false, deleted);
        }

        if temporarily_selected {
            self.set_selected_range(None);
        }

        if self.ranges[index].is_empty() {
            self.remove_range_at(index);
            let segment_start = if self.new_media_segment {
                self.media_segment_start
            } else {
                None
            };
            return self.add_new_range(buffers, segment_start, deleted);
        }

        if same_timestamp_continuation || self.ranges[index].can_append_buffers_to_end(&first, spacing)
        {
            self.ranges[index].append_buffers_to_end(buffers);
            return Some(index);
        }

        debug!(
            range_end = %self.ranges[index].end_timestamp(),
            first = %first_timestamp,
            "Batch does not extend its range; starting a new one"
        );
        self.add_new_range(buffers, None, deleted)
    }

    /// Start a new range with `buffers`. Leading non-keyframes are dropped;
    /// returns `None` when the batch holds no keyframe at all.
    ///
    /// If the first kept keyframe falls inside an existing range, the batch
    /// goes into that range instead so the two never overlap.
    fn add_new_range(
        &mut self,
        mut buffers: Vec<Arc<AccessUnit>>,
        segment_start: Option<MediaTime>,
        deleted: &mut Vec<Arc<AccessUnit>>,
    ) -> Option<usize> {
        if !buffers[0].is_keyframe() {
            let Some(first_keyframe) = buffers.iter().position(|b| b.is_keyframe()) else {
                debug!(count = buffers.len(), "No keyframe to start a range with; dropping batch");
                return None;
            };
            debug!(dropped = first_keyframe, "Dropping buffers ahead of the first keyframe");
            buffers = buffers.split_off(first_keyframe);

            if let Some(index) = self.find_existing_range_for(buffers[0].timestamp()) {
                return self.insert_into_existing_range(index, buffers, deleted);
            }
        }

        let first_timestamp = buffers[0].timestamp();
        let start = segment_start.filter(|start| *start <= first_timestamp);
        let index = self.add_to_ranges(BufferRange::new(buffers, start));
        debug!(index, start = %self.ranges[index].start_timestamp(), "Created range");
        Some(index)
    }

    /// When the track buffer is playing out overwritten data and the range
    /// being appended to still holds GOPs between the track buffer's end and
    /// the new data, select that range at the first such GOP so the
    /// deletions below save those GOPs into the track buffer.
    fn select_gops_ahead_of_track_buffer(&mut self, index: usize, first_timestamp: MediaTime) -> bool {
        let Some(last) = self.track_buffer.back() else {
            return false;
        };
        let track_end = last.timestamp();
        let spacing = self.spacing();
        let range = &self.ranges[index];

        let Some(seek_timestamp) = range.next_keyframe_timestamp(track_end, spacing) else {
            return false;
        };
        if seek_timestamp <= track_end || seek_timestamp >= first_timestamp {
            return false;
        }

        debug_assert!(self.selected.is_none());
        self.ranges[index].seek(seek_timestamp, spacing);
        self.set_selected_range(Some(index));
        true
    }

    /// Delete buffers of the range at `index` from `start` up to the first
    /// keyframe at or after `end`. Whatever follows that keyframe becomes its
    /// own range right after `index`.
    pub(super) fn delete_between(
        &mut self,
        index: usize,
        start: MediaTime,
        end: MediaTime,
        exclusive: bool,
        deleted: &mut Vec<Arc<AccessUnit>>,
    ) {
        let tail_index = match self.ranges[index].split_range(end, exclusive) {
            Some(tail) => {
                self.insert_range_at(index + 1, tail);
                Some(index + 1)
            }
            None => None,
        };

        let removed = self.ranges[index].truncate_at(start, exclusive);
        trace!(
            start = %start,
            end = %end,
            removed = removed.buffers.len(),
            "Deleted buffers from range"
        );

        if self.selected != Some(index) {
            return;
        }
        deleted.extend(removed.into_pending());

        // The reader either follows the split-off tail or, if its position
        // was deleted, waits on the track buffer.
        match tail_index {
            Some(tail) if self.ranges[tail].has_cursor() => self.set_selected_range(Some(tail)),
            _ if !self.ranges[index].has_cursor() => self.set_selected_range(None),
            _ => {}
        }
    }

    /// Delete every range after `index` that it fully covers.
    fn resolve_complete_overlaps(&mut self, index: usize, deleted: &mut Vec<Arc<AccessUnit>>) {
        while index + 1 < self.ranges.len()
            && self.ranges[index].completely_overlaps(&self.ranges[index + 1])
        {
            let next = index + 1;
            if self.selected == Some(next) {
                deleted.extend(self.ranges[next].delete_all().into_pending());
                self.set_selected_range(None);
            }
            let removed = self.remove_range_at(next);
            debug!(start = %removed.start_timestamp(), "Removed completely overlapped range");
        }
    }

    /// Trim the front of the range after `index` where this range's end
    /// reaches into it.
    fn resolve_end_overlap(&mut self, index: usize, deleted: &mut Vec<Arc<AccessUnit>>) {
        let next = index + 1;
        if next >= self.ranges.len() || !self.ranges[index].end_overlaps(&self.ranges[next]) {
            return;
        }

        let was_selected = self.selected == Some(next);
        let mut overlapped = self.remove_range_at(next);
        let end = self.ranges[index].end_timestamp();
        let tail_index = overlapped
            .split_range(end, true)
            .map(|tail| self.add_to_ranges(tail));
        debug!(end = %end, kept_tail = tail_index.is_some(), "Resolved end overlap");

        if !was_selected {
            return;
        }
        match tail_index {
            Some(tail) if self.ranges[tail].has_cursor() => self.selected = Some(tail),
            _ => deleted.extend(overlapped.delete_all().into_pending()),
        }
    }

    /// Keep the track buffer from running past a keyframe that is already
    /// buffered in a range.
    fn prune_track_buffer(&mut self) {
        let Some(front) = self.track_buffer.front() else {
            return;
        };
        let Some(keyframe) = self.find_keyframe_after_timestamp(front.timestamp()) else {
            return;
        };
        while self
            .track_buffer
            .back()
            .is_some_and(|b| b.timestamp() >= keyframe)
        {
            self.track_buffer.pop_back();
        }
        trace!(keyframe = %keyframe, remaining = self.track_buffer.len(), "Pruned track buffer");
    }
}
