//! Seeking, range selection and buffer delivery.

use mediabuf_common::MediaTime;
use tracing::{debug, trace};

use super::{BufferStream, NextBuffer};

impl BufferStream {
    /// Position the reader at `timestamp`.
    ///
    /// Lands on the keyframe at or before `timestamp` in the range that can
    /// seek there. When no range can, the seek stays pending and completes
    /// as soon as an append makes it possible.
    ///
    /// # Panics
    ///
    /// Panics if `timestamp` is negative.
    pub fn seek(&mut self, timestamp: MediaTime) {
        assert!(!timestamp.is_negative(), "cannot seek to negative time {}", timestamp);
        self.reset_seek_state();
        self.seek_target = timestamp;
        self.seek_pending = true;

        if self.should_seek_to_start_of_buffered(timestamp) {
            debug!(timestamp = %timestamp, "Seeking to start of first range");
            self.ranges[0].seek_to_start();
            self.set_selected_range(Some(0));
            self.seek_pending = false;
            return;
        }

        let spacing = self.spacing();
        let Some(index) = self
            .ranges
            .iter()
            .position(|range| range.can_seek_to(timestamp, spacing))
        else {
            debug!(timestamp = %timestamp, "Seek pending until data arrives");
            return;
        };

        self.seek_and_select(index, timestamp);
        self.seek_pending = false;
        debug!(
            timestamp = %timestamp,
            landed = ?self.ranges[index].next_timestamp(),
            "Seek completed"
        );
    }

    /// True while a seek waits for data. A seek past the end of a stream
    /// that has ended is never pending.
    pub fn is_seek_pending(&self) -> bool {
        !(self.end_of_stream && self.is_end_selected()) && self.seek_pending
    }

    /// Pull the next buffer in decode order.
    ///
    /// # Panics
    ///
    /// Panics if a previous `ConfigChange` was not acknowledged through
    /// `current_audio_config` / `current_video_config`.
    pub fn get_next_buffer(&mut self) -> NextBuffer {
        assert!(
            !self.config_change_pending,
            "config change must be acknowledged before reading"
        );

        if let Some(front) = self.track_buffer.front() {
            if front.config_id() != self.current_config {
                debug!(config_id = front.config_id(), "Config change in track buffer");
                self.config_change_pending = true;
                return NextBuffer::ConfigChange;
            }
        }
        if let Some(buffer) = self.track_buffer.pop_front() {
            self.last_output_timestamp = Some(buffer.timestamp());
            if self.track_buffer.is_empty() {
                self.set_selected_range_if_needed(self.last_output_timestamp);
            }
            trace!(timestamp = %buffer.timestamp(), "Delivering from track buffer");
            return NextBuffer::Buffer(buffer);
        }

        let Some(index) = self
            .selected
            .filter(|&index| self.ranges[index].has_next_buffer())
        else {
            if self.end_of_stream && self.is_end_selected() {
                return NextBuffer::EndOfStream;
            }
            return NextBuffer::NeedMoreData;
        };

        if self.ranges[index].next_config_id() != Some(self.current_config) {
            debug!(config_id = ?self.ranges[index].next_config_id(), "Config change in range");
            self.config_change_pending = true;
            return NextBuffer::ConfigChange;
        }

        match self.ranges[index].next_buffer() {
            Some(buffer) => {
                self.last_output_timestamp = Some(buffer.timestamp());
                NextBuffer::Buffer(buffer)
            }
            None => NextBuffer::NeedMoreData,
        }
    }

    /// Timestamp the reader will see next, from the track buffer first.
    pub(super) fn next_buffer_timestamp(&self) -> Option<MediaTime> {
        if let Some(front) = self.track_buffer.front() {
            return Some(front.timestamp());
        }
        self.selected
            .and_then(|index| self.ranges[index].next_timestamp())
    }

    /// Select a range to continue from when nothing is selected and the
    /// track buffer is drained. With no `timestamp`, continue just after the
    /// last delivered buffer.
    pub(super) fn set_selected_range_if_needed(&mut self, timestamp: Option<MediaTime>) {
        if self.selected.is_some() || !self.track_buffer.is_empty() {
            return;
        }

        let start = match (timestamp, self.last_output_timestamp) {
            (Some(timestamp), _) => timestamp,
            (None, Some(last_output)) => last_output + MediaTime::from_micros(1),
            (None, None) => return,
        };

        let Some((index, seek_timestamp)) = self.find_new_selected_range_seek_timestamp(start) else {
            return;
        };
        trace!(start = %start, seek_timestamp = %seek_timestamp, "Selecting range");
        self.seek_and_select(index, seek_timestamp);
    }

    /// First keyframe at or after `start`, allowing the range it sits in to
    /// begin up to one fudge room after `start`.
    fn find_new_selected_range_seek_timestamp(&self, start: MediaTime) -> Option<(usize, MediaTime)> {
        let spacing = self.spacing();
        let end = start + spacing.fudge_room();

        for (index, range) in self.ranges.iter().enumerate() {
            let range_start = range.start_timestamp();
            if range_start >= end {
                break;
            }
            if range.end_timestamp() < start {
                continue;
            }
            let search_from = if start < range_start { range_start } else { start };
            if let Some(keyframe) = range.next_keyframe_timestamp(search_from, spacing) {
                return Some((index, keyframe));
            }
        }
        None
    }

    fn seek_and_select(&mut self, index: usize, timestamp: MediaTime) {
        let spacing = self.spacing();
        self.ranges[index].seek(timestamp, spacing);
        self.set_selected_range(Some(index));
    }

    fn should_seek_to_start_of_buffered(&self, timestamp: MediaTime) -> bool {
        let Some(first) = self.ranges.first() else {
            return false;
        };
        let first_start = first.start_timestamp();
        timestamp <= first_start && first_start < self.settings.seek_to_start_window
    }

    /// True if reading has reached the last range, or would once the
    /// pending seek lands.
    pub(super) fn is_end_selected(&self) -> bool {
        let Some(last) = self.ranges.last() else {
            return true;
        };
        if self.seek_pending {
            return self.seek_target >= last.buffered_end_timestamp(self.spacing());
        }
        self.selected == Some(self.ranges.len() - 1)
    }

    pub(super) fn reset_seek_state(&mut self) {
        self.set_selected_range(None);
        self.track_buffer.clear();
        self.config_change_pending = false;
        self.last_output_timestamp = None;
    }

    /// Adopt the config of the buffer the reader will see next.
    pub(super) fn complete_config_change(&mut self) {
        self.config_change_pending = false;

        let next = self
            .track_buffer
            .front()
            .map(|buffer| buffer.config_id())
            .or_else(|| {
                self.selected
                    .and_then(|index| self.ranges[index].next_config_id())
            });
        if let Some(config_id) = next {
            debug!(from = self.current_config, to = config_id, "Completed config change");
            self.current_config = config_id;
        }
    }
}
