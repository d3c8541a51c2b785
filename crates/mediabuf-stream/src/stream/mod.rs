//! Per-track buffering engine.
//!
//! A `BufferStream` owns the ordered, non-overlapping list of `BufferRange`s
//! for one audio or video track. Media segments are appended into it, reads
//! pull access units out in decode order, and seeks, removals and garbage
//! collection reshape the ranges while keeping playback continuous.
//!
//! The implementation is spread over a few files:
//! - `append.rs`: validation, overlap resolution, merging
//! - `read.rs`: seeking, range selection, buffer delivery and config changes
//! - `gc.rs`: memory-bounded eviction
//! - `remove.rs`: explicit removal and duration changes

mod append;
mod gc;
mod read;
mod remove;

use std::collections::VecDeque;
use std::sync::Arc;

use mediabuf_common::{MediaTime, TimeRanges, TrackKind};
use tracing::debug;

use crate::access_unit::{AccessUnit, ConfigId};
use crate::decoder_config::{AudioDecoderConfig, ConfigHistory, VideoDecoderConfig};
use crate::error::ConfigResult;
use crate::range::{BufferRange, Spacing};
use crate::settings::StreamSettings;

/// Outcome of asking the stream for its next buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum NextBuffer {
    /// The next access unit in decode order.
    Buffer(Arc<AccessUnit>),
    /// The next buffer needs a different decoder config. Fetch the current
    /// config before reading again.
    ConfigChange,
    /// End of stream was marked and playback reached the last range.
    EndOfStream,
    /// Nothing is buffered at the read position yet.
    NeedMoreData,
}

/// Buffered data and read state for a single track.
#[derive(Debug)]
pub struct BufferStream {
    settings: StreamSettings,

    /// Sorted by start timestamp, never overlapping, never empty between calls.
    ranges: Vec<BufferRange>,
    /// Index of the range the reader is positioned in.
    selected: Option<usize>,
    /// Index of the range the current media segment appends into.
    append_target: Option<usize>,

    /// Buffers cut out from under the reader, delivered before the
    /// selected range resumes.
    track_buffer: VecDeque<Arc<AccessUnit>>,

    seek_pending: bool,
    seek_target: MediaTime,

    media_segment_start: Option<MediaTime>,
    new_media_segment: bool,

    /// Timestamp and keyframe flag of the last appended buffer of the
    /// current media segment.
    last_appended: Option<(MediaTime, bool)>,
    last_output_timestamp: Option<MediaTime>,
    max_interbuffer_distance: Option<MediaTime>,

    configs: ConfigHistory,
    current_config: ConfigId,
    append_config: ConfigId,
    config_change_pending: bool,

    end_of_stream: bool,
}

impl BufferStream {
    /// Create an audio stream starting with `config`.
    pub fn new_audio(config: AudioDecoderConfig, settings: StreamSettings) -> Self {
        Self::with_configs(ConfigHistory::Audio(vec![config]), settings)
    }

    /// Create a video stream starting with `config`.
    pub fn new_video(config: VideoDecoderConfig, settings: StreamSettings) -> Self {
        Self::with_configs(ConfigHistory::Video(vec![config]), settings)
    }

    fn with_configs(configs: ConfigHistory, settings: StreamSettings) -> Self {
        debug!(kind = %configs.kind(), memory_limit = settings.memory_limit, "Creating buffer stream");
        Self {
            settings,
            ranges: Vec::new(),
            selected: None,
            append_target: None,
            track_buffer: VecDeque::new(),
            seek_pending: false,
            seek_target: MediaTime::ZERO,
            media_segment_start: None,
            new_media_segment: false,
            last_appended: None,
            last_output_timestamp: None,
            max_interbuffer_distance: None,
            configs,
            current_config: 0,
            append_config: 0,
            config_change_pending: false,
            end_of_stream: false,
        }
    }

    pub fn kind(&self) -> TrackKind {
        self.configs.kind()
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    /// Validate a new audio config and make it the one subsequent appends
    /// are tagged with.
    pub fn update_audio_config(&mut self, config: AudioDecoderConfig) -> ConfigResult<ConfigId> {
        let id = self.configs.update_audio(config)?;
        self.append_config = id;
        Ok(id)
    }

    /// Validate a new video config and make it the one subsequent appends
    /// are tagged with.
    pub fn update_video_config(&mut self, config: VideoDecoderConfig) -> ConfigResult<ConfigId> {
        let id = self.configs.update_video(config)?;
        self.append_config = id;
        Ok(id)
    }

    /// Config the reader should decode with. Acknowledges a pending config
    /// change. Returns `None` on a video stream.
    pub fn current_audio_config(&mut self) -> Option<&AudioDecoderConfig> {
        if self.config_change_pending {
            self.complete_config_change();
        }
        self.configs.audio(self.current_config)
    }

    /// Config the reader should decode with. Acknowledges a pending config
    /// change. Returns `None` on an audio stream.
    pub fn current_video_config(&mut self) -> Option<&VideoDecoderConfig> {
        if self.config_change_pending {
            self.complete_config_change();
        }
        self.configs.video(self.current_config)
    }

    pub fn config_count(&self) -> usize {
        self.configs.len()
    }

    /// Id of the config the reader is decoding with.
    pub fn current_config_id(&self) -> ConfigId {
        self.current_config
    }

    pub fn mark_end_of_stream(&mut self) {
        assert!(!self.end_of_stream, "end of stream already marked");
        self.end_of_stream = true;
    }

    pub fn unmark_end_of_stream(&mut self) {
        assert!(self.end_of_stream, "end of stream not marked");
        self.end_of_stream = false;
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    /// Buffered time as disjoint `[start, buffered_end)` intervals.
    pub fn buffered_ranges(&self) -> TimeRanges {
        let spacing = self.spacing();
        let mut buffered = TimeRanges::new();
        for range in &self.ranges {
            buffered.add(range.start_timestamp(), range.buffered_end_timestamp(spacing));
        }
        buffered
    }

    /// Sum of all buffered interval lengths.
    pub fn buffered_duration(&self) -> MediaTime {
        self.buffered_ranges()
            .iter()
            .fold(MediaTime::ZERO, |total, (start, end)| total + (end - start))
    }

    /// Payload bytes held by all ranges.
    pub fn total_bytes(&self) -> usize {
        self.ranges.iter().map(|r| r.size_in_bytes()).sum()
    }

    pub fn set_memory_limit(&mut self, memory_limit: usize) {
        self.settings.memory_limit = memory_limit;
    }

    pub fn ranges(&self) -> &[BufferRange] {
        &self.ranges
    }

    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    /// Buffers waiting in the track buffer.
    pub fn track_buffer_len(&self) -> usize {
        self.track_buffer.len()
    }

    /// Current adjacency tolerance.
    pub(crate) fn spacing(&self) -> Spacing {
        Spacing {
            interbuffer_distance: self
                .max_interbuffer_distance
                .unwrap_or(self.settings.default_buffer_duration),
            fudge_multiplier: self.settings.fudge_multiplier,
        }
    }

    /// Index of the range a buffer at `timestamp` belongs to.
    fn find_existing_range_for(&self, timestamp: MediaTime) -> Option<usize> {
        let spacing = self.spacing();
        self.ranges
            .iter()
            .position(|range| range.belongs_to_range(timestamp, spacing))
    }

    /// First keyframe at or after `timestamp` within the range that covers it.
    fn find_keyframe_after_timestamp(&self, timestamp: MediaTime) -> Option<MediaTime> {
        let spacing = self.spacing();
        let index = self.find_existing_range_for(timestamp)?;
        self.ranges[index].next_keyframe_timestamp(timestamp, spacing)
    }

    /// Insert `range` keeping the list sorted, ahead of any range with the
    /// same start; returns its index.
    fn add_to_ranges(&mut self, range: BufferRange) -> usize {
        let start = range.start_timestamp();
        let index = self
            .ranges
            .partition_point(|existing| existing.start_timestamp() < start);
        self.insert_range_at(index, range);
        index
    }

    fn insert_range_at(&mut self, index: usize, range: BufferRange) {
        self.ranges.insert(index, range);
        for slot in [&mut self.selected, &mut self.append_target] {
            if let Some(i) = slot.as_mut() {
                if *i >= index {
                    *i += 1;
                }
            }
        }
    }

    /// Take a range out of the list. Selection or append target pointing at
    /// it are cleared; the removed range keeps its cursor.
    fn remove_range_at(&mut self, index: usize) -> BufferRange {
        let range = self.ranges.remove(index);
        for slot in [&mut self.selected, &mut self.append_target] {
            let current = *slot;
            match current {
                Some(i) if i == index => *slot = None,
                Some(i) if i > index => *slot = Some(i - 1),
                _ => {}
            }
        }
        range
    }

    /// Move the selection, resetting the cursor of the previously selected
    /// range.
    fn set_selected_range(&mut self, index: Option<usize>) {
        if let Some(old) = self.selected {
            if Some(old) != index {
                self.ranges[old].reset_cursor();
            }
        }
        if let Some(new) = index {
            debug_assert!(self.ranges[new].has_cursor());
        }
        self.selected = index;
    }

    /// Merge the range after `index` into it if the two are adjacent.
    fn merge_with_next_range_if_necessary(&mut self, index: usize) {
        let next = index + 1;
        if next >= self.ranges.len() {
            return;
        }
        let spacing = self.spacing();
        if !self.ranges[index].can_append_range_to_end(&self.ranges[next], spacing) {
            return;
        }

        let transfer_cursor = self.selected == Some(next);
        let was_append_target = self.append_target == Some(next);
        let other = self.remove_range_at(next);
        debug!(
            start = %self.ranges[index].start_timestamp(),
            merged_start = %other.start_timestamp(),
            "Merging adjacent ranges"
        );
        self.ranges[index].append_range_to_end(other, transfer_cursor);
        if transfer_cursor {
            self.selected = Some(index);
        }
        if was_append_target {
            self.append_target = Some(index);
        }
    }
}

#[cfg(test)]
mod tests;
