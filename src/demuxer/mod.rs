//! Media source front for the buffering engine.
//!
//! A `MediaSource` owns up to one audio and one video `ChunkDemuxerStream`
//! and applies source-wide operations (duration, end of stream, seek,
//! removal) to every track. Buffered ranges are reported as the time all
//! tracks have data for.

mod stream;

pub use stream::{ChunkDemuxerStream, DemuxerRead};

use std::sync::Arc;

use mediabuf_common::{MediaTime, TimeRanges, TrackKind};
use mediabuf_stream::{
    AccessUnit, AppendError, AudioDecoderConfig, ConfigError, StreamSettings, VideoDecoderConfig,
};
use parking_lot::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DemuxerError {
    #[error("Media source has no {0} track")]
    NoTrack(TrackKind),

    #[error(transparent)]
    Append(#[from] AppendError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, DemuxerError>;

#[derive(Debug, Default)]
struct SourceState {
    duration: Option<MediaTime>,
    ended: bool,
}

/// The set of tracks fed by one media source.
#[derive(Debug, Default)]
pub struct MediaSource {
    audio: Option<Arc<ChunkDemuxerStream>>,
    video: Option<Arc<ChunkDemuxerStream>>,
    state: RwLock<SourceState>,
}

impl MediaSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_audio(mut self, config: AudioDecoderConfig, settings: StreamSettings) -> Self {
        self.audio = Some(ChunkDemuxerStream::new_audio(config, settings));
        self
    }

    pub fn with_video(mut self, config: VideoDecoderConfig, settings: StreamSettings) -> Self {
        self.video = Some(ChunkDemuxerStream::new_video(config, settings));
        self
    }

    pub fn audio(&self) -> Option<&Arc<ChunkDemuxerStream>> {
        self.audio.as_ref()
    }

    pub fn video(&self) -> Option<&Arc<ChunkDemuxerStream>> {
        self.video.as_ref()
    }

    pub fn track(&self, kind: TrackKind) -> Result<&Arc<ChunkDemuxerStream>> {
        let track = match kind {
            TrackKind::Audio => self.audio.as_ref(),
            TrackKind::Video => self.video.as_ref(),
        };
        track.ok_or(DemuxerError::NoTrack(kind))
    }

    fn tracks(&self) -> impl Iterator<Item = &Arc<ChunkDemuxerStream>> {
        self.audio.iter().chain(self.video.iter())
    }

    /// Start a media segment at `start` and append `buffers` to it.
    pub fn append_segment(
        &self,
        kind: TrackKind,
        start: MediaTime,
        buffers: Vec<AccessUnit>,
    ) -> Result<()> {
        let track = self.track(kind)?;
        track.on_new_media_segment(start);
        track.append(buffers)?;
        Ok(())
    }

    /// Append `buffers` to the track's current media segment.
    pub fn append(&self, kind: TrackKind, buffers: Vec<AccessUnit>) -> Result<()> {
        self.track(kind)?.append(buffers)?;
        Ok(())
    }

    pub fn duration(&self) -> Option<MediaTime> {
        self.state.read().duration
    }

    /// Set the source duration. Shrinking it drops buffered data past the
    /// new end on every track.
    pub fn set_duration(&self, duration: MediaTime) {
        let previous = {
            let mut state = self.state.write();
            state.duration.replace(duration)
        };
        if previous.is_some_and(|old| duration < old) {
            tracing::debug!(from = ?previous, to = %duration, "Duration reduced");
            for track in self.tracks() {
                track.on_set_duration(duration);
            }
        }
    }

    /// Signal that no more data will be appended. The duration grows to the
    /// highest buffered end time if data extends past it.
    pub fn mark_end_of_stream(&self) {
        let highest_end = self.highest_buffered_end();
        {
            let mut state = self.state.write();
            state.ended = true;
            if let Some(end) = highest_end {
                if state.duration.map_or(true, |duration| end > duration) {
                    state.duration = Some(end);
                }
            }
        }
        for track in self.tracks() {
            track.mark_end_of_stream();
        }
    }

    pub fn unmark_end_of_stream(&self) {
        self.state.write().ended = false;
        for track in self.tracks() {
            track.unmark_end_of_stream();
        }
    }

    pub fn is_ended(&self) -> bool {
        self.state.read().ended
    }

    pub fn seek(&self, timestamp: MediaTime) {
        tracing::debug!(timestamp = %timestamp, "Seeking media source");
        for track in self.tracks() {
            track.seek(timestamp);
        }
    }

    /// True while any track still waits for data to complete a seek.
    pub fn is_seek_pending(&self) -> bool {
        self.tracks().any(|track| track.is_seek_pending())
    }

    /// Remove `[start, end)` from every track.
    pub fn remove(&self, start: MediaTime, end: MediaTime) {
        let duration = self.duration().unwrap_or(MediaTime::MAX);
        for track in self.tracks() {
            track.remove(start, end, duration);
        }
    }

    /// Time ranges every track has data for.
    ///
    /// Once ended, each track's last range is stretched to the highest end
    /// time among all tracks, so a shorter track does not cut the source's
    /// buffered end short.
    pub fn buffered(&self) -> TimeRanges {
        let mut per_track: Vec<TimeRanges> =
            self.tracks().map(|track| track.buffered_ranges()).collect();

        if self.is_ended() {
            let highest_end = per_track
                .iter()
                .filter_map(|ranges| ranges.iter().last().map(|(_, end)| end))
                .max();
            if let Some(highest_end) = highest_end {
                for ranges in &mut per_track {
                    if let Some((start, _)) = ranges.iter().last() {
                        ranges.add(start, highest_end);
                    }
                }
            }
        }

        let mut tracks = per_track.into_iter();
        let Some(first) = tracks.next() else {
            return TimeRanges::new();
        };
        tracks.fold(first, |acc, ranges| acc.intersection_with(&ranges))
    }

    fn highest_buffered_end(&self) -> Option<MediaTime> {
        self.tracks()
            .filter_map(|track| track.buffered_ranges().iter().last().map(|(_, end)| end))
            .max()
    }
}
