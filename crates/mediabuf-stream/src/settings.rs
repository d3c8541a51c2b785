//! Per-stream tuning knobs.

use mediabuf_common::{MediaTime, TrackKind};

/// Default memory budget for an audio stream.
pub const DEFAULT_AUDIO_MEMORY_LIMIT: usize = 12 * 1024 * 1024;

/// Default memory budget for a video stream.
pub const DEFAULT_VIDEO_MEMORY_LIMIT: usize = 150 * 1024 * 1024;

/// Multiple of the inter-buffer distance tolerated as a gap between
/// adjacent buffers.
pub const DEFAULT_FUDGE_MULTIPLIER: i64 = 2;

/// A seek this close to time zero starts at the first buffered range.
pub const DEFAULT_SEEK_TO_START_WINDOW: MediaTime = MediaTime::from_millis(1000);

/// Duration assumed for buffers before any spacing has been observed.
pub const DEFAULT_BUFFER_DURATION: MediaTime = MediaTime::from_millis(125);

/// Tuning knobs for a `BufferStream`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamSettings {
    /// Bytes the stream may hold before garbage collection kicks in.
    pub memory_limit: usize,
    /// Gap tolerance as a multiple of the largest inter-buffer distance.
    pub fudge_multiplier: i64,
    /// Seeks before this time snap to the first range if it starts within it.
    pub seek_to_start_window: MediaTime,
    /// Assumed spacing until one has been measured.
    pub default_buffer_duration: MediaTime,
}

impl StreamSettings {
    pub fn audio() -> Self {
        Self {
            memory_limit: DEFAULT_AUDIO_MEMORY_LIMIT,
            ..Self::video()
        }
    }

    pub fn video() -> Self {
        Self {
            memory_limit: DEFAULT_VIDEO_MEMORY_LIMIT,
            fudge_multiplier: DEFAULT_FUDGE_MULTIPLIER,
            seek_to_start_window: DEFAULT_SEEK_TO_START_WINDOW,
            default_buffer_duration: DEFAULT_BUFFER_DURATION,
        }
    }

    /// Defaults for the given kind of track.
    pub fn for_track(kind: TrackKind) -> Self {
        match kind {
            TrackKind::Audio => Self::audio(),
            TrackKind::Video => Self::video(),
        }
    }

    pub fn with_memory_limit(mut self, memory_limit: usize) -> Self {
        self.memory_limit = memory_limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_per_track() {
        assert_eq!(StreamSettings::audio().memory_limit, 12 * 1024 * 1024);
        assert_eq!(StreamSettings::video().memory_limit, 150 * 1024 * 1024);
        assert_eq!(StreamSettings::for_track(TrackKind::Audio), StreamSettings::audio());
        assert_eq!(StreamSettings::audio().fudge_multiplier, 2);
        assert_eq!(
            StreamSettings::video().default_buffer_duration,
            MediaTime::from_millis(125)
        );
    }

    #[test]
    fn test_with_memory_limit() {
        let settings = StreamSettings::video().with_memory_limit(1024);
        assert_eq!(settings.memory_limit, 1024);
        assert_eq!(settings.seek_to_start_window, MediaTime::from_millis(1000));
    }
}
