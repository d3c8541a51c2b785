//! Error types for mediabuf-stream.

use mediabuf_common::{AudioCodec, ChannelLayout, MediaTime, TrackKind, VideoCodec};
use thiserror::Error;

/// Result type for decoder config updates.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Reasons an append batch is rejected.
///
/// A rejected batch leaves the stream untouched; the caller is expected to
/// surface a decode error for the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppendError {
    /// The batch contained no buffers.
    #[error("Append called with no buffers")]
    EmptyBatch,

    /// No media segment was announced before appending.
    #[error("Append called before any media segment was started")]
    NoMediaSegment,

    /// End of stream has been marked.
    #[error("Cannot append after end of stream has been marked")]
    EndOfStream,

    /// The batch carried an end-of-stream marker instead of media.
    #[error("Cannot append an end-of-stream marker as media data")]
    EndOfStreamMarker,

    /// The first buffer of a new media segment was not a keyframe.
    #[error("Media segment did not begin with a keyframe (first buffer at {timestamp})")]
    SegmentStartNotKeyframe { timestamp: MediaTime },

    /// The segment start or a buffer timestamp was negative.
    #[error("Cannot append a media segment with negative timestamps ({timestamp})")]
    NegativeTimestamp { timestamp: MediaTime },

    /// A buffer declared a negative duration.
    #[error("Buffer at {timestamp} has a negative duration")]
    NegativeDuration { timestamp: MediaTime },

    /// A buffer's decode timestamp went backwards.
    #[error("Buffers were not monotonically increasing ({current} after {previous})")]
    NonMonotonic {
        previous: MediaTime,
        current: MediaTime,
    },

    /// Two consecutive buffers shared a timestamp in a disallowed combination.
    #[error("Unexpected combination of buffers with the same timestamp at {timestamp}")]
    InvalidSameTimestamp { timestamp: MediaTime },
}

/// Reasons a decoder config update is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An audio config was given to a video stream or vice versa.
    #[error("Expected a {expected} config but the stream carries {actual}")]
    WrongTrackKind {
        expected: TrackKind,
        actual: TrackKind,
    },

    /// Audio codec differs from the original config.
    #[error("Audio codec changes not allowed ({from} -> {to})")]
    AudioCodecChanged { from: AudioCodec, to: AudioCodec },

    /// Video codec differs from the original config.
    #[error("Video codec changes not allowed ({from} -> {to})")]
    VideoCodecChanged { from: VideoCodec, to: VideoCodec },

    /// Audio sample rate differs from the original config.
    #[error("Audio sample rate changes not allowed ({from} -> {to})")]
    SampleRateChanged { from: u32, to: u32 },

    /// Audio channel layout differs from the original config.
    #[error("Audio channel layout changes not allowed ({from} -> {to})")]
    ChannelLayoutChanged {
        from: ChannelLayout,
        to: ChannelLayout,
    },

    /// Audio sample bit depth differs from the original config.
    #[error("Audio bit depth changes not allowed ({from} -> {to})")]
    BitsPerChannelChanged { from: u16, to: u16 },

    /// Encryption flag differs from the original config.
    #[error("{kind} encryption changes not allowed")]
    EncryptionChanged { kind: TrackKind },
}
