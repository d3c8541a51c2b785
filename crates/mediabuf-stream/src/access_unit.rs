//! Compressed access units.

use bytes::Bytes;
use mediabuf_common::MediaTime;

/// Index into a stream's decoder config history.
pub type ConfigId = usize;

/// One compressed, independently-timestamped unit of media data.
///
/// Units are handed to the stream by value; once appended they are shared
/// behind an `Arc` between the stream's ranges, its track buffer and readers.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessUnit {
    timestamp: MediaTime,
    duration: Option<MediaTime>,
    is_keyframe: bool,
    data: Bytes,
    config_id: ConfigId,
    end_of_stream: bool,
}

impl AccessUnit {
    /// Create a unit with the given decode timestamp and payload.
    pub fn new(timestamp: MediaTime, is_keyframe: bool, data: impl Into<Bytes>) -> Self {
        Self {
            timestamp,
            duration: None,
            is_keyframe,
            data: data.into(),
            config_id: 0,
            end_of_stream: false,
        }
    }

    /// Attach a known duration.
    pub fn with_duration(mut self, duration: MediaTime) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Marker unit handed to readers once the stream has ended.
    pub fn end_of_stream() -> Self {
        Self {
            timestamp: MediaTime::ZERO,
            duration: None,
            is_keyframe: false,
            data: Bytes::new(),
            config_id: 0,
            end_of_stream: true,
        }
    }

    /// Decode timestamp.
    #[inline]
    pub fn timestamp(&self) -> MediaTime {
        self.timestamp
    }

    /// Duration, if the container declared one.
    #[inline]
    pub fn duration(&self) -> Option<MediaTime> {
        self.duration
    }

    /// True if decoding can start at this unit.
    #[inline]
    pub fn is_keyframe(&self) -> bool {
        self.is_keyframe
    }

    /// Compressed payload.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Payload size in bytes.
    #[inline]
    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    /// Decoder config this unit was appended under.
    #[inline]
    pub fn config_id(&self) -> ConfigId {
        self.config_id
    }

    /// True for the end-of-stream marker.
    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    pub(crate) fn set_config_id(&mut self, config_id: ConfigId) {
        self.config_id = config_id;
    }
}
