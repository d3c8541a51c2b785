//! Mediabuf-Stream: keyframe-aware buffering of compressed media
//!
//! This crate holds the per-track buffering engine behind a media source.
//! Demuxed access units are appended in media segments; a reader pulls them
//! back out in decode order while seeks, overlapping appends, removals and
//! memory pressure reshape what is buffered.
//!
//! # Modules
//!
//! - `access_unit` - Compressed units with timestamp, keyframe flag and config tag
//! - `decoder_config` - Audio/video decoder configs and mid-stream change rules
//! - `range` - Contiguous runs of buffers starting at a keyframe
//! - `stream` - The per-track engine: append, seek, read, remove, GC
//! - `settings` - Memory limits and adjacency tolerances
//!
//! # Playback continuity
//!
//! When an append overwrites data the reader is positioned in, the buffers
//! it had not consumed yet move to a track buffer and are delivered first.
//! Once that drains, reading resumes at the next keyframe in the new data.
//!
//! # Example
//!
//! ```
//! use mediabuf_common::{MediaTime, VideoCodec};
//! use mediabuf_stream::{AccessUnit, BufferStream, NextBuffer, StreamSettings, VideoDecoderConfig};
//!
//! let config = VideoDecoderConfig::new(VideoCodec::H264, 640, 360);
//! let mut stream = BufferStream::new_video(config, StreamSettings::video());
//!
//! stream.on_new_media_segment(MediaTime::ZERO);
//! stream
//!     .append(vec![
//!         AccessUnit::new(MediaTime::from_millis(0), true, vec![0u8; 64]),
//!         AccessUnit::new(MediaTime::from_millis(33), false, vec![0u8; 16]),
//!     ])
//!     .unwrap();
//!
//! stream.seek(MediaTime::ZERO);
//! match stream.get_next_buffer() {
//!     NextBuffer::Buffer(unit) => assert!(unit.is_keyframe()),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

pub mod access_unit;
pub mod decoder_config;
pub mod error;
pub mod range;
pub mod settings;
pub mod stream;

pub use access_unit::{AccessUnit, ConfigId};
pub use decoder_config::{AudioDecoderConfig, VideoDecoderConfig};
pub use error::{AppendError, ConfigError, ConfigResult};
pub use range::{BufferRange, Removed, Spacing};
pub use settings::StreamSettings;
pub use stream::{BufferStream, NextBuffer};
