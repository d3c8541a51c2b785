//! Decoder configurations and the per-stream config history.
//!
//! A stream keeps every config it has been given, in arrival order. Buffers
//! carry the index of the config they were appended under; a new index is
//! only allocated when an update differs from every stored config.

use bytes::Bytes;
use mediabuf_common::{AudioCodec, ChannelLayout, TrackKind, VideoCodec};
use tracing::debug;

use crate::access_unit::ConfigId;
use crate::error::{ConfigError, ConfigResult};

/// Parameters an audio decoder needs to be (re)initialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDecoderConfig {
    pub codec: AudioCodec,
    pub sample_rate: u32,
    pub channel_layout: ChannelLayout,
    pub bits_per_channel: u16,
    pub is_encrypted: bool,
    /// Codec-specific setup data (e.g. an AudioSpecificConfig).
    pub extra_data: Bytes,
}

impl AudioDecoderConfig {
    pub fn new(
        codec: AudioCodec,
        sample_rate: u32,
        channel_layout: ChannelLayout,
        bits_per_channel: u16,
    ) -> Self {
        Self {
            codec,
            sample_rate,
            channel_layout,
            bits_per_channel,
            is_encrypted: false,
            extra_data: Bytes::new(),
        }
    }

    pub fn with_extra_data(mut self, extra_data: impl Into<Bytes>) -> Self {
        self.extra_data = extra_data.into();
        self
    }

    pub fn encrypted(mut self, is_encrypted: bool) -> Self {
        self.is_encrypted = is_encrypted;
        self
    }

    /// Reject changes to parameters the audio pipeline cannot switch mid-stream.
    fn check_compatible(&self, next: &AudioDecoderConfig) -> ConfigResult<()> {
        if self.codec != next.codec {
            return Err(ConfigError::AudioCodecChanged {
                from: self.codec,
                to: next.codec,
            });
        }
        if self.sample_rate != next.sample_rate {
            return Err(ConfigError::SampleRateChanged {
                from: self.sample_rate,
                to: next.sample_rate,
            });
        }
        if self.channel_layout != next.channel_layout {
            return Err(ConfigError::ChannelLayoutChanged {
                from: self.channel_layout,
                to: next.channel_layout,
            });
        }
        if self.bits_per_channel != next.bits_per_channel {
            return Err(ConfigError::BitsPerChannelChanged {
                from: self.bits_per_channel,
                to: next.bits_per_channel,
            });
        }
        if self.is_encrypted != next.is_encrypted {
            return Err(ConfigError::EncryptionChanged {
                kind: TrackKind::Audio,
            });
        }
        Ok(())
    }
}

/// Parameters a video decoder needs to be (re)initialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDecoderConfig {
    pub codec: VideoCodec,
    pub coded_width: u32,
    pub coded_height: u32,
    pub is_encrypted: bool,
    /// Codec-specific setup data (e.g. an avcC record).
    pub extra_data: Bytes,
}

impl VideoDecoderConfig {
    pub fn new(codec: VideoCodec, coded_width: u32, coded_height: u32) -> Self {
        Self {
            codec,
            coded_width,
            coded_height,
            is_encrypted: false,
            extra_data: Bytes::new(),
        }
    }

    pub fn with_extra_data(mut self, extra_data: impl Into<Bytes>) -> Self {
        self.extra_data = extra_data.into();
        self
    }

    pub fn encrypted(mut self, is_encrypted: bool) -> Self {
        self.is_encrypted = is_encrypted;
        self
    }

    fn check_compatible(&self, next: &VideoDecoderConfig) -> ConfigResult<()> {
        if self.codec != next.codec {
            return Err(ConfigError::VideoCodecChanged {
                from: self.codec,
                to: next.codec,
            });
        }
        if self.is_encrypted != next.is_encrypted {
            return Err(ConfigError::EncryptionChanged {
                kind: TrackKind::Video,
            });
        }
        Ok(())
    }
}

/// Every decoder config a stream has seen, indexed by `ConfigId`.
#[derive(Debug, Clone)]
pub(crate) enum ConfigHistory {
    Audio(Vec<AudioDecoderConfig>),
    Video(Vec<VideoDecoderConfig>),
}

impl ConfigHistory {
    pub(crate) fn kind(&self) -> TrackKind {
        match self {
            Self::Audio(_) => TrackKind::Audio,
            Self::Video(_) => TrackKind::Video,
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Audio(configs) => configs.len(),
            Self::Video(configs) => configs.len(),
        }
    }

    pub(crate) fn audio(&self, id: ConfigId) -> Option<&AudioDecoderConfig> {
        match self {
            Self::Audio(configs) => configs.get(id),
            Self::Video(_) => None,
        }
    }

    pub(crate) fn video(&self, id: ConfigId) -> Option<&VideoDecoderConfig> {
        match self {
            Self::Video(configs) => configs.get(id),
            Self::Audio(_) => None,
        }
    }

    /// Validate `config` against the original and return its index,
    /// appending it if no stored config matches.
    pub(crate) fn update_audio(&mut self, config: AudioDecoderConfig) -> ConfigResult<ConfigId> {
        let Self::Audio(configs) = self else {
            return Err(ConfigError::WrongTrackKind {
                expected: TrackKind::Audio,
                actual: self.kind(),
            });
        };
        if let Some(original) = configs.first() {
            original.check_compatible(&config)?;
        }
        Ok(find_or_push(configs, config))
    }

    pub(crate) fn update_video(&mut self, config: VideoDecoderConfig) -> ConfigResult<ConfigId> {
        let Self::Video(configs) = self else {
            return Err(ConfigError::WrongTrackKind {
                expected: TrackKind::Video,
                actual: self.kind(),
            });
        };
        if let Some(original) = configs.first() {
            original.check_compatible(&config)?;
        }
        Ok(find_or_push(configs, config))
    }
}

fn find_or_push<C: PartialEq>(configs: &mut Vec<C>, config: C) -> ConfigId {
    if let Some(id) = configs.iter().position(|existing| *existing == config) {
        return id;
    }
    configs.push(config);
    debug!(config_id = configs.len() - 1, "New decoder config");
    configs.len() - 1
}
