//! Replay of recorded buffering sessions.
//!
//! A script names a track kind, an optional starting decoder config and a
//! list of operations. Running it drives a single `BufferStream` and records
//! everything the reader observed, which makes engine behavior easy to
//! reproduce from the command line.
//!
//! Scripts are JSON (`.json`) or TOML (anything else):
//!
//! ```toml
//! track = "video"
//!
//! [[ops]]
//! op = "new_segment"
//! start_ms = 0
//!
//! [[ops]]
//! op = "append"
//! units = [{ ts_ms = 0, key = true, size = 100 }, { ts_ms = 33 }]
//!
//! [[ops]]
//! op = "seek"
//! ts_ms = 0
//!
//! [[ops]]
//! op = "read"
//! n = 3
//! ```

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;
use mediabuf_common::{AudioCodec, ChannelLayout, MediaTime, TimeRanges, TrackKind, VideoCodec};
use mediabuf_stream::{
    AccessUnit, AudioDecoderConfig, BufferStream, ConfigId, ConfigResult, NextBuffer,
    StreamSettings, VideoDecoderConfig,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Script {
    pub track: TrackKind,

    /// Decoder config the stream starts with
    #[serde(default)]
    pub decoder: DecoderSpec,

    /// Overrides the configured memory limit for this run
    #[serde(default)]
    pub memory_limit: Option<usize>,

    #[serde(default)]
    pub ops: Vec<Op>,
}

/// Decoder parameters. Audio fields are ignored on video tracks and the
/// other way round.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecoderSpec {
    #[serde(default = "default_audio_codec")]
    pub audio_codec: AudioCodec,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_channel_layout")]
    pub channel_layout: ChannelLayout,

    #[serde(default = "default_bits_per_channel")]
    pub bits_per_channel: u16,

    #[serde(default = "default_video_codec")]
    pub video_codec: VideoCodec,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default)]
    pub encrypted: bool,

    /// Codec setup bytes, taken verbatim from the string
    #[serde(default)]
    pub extra_data: String,
}

impl Default for DecoderSpec {
    fn default() -> Self {
        Self {
            audio_codec: default_audio_codec(),
            sample_rate: default_sample_rate(),
            channel_layout: default_channel_layout(),
            bits_per_channel: default_bits_per_channel(),
            video_codec: default_video_codec(),
            width: default_width(),
            height: default_height(),
            encrypted: false,
            extra_data: String::new(),
        }
    }
}

impl DecoderSpec {
    fn audio_config(&self) -> AudioDecoderConfig {
        AudioDecoderConfig::new(
            self.audio_codec,
            self.sample_rate,
            self.channel_layout,
            self.bits_per_channel,
        )
        .with_extra_data(Bytes::from(self.extra_data.clone().into_bytes()))
        .encrypted(self.encrypted)
    }

    fn video_config(&self) -> VideoDecoderConfig {
        VideoDecoderConfig::new(self.video_codec, self.width, self.height)
            .with_extra_data(Bytes::from(self.extra_data.clone().into_bytes()))
            .encrypted(self.encrypted)
    }
}

fn default_audio_codec() -> AudioCodec {
    AudioCodec::Aac
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_channel_layout() -> ChannelLayout {
    ChannelLayout::Stereo
}

fn default_bits_per_channel() -> u16 {
    16
}

fn default_video_codec() -> VideoCodec {
    VideoCodec::H264
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

/// One access unit in an append.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnitSpec {
    pub ts_ms: i64,

    #[serde(default)]
    pub key: bool,

    #[serde(default = "default_unit_size")]
    pub size: usize,

    #[serde(default)]
    pub duration_ms: Option<i64>,
}

fn default_unit_size() -> usize {
    1
}

impl UnitSpec {
    fn to_access_unit(&self) -> Result<AccessUnit> {
        let unit = AccessUnit::new(millis(self.ts_ms)?, self.key, vec![0u8; self.size]);
        Ok(match self.duration_ms {
            Some(duration) => unit.with_duration(millis(duration)?),
            None => unit,
        })
    }
}

/// Script times are whole milliseconds.
fn millis(value: i64) -> Result<MediaTime> {
    match MediaTime::checked_from_millis(value) {
        Some(time) => Ok(time),
        None => anyhow::bail!("Time {}ms is out of range", value),
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    NewSegment {
        start_ms: i64,
    },
    Append {
        units: Vec<UnitSpec>,
    },
    UpdateConfig {
        #[serde(flatten)]
        decoder: DecoderSpec,
    },
    Seek {
        ts_ms: i64,
    },
    Read {
        n: usize,
    },
    Remove {
        start_ms: i64,
        end_ms: i64,
        duration_ms: i64,
    },
    SetDuration {
        duration_ms: i64,
    },
    EndOfStream,
    UnmarkEndOfStream,
}

/// Something the replay observed, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Buffer { ts_ms: i64, key: bool, cfg: ConfigId },
    ConfigChange { cfg: ConfigId },
    EndOfStream,
    NeedData,
    SeekPending { ts_ms: i64 },
    AppendRejected { reason: String },
    ConfigRejected { reason: String },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Buffer { ts_ms, key, cfg } => {
                write!(f, "buffer t={}ms key={} cfg={}", ts_ms, key, cfg)
            }
            Event::ConfigChange { cfg } => write!(f, "config-change cfg={}", cfg),
            Event::EndOfStream => write!(f, "end-of-stream"),
            Event::NeedData => write!(f, "need-data"),
            Event::SeekPending { ts_ms } => write!(f, "seek-pending t={}ms", ts_ms),
            Event::AppendRejected { reason } => write!(f, "append-rejected: {}", reason),
            Event::ConfigRejected { reason } => write!(f, "config-rejected: {}", reason),
        }
    }
}

/// Outcome of a replay.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub track: TrackKind,
    pub settings: StreamSettings,
    pub events: Vec<Event>,
    pub buffered: TimeRanges,
    pub total_bytes: usize,
    pub configs: usize,
}

/// Load a script, picking the format from the file extension.
pub fn load_script(path: &Path) -> Result<Script> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script: {:?}", path))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let script = if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON script: {:?}", path))?
    } else {
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML script: {:?}", path))?
    };

    Ok(script)
}

/// Run `script` against a fresh stream configured from `config`.
pub fn run(script: &Script, config: &Config) -> Result<Report> {
    let mut settings: StreamSettings = config.stream_settings(script.track);
    if let Some(limit) = script.memory_limit {
        settings.memory_limit = limit;
    }

    let mut stream = match script.track {
        TrackKind::Audio => BufferStream::new_audio(script.decoder.audio_config(), settings),
        TrackKind::Video => BufferStream::new_video(script.decoder.video_config(), settings),
    };
    let mut events = Vec::new();

    for (index, op) in script.ops.iter().enumerate() {
        tracing::debug!("Replaying op {}: {:?}", index, op);
        apply(&mut stream, op, &mut events).with_context(|| format!("Op {} failed", index))?;
    }

    Ok(Report {
        track: script.track,
        settings: stream.settings().clone(),
        events,
        buffered: stream.buffered_ranges(),
        total_bytes: stream.total_bytes(),
        configs: stream.config_count(),
    })
}

fn apply(stream: &mut BufferStream, op: &Op, events: &mut Vec<Event>) -> Result<()> {
    match op {
        Op::NewSegment { start_ms } => {
            stream.on_new_media_segment(millis(*start_ms)?);
        }
        Op::Append { units } => {
            let buffers = units
                .iter()
                .map(UnitSpec::to_access_unit)
                .collect::<Result<Vec<_>>>()?;
            if let Err(e) = stream.append(buffers) {
                events.push(Event::AppendRejected {
                    reason: e.to_string(),
                });
            }
        }
        Op::UpdateConfig { decoder } => {
            let result: ConfigResult<ConfigId> = match stream.kind() {
                TrackKind::Audio => stream.update_audio_config(decoder.audio_config()),
                TrackKind::Video => stream.update_video_config(decoder.video_config()),
            };
            if let Err(e) = result {
                events.push(Event::ConfigRejected {
                    reason: e.to_string(),
                });
            }
        }
        Op::Seek { ts_ms } => {
            if *ts_ms < 0 {
                anyhow::bail!("Cannot seek to negative time {}ms", ts_ms);
            }
            stream.seek(millis(*ts_ms)?);
            if stream.is_seek_pending() {
                events.push(Event::SeekPending { ts_ms: *ts_ms });
            }
        }
        Op::Read { n } => {
            for _ in 0..*n {
                events.push(read_one(stream));
            }
        }
        Op::Remove {
            start_ms,
            end_ms,
            duration_ms,
        } => {
            stream.remove(
                millis(*start_ms)?,
                millis(*end_ms)?,
                millis(*duration_ms)?,
            );
        }
        Op::SetDuration { duration_ms } => {
            stream.on_set_duration(millis(*duration_ms)?);
        }
        Op::EndOfStream => {
            if stream.is_end_of_stream() {
                anyhow::bail!("End of stream already marked");
            }
            stream.mark_end_of_stream();
        }
        Op::UnmarkEndOfStream => {
            if !stream.is_end_of_stream() {
                anyhow::bail!("End of stream is not marked");
            }
            stream.unmark_end_of_stream();
        }
    }

    Ok(())
}

/// Pull once. A config change is acknowledged straight away so the next
/// pull can proceed.
fn read_one(stream: &mut BufferStream) -> Event {
    match stream.get_next_buffer() {
        NextBuffer::Buffer(unit) => Event::Buffer {
            ts_ms: unit.timestamp().as_millis(),
            key: unit.is_keyframe(),
            cfg: unit.config_id(),
        },
        NextBuffer::ConfigChange => {
            match stream.kind() {
                TrackKind::Audio => {
                    stream.current_audio_config();
                }
                TrackKind::Video => {
                    stream.current_video_config();
                }
            }
            Event::ConfigChange {
                cfg: stream.current_config_id(),
            }
        }
        NextBuffer::EndOfStream => Event::EndOfStream,
        NextBuffer::NeedMoreData => Event::NeedData,
    }
}
