use mediabuf_common::{MediaTime, TrackKind};
use mediabuf_stream::settings::{
    DEFAULT_BUFFER_DURATION, DEFAULT_FUDGE_MULTIPLIER, DEFAULT_SEEK_TO_START_WINDOW,
};
use mediabuf_stream::StreamSettings;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub audio: TrackConfig,

    #[serde(default)]
    pub video: TrackConfig,
}

impl Config {
    pub fn track(&self, kind: TrackKind) -> &TrackConfig {
        match kind {
            TrackKind::Audio => &self.audio,
            TrackKind::Video => &self.video,
        }
    }

    /// Effective engine settings for a track of the given kind.
    pub fn stream_settings(&self, kind: TrackKind) -> StreamSettings {
        self.track(kind).to_settings(kind)
    }
}

/// Tuning for one track kind. Omitted values fall back to the engine
/// defaults for that kind.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackConfig {
    /// Byte budget before garbage collection (default: 12 MiB audio, 150 MiB video)
    #[serde(default)]
    pub memory_limit: Option<usize>,

    /// Gap tolerance as a multiple of the largest inter-buffer distance
    #[serde(default = "default_fudge_multiplier")]
    pub fudge_multiplier: i64,

    /// Seeks inside this window snap to a first range starting within it
    #[serde(default = "default_seek_to_start_window_ms")]
    pub seek_to_start_window_ms: i64,

    /// Inter-buffer distance assumed before one has been measured
    #[serde(default = "default_buffer_duration_ms")]
    pub default_buffer_duration_ms: i64,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            memory_limit: None,
            fudge_multiplier: default_fudge_multiplier(),
            seek_to_start_window_ms: default_seek_to_start_window_ms(),
            default_buffer_duration_ms: default_buffer_duration_ms(),
        }
    }
}

impl TrackConfig {
    pub fn to_settings(&self, kind: TrackKind) -> StreamSettings {
        let defaults = StreamSettings::for_track(kind);
        StreamSettings {
            memory_limit: self.memory_limit.unwrap_or(defaults.memory_limit),
            fudge_multiplier: self.fudge_multiplier,
            seek_to_start_window: MediaTime::from_millis(self.seek_to_start_window_ms),
            default_buffer_duration: MediaTime::from_millis(self.default_buffer_duration_ms),
        }
    }
}

fn default_fudge_multiplier() -> i64 {
    DEFAULT_FUDGE_MULTIPLIER
}

fn default_seek_to_start_window_ms() -> i64 {
    DEFAULT_SEEK_TO_START_WINDOW.as_millis()
}

fn default_buffer_duration_ms() -> i64 {
    DEFAULT_BUFFER_DURATION.as_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_engine_defaults() {
        let config = Config::default();
        assert_eq!(config.stream_settings(TrackKind::Audio), StreamSettings::audio());
        assert_eq!(config.stream_settings(TrackKind::Video), StreamSettings::video());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [audio]
            memory_limit = 4096

            [video]
            fudge_multiplier = 3
            "#,
        )
        .unwrap();

        let audio = config.stream_settings(TrackKind::Audio);
        assert_eq!(audio.memory_limit, 4096);
        assert_eq!(audio.fudge_multiplier, 2);

        let video = config.stream_settings(TrackKind::Video);
        assert_eq!(video.memory_limit, StreamSettings::video().memory_limit);
        assert_eq!(video.fudge_multiplier, 3);
        assert_eq!(video.seek_to_start_window, MediaTime::from_millis(1000));
    }

    #[test]
    fn test_durations_are_milliseconds() {
        let track = TrackConfig {
            seek_to_start_window_ms: 250,
            default_buffer_duration_ms: 20,
            ..Default::default()
        };
        let settings = track.to_settings(TrackKind::Audio);
        assert_eq!(settings.seek_to_start_window, MediaTime::from_millis(250));
        assert_eq!(settings.default_buffer_duration, MediaTime::from_millis(20));
    }
}
