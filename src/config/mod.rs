mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./mediabuf.toml",
        "~/.config/mediabuf/config.toml",
        "/etc/mediabuf/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    for (name, track) in [("audio", &config.audio), ("video", &config.video)] {
        if track.memory_limit == Some(0) {
            anyhow::bail!("[{}] memory_limit cannot be 0", name);
        }
        if track.fudge_multiplier <= 0 {
            anyhow::bail!("[{}] fudge_multiplier must be positive", name);
        }
        if track.default_buffer_duration_ms <= 0 {
            anyhow::bail!("[{}] default_buffer_duration_ms must be positive", name);
        }
        if track.seek_to_start_window_ms < 0 {
            anyhow::bail!("[{}] seek_to_start_window_ms cannot be negative", name);
        }
    }

    if let (Some(audio), Some(video)) = (config.audio.memory_limit, config.video.memory_limit) {
        if audio > video {
            tracing::warn!(
                "Audio memory limit ({} bytes) is larger than the video limit ({} bytes)",
                audio,
                video
            );
        }
    }

    Ok(())
}
