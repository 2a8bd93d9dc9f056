mod types;

pub use types::*;

use anyhow::{Context, Result};
use sceneclip_av::TimeBase;
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    tracing::debug!("Loaded config from {:?}", path);
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./sceneclip.toml",
        "~/.config/sceneclip/config.toml",
        "/etc/sceneclip/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    // Return default config if no file found
    Ok(Config::default())
}

fn check_time_base(name: &str, tb: TimeBase) -> Result<()> {
    if !tb.is_valid() {
        anyhow::bail!("{} must be a positive fraction, got {}", name, tb);
    }
    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    // Validate video config
    let video = &config.video;
    if video.width == 0 || video.height == 0 {
        anyhow::bail!(
            "Video size cannot be zero: {}x{}",
            video.width,
            video.height
        );
    }
    if video.bit_rate == 0 {
        anyhow::bail!("Video bit rate cannot be 0");
    }
    check_time_base("video.time_base", video.time_base)?;
    check_time_base("video.stream_time_base", video.stream_time_base)?;

    // Validate audio config
    let audio = &config.audio;
    if audio.sample_rate == 0 {
        anyhow::bail!("Audio sample rate cannot be 0");
    }
    if audio.bit_rate == 0 {
        anyhow::bail!("Audio bit rate cannot be 0");
    }
    if audio.fallback_frame_size == 0 {
        anyhow::bail!("Audio fallback frame size cannot be 0");
    }

    // Validate rescaler config
    let source = &config.rescaler.source;
    if source.width == 0 || source.height == 0 {
        anyhow::bail!(
            "Rescaler source size cannot be zero: {}x{}",
            source.width,
            source.height
        );
    }
    check_time_base("rescaler.input_time_base", config.rescaler.input_time_base)?;

    if let Some(format) = &config.output.format {
        if format.trim().is_empty() {
            anyhow::bail!("Output format cannot be empty");
        }
    }

    Ok(())
}
