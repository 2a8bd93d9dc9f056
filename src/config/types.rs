use serde::{Deserialize, Serialize};

use sceneclip_av::settings::{AudioParams, EncodeSettings, RescalerParams, VideoParams};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub video: VideoParams,

    #[serde(default)]
    pub audio: AudioParams,

    #[serde(default)]
    pub rescaler: RescalerParams,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Muxer name (e.g. "matroska", "mp4"). Guessed from the output
    /// extension when unset.
    #[serde(default)]
    pub format: Option<String>,
}

impl Config {
    /// The encode settings this config describes.
    pub fn encode_settings(&self) -> EncodeSettings {
        EncodeSettings {
            video: self.video.clone(),
            audio: self.audio.clone(),
            rescaler: self.rescaler.clone(),
            output_format: self.output.format.clone(),
        }
    }
}
