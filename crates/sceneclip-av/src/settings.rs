//! Encode and rescale parameters for the output container.
//!
//! Defaults reproduce the fixed targets the tool has always written:
//! 360x200 H.264 at 23.976 fps and 48kHz stereo AC-3.

use serde::{Deserialize, Serialize};

use crate::time::TimeBase;

/// Pixel layouts the rescaler can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    #[default]
    Yuv420p,
    Yuv422p,
    Yuv444p,
    Nv12,
    Rgb24,
}

/// Video encoders the writer can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    #[default]
    H264,
    Hevc,
    Mpeg4,
}

impl VideoCodec {
    pub fn name(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "h264",
            VideoCodec::Hevc => "hevc",
            VideoCodec::Mpeg4 => "mpeg4",
        }
    }
}

/// Audio encoders the writer can open. All of them take planar float input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    #[default]
    Ac3,
    Eac3,
    Aac,
}

impl AudioCodec {
    pub fn name(&self) -> &'static str {
        match self {
            AudioCodec::Ac3 => "ac3",
            AudioCodec::Eac3 => "eac3",
            AudioCodec::Aac => "aac",
        }
    }
}

/// Output channel layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelSetup {
    #[serde(rename = "mono")]
    Mono,
    #[default]
    #[serde(rename = "stereo")]
    Stereo,
    #[serde(rename = "5.1")]
    Surround51,
}

impl ChannelSetup {
    pub fn channels(&self) -> usize {
        match self {
            ChannelSetup::Mono => 1,
            ChannelSetup::Stereo => 2,
            ChannelSetup::Surround51 => 6,
        }
    }
}

/// Picture geometry and pixel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PictureFormat {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub pixel_format: PixelFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoParams {
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    /// Bits per second.
    pub bit_rate: usize,
    /// Encoder time base; the frame rate is its reciprocal.
    pub time_base: TimeBase,
    pub gop_size: u32,
    /// Encoder preset passed as a codec option, when the encoder has one.
    pub preset: Option<String>,
    /// Requested container stream time base. The muxer may pick another.
    pub stream_time_base: TimeBase,
}

impl Default for VideoParams {
    fn default() -> Self {
        Self {
            codec: VideoCodec::H264,
            width: 360,
            height: 200,
            pixel_format: PixelFormat::Yuv420p,
            bit_rate: 1_153_000,
            time_base: TimeBase::new(1001, 24000),
            gop_size: 1,
            preset: Some("slow".to_string()),
            stream_time_base: TimeBase::MILLISECONDS,
        }
    }
}

impl VideoParams {
    pub fn picture(&self) -> PictureFormat {
        PictureFormat {
            width: self.width,
            height: self.height,
            pixel_format: self.pixel_format,
        }
    }

    /// Frames per second as `num/den`.
    pub fn frame_rate(&self) -> (i32, i32) {
        (self.time_base.den, self.time_base.num)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioParams {
    pub codec: AudioCodec,
    /// Bits per second.
    pub bit_rate: usize,
    pub sample_rate: u32,
    pub channels: ChannelSetup,
    /// Frame size used when the encoder accepts any frame length.
    pub fallback_frame_size: usize,
}

impl Default for AudioParams {
    fn default() -> Self {
        Self {
            codec: AudioCodec::Ac3,
            bit_rate: 384_000,
            sample_rate: 48000,
            channels: ChannelSetup::Stereo,
            fallback_frame_size: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RescalerParams {
    /// Geometry the scaling transform expects its input in.
    pub source: PictureFormat,
    /// Time base decoded video timestamps are read in.
    pub input_time_base: TimeBase,
    /// Build the transform from the decoder's geometry instead of `source`.
    pub match_input: bool,
}

impl Default for RescalerParams {
    fn default() -> Self {
        Self {
            source: PictureFormat {
                width: 720,
                height: 400,
                pixel_format: PixelFormat::Yuv420p,
            },
            input_time_base: TimeBase::MILLISECONDS,
            match_input: false,
        }
    }
}

/// Everything the pipeline needs besides paths and the trim window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncodeSettings {
    #[serde(default)]
    pub video: VideoParams,

    #[serde(default)]
    pub audio: AudioParams,

    #[serde(default)]
    pub rescaler: RescalerParams,

    /// Muxer name; guessed from the output extension when unset.
    #[serde(default)]
    pub output_format: Option<String>,
}
