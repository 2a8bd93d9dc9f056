//! Codec engine glue over `ffmpeg-the-third`.
//!
//! Maps the pipeline's settings onto FFmpeg types and lets FFmpeg frames
//! travel through the generic chain, rescaler and repacker.

use std::sync::Once;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::Id as CodecId;
use ffmpeg::format::sample::Type as SampleType;
use ffmpeg::format::{Pixel, Sample};
use ffmpeg::util::channel_layout::{ChannelLayout, ChannelLayoutMask};
use ffmpeg::util::frame::audio::Audio as AudioFrame;
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::util::frame::Frame;
use ffmpeg::Rational;

use crate::resample::SampleBuffer;
use crate::settings::{AudioCodec, ChannelSetup, PixelFormat, VideoCodec};
use crate::time::{TimeBase, Timestamped};
use crate::{Error, Result};

static FFMPEG_INIT: Once = Once::new();

/// Initialise FFmpeg once per process.
pub fn init() {
    FFMPEG_INIT.call_once(|| {
        if let Err(e) = ffmpeg::init() {
            tracing::error!("Failed to initialize FFmpeg: {}", e);
        }
    });
}

/// Numeric status behind an FFmpeg error.
pub fn engine_code(err: &ffmpeg::Error) -> i32 {
    i32::from(*err)
}

/// True for the "try again after feeding/draining" signal of send/receive calls.
pub fn is_again(err: &ffmpeg::Error) -> bool {
    matches!(err, ffmpeg::Error::Other { errno } if *errno == libc::EAGAIN)
}

impl From<TimeBase> for Rational {
    fn from(tb: TimeBase) -> Self {
        Rational::new(tb.num, tb.den)
    }
}

impl From<Rational> for TimeBase {
    fn from(r: Rational) -> Self {
        TimeBase::new(r.numerator(), r.denominator())
    }
}

pub fn pixel(format: PixelFormat) -> Pixel {
    match format {
        PixelFormat::Yuv420p => Pixel::YUV420P,
        PixelFormat::Yuv422p => Pixel::YUV422P,
        PixelFormat::Yuv444p => Pixel::YUV444P,
        PixelFormat::Nv12 => Pixel::NV12,
        PixelFormat::Rgb24 => Pixel::RGB24,
    }
}

/// The settings-level name for a decoder's pixel format, if it has one.
pub fn pixel_format_of(format: Pixel) -> Result<PixelFormat> {
    match format {
        Pixel::YUV420P => Ok(PixelFormat::Yuv420p),
        Pixel::YUV422P => Ok(PixelFormat::Yuv422p),
        Pixel::YUV444P => Ok(PixelFormat::Yuv444p),
        Pixel::NV12 => Ok(PixelFormat::Nv12),
        Pixel::RGB24 => Ok(PixelFormat::Rgb24),
        other => Err(Error::UnsupportedFormat(format!("pixel format {:?}", other))),
    }
}

pub fn video_codec_id(codec: VideoCodec) -> CodecId {
    match codec {
        VideoCodec::H264 => CodecId::H264,
        VideoCodec::Hevc => CodecId::HEVC,
        VideoCodec::Mpeg4 => CodecId::MPEG4,
    }
}

pub fn audio_codec_id(codec: AudioCodec) -> CodecId {
    match codec {
        AudioCodec::Ac3 => CodecId::AC3,
        AudioCodec::Eac3 => CodecId::EAC3,
        AudioCodec::Aac => CodecId::AAC,
    }
}

pub fn channel_layout(setup: ChannelSetup) -> ChannelLayout<'static> {
    match setup {
        ChannelSetup::Mono => ChannelLayout::MONO,
        ChannelSetup::Stereo => ChannelLayout::STEREO,
        ChannelSetup::Surround51 => ChannelLayout::_5POINT1,
    }
}

pub fn channel_mask(setup: ChannelSetup) -> ChannelLayoutMask {
    match setup {
        ChannelSetup::Mono => ChannelLayoutMask::MONO,
        ChannelSetup::Stereo => ChannelLayoutMask::STEREO,
        ChannelSetup::Surround51 => ChannelLayoutMask::_5POINT1,
    }
}

/// Planar float, the only sample format the repacker copies.
pub const PLANAR_F32: Sample = Sample::F32(SampleType::Planar);

/// Allocation parameters for encoder-bound audio frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioLayout {
    pub setup: ChannelSetup,
    pub rate: u32,
}

impl Timestamped for VideoFrame {
    fn pts(&self) -> Option<i64> {
        Frame::pts(self)
    }

    fn set_pts(&mut self, pts: Option<i64>) {
        Frame::set_pts(self, pts);
    }

    fn dts(&self) -> Option<i64> {
        let dts = unsafe { (*self.as_ptr()).pkt_dts };
        (dts != ffmpeg::ffi::AV_NOPTS_VALUE).then_some(dts)
    }

    fn set_dts(&mut self, dts: Option<i64>) {
        unsafe {
            (*self.as_mut_ptr()).pkt_dts = dts.unwrap_or(ffmpeg::ffi::AV_NOPTS_VALUE);
        }
    }
}

impl Timestamped for AudioFrame {
    fn pts(&self) -> Option<i64> {
        Frame::pts(self)
    }

    fn set_pts(&mut self, pts: Option<i64>) {
        Frame::set_pts(self, pts);
    }
}

impl SampleBuffer for AudioFrame {
    type Layout = AudioLayout;

    fn allocate(layout: &AudioLayout, capacity: usize) -> Result<Self> {
        let mut frame = AudioFrame::new(PLANAR_F32, capacity, channel_mask(layout.setup));
        if frame.is_empty() && capacity > 0 {
            return Err(Error::ResourceAllocation(format!(
                "audio frame of {} samples",
                capacity
            )));
        }
        frame.set_rate(layout.rate);
        Ok(frame)
    }

    fn channels(&self) -> usize {
        self.ch_layout().channels() as usize
    }

    fn samples(&self) -> usize {
        AudioFrame::samples(self)
    }

    fn set_samples(&mut self, samples: usize) {
        AudioFrame::set_samples(self, samples);
    }

    fn plane(&self, channel: usize) -> &[f32] {
        debug_assert_eq!(self.format(), PLANAR_F32);
        let bytes = self.data(channel);
        let len = AudioFrame::samples(self).min(bytes.len() / std::mem::size_of::<f32>());
        // FFmpeg sample planes are allocated with at least 16-byte alignment.
        unsafe { std::slice::from_raw_parts(bytes.as_ptr() as *const f32, len) }
    }

    fn plane_mut(&mut self, channel: usize) -> &mut [f32] {
        debug_assert_eq!(self.format(), PLANAR_F32);
        let bytes = self.data_mut(channel);
        let len = bytes.len() / std::mem::size_of::<f32>();
        unsafe { std::slice::from_raw_parts_mut(bytes.as_mut_ptr() as *mut f32, len) }
    }
}
