//! Sink writer: encoders plus the output container.

use std::path::{Path, PathBuf};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::{self, encoder};
use ffmpeg::format::context::Output;
use ffmpeg::util::frame::audio::Audio as AudioFrame;
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::{Dictionary, Packet, Rational};
use serde::Serialize;

use crate::chain::MediaKind;
use crate::engine::{
    audio_codec_id, channel_layout, engine_code, init, is_again, pixel, video_codec_id,
    AudioLayout, PLANAR_F32,
};
use crate::interleave::InterleaveSink;
use crate::resample::AudioTarget;
use crate::settings::{AudioParams, EncodeSettings, VideoParams};
use crate::time::TimeBase;
use crate::{Error, Result};

/// Packets written per output stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PacketCounts {
    pub video: usize,
    pub audio: usize,
}

/// Bookkeeping for one output stream.
#[derive(Debug, Clone, Copy)]
struct OutputTrack {
    kind: MediaKind,
    index: usize,
    /// Time base the encoder stamps its packets in.
    encoder_time_base: TimeBase,
    packets: usize,
}

/// Encodes video and audio frames into one output file.
pub struct SinkWriter {
    path: PathBuf,
    output: Output,
    video_encoder: encoder::video::Video,
    audio_encoder: encoder::Audio,
    video: OutputTrack,
    audio: OutputTrack,
    audio_layout: AudioLayout,
    audio_frame_size: usize,
}

impl SinkWriter {
    /// Create `path`, add one video and one audio stream, open both encoders
    /// and write the container header.
    pub fn open(path: &Path, settings: &EncodeSettings) -> Result<Self> {
        init();

        let mut output = match &settings.output_format {
            Some(format) => ffmpeg::format::output_as(path, format),
            None => ffmpeg::format::output(path),
        }
        .map_err(|e| {
            Error::write(
                format!("could not create {}: {}", path.display(), e),
                engine_code(&e),
            )
        })?;

        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let (video_encoder, video) = open_video(&mut output, &settings.video, global_header)?;
        let (audio_encoder, audio, audio_frame_size) =
            open_audio(&mut output, &settings.audio, global_header)?;

        output
            .write_header()
            .map_err(|e| Error::write(format!("could not write header: {}", e), engine_code(&e)))?;

        tracing::debug!(
            path = %path.display(),
            video_codec = settings.video.codec.name(),
            audio_codec = settings.audio.codec.name(),
            audio_frame_size,
            global_header,
            "output opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            output,
            video_encoder,
            audio_encoder,
            video,
            audio,
            audio_layout: AudioLayout {
                setup: settings.audio.channels,
                rate: settings.audio.sample_rate,
            },
            audio_frame_size,
        })
    }

    pub fn stream_index(&self, kind: MediaKind) -> usize {
        self.track(kind).index
    }

    /// Layout the audio encoder expects its frames in.
    pub fn audio_layout(&self) -> AudioLayout {
        self.audio_layout
    }

    /// What the repacker has to produce for the audio encoder.
    pub fn audio_target(&self) -> AudioTarget<AudioLayout> {
        AudioTarget {
            layout: self.audio_layout,
            frame_size: self.audio_frame_size,
            sample_rate: self.audio_layout.rate,
            time_base: self.audio.encoder_time_base,
            stream_index: self.audio.index,
        }
    }

    pub fn packet_counts(&self) -> PacketCounts {
        PacketCounts {
            video: self.video.packets,
            audio: self.audio.packets,
        }
    }

    /// Flush both encoders and finish the container.
    pub fn close(mut self) -> Result<PacketCounts> {
        self.video_encoder
            .send_eof()
            .map_err(|e| Error::encode(MediaKind::Video, e.to_string(), engine_code(&e)))?;
        let Self {
            output,
            video_encoder,
            video,
            ..
        } = &mut self;
        drain_packets(output, video, |packet| video_encoder.receive_packet(packet))?;

        self.audio_encoder
            .send_eof()
            .map_err(|e| Error::encode(MediaKind::Audio, e.to_string(), engine_code(&e)))?;
        let Self {
            output,
            audio_encoder,
            audio,
            ..
        } = &mut self;
        drain_packets(output, audio, |packet| audio_encoder.receive_packet(packet))?;

        self.output
            .write_trailer()
            .map_err(|e| Error::write(format!("could not write trailer: {}", e), engine_code(&e)))?;

        let counts = self.packet_counts();
        tracing::debug!(
            path = %self.path.display(),
            video_packets = counts.video,
            audio_packets = counts.audio,
            "output closed"
        );
        Ok(counts)
    }

    fn track(&self, kind: MediaKind) -> &OutputTrack {
        match kind {
            MediaKind::Video => &self.video,
            MediaKind::Audio => &self.audio,
        }
    }
}

impl InterleaveSink for SinkWriter {
    type Video = VideoFrame;
    type Audio = AudioFrame;

    fn time_base(&self, kind: MediaKind) -> TimeBase {
        self.track(kind).encoder_time_base
    }

    fn write_video(&mut self, frame: VideoFrame) -> Result<()> {
        self.video_encoder
            .send_frame(&frame)
            .map_err(|e| Error::encode(MediaKind::Video, e.to_string(), engine_code(&e)))?;
        let Self {
            output,
            video_encoder,
            video,
            ..
        } = self;
        drain_packets(output, video, |packet| video_encoder.receive_packet(packet))
    }

    fn write_audio(&mut self, frame: AudioFrame) -> Result<()> {
        self.audio_encoder
            .send_frame(&frame)
            .map_err(|e| Error::encode(MediaKind::Audio, e.to_string(), engine_code(&e)))?;
        let Self {
            output,
            audio_encoder,
            audio,
            ..
        } = self;
        drain_packets(output, audio, |packet| audio_encoder.receive_packet(packet))
    }
}

/// Write every packet the encoder has ready, rescaled into the time base the
/// muxer chose for the stream.
fn drain_packets<R>(output: &mut Output, track: &mut OutputTrack, mut receive: R) -> Result<()>
where
    R: FnMut(&mut Packet) -> std::result::Result<(), ffmpeg::Error>,
{
    let stream_time_base = output
        .stream(track.index)
        .map(|stream| stream.time_base())
        .ok_or(Error::UnknownStreamIndex(track.index))?;

    loop {
        let mut packet = Packet::empty();
        match receive(&mut packet) {
            Ok(()) => {}
            Err(ffmpeg::Error::Eof) => return Ok(()),
            Err(e) if is_again(&e) => return Ok(()),
            Err(e) => return Err(Error::encode(track.kind, e.to_string(), engine_code(&e))),
        }

        packet.rescale_ts(Rational::from(track.encoder_time_base), stream_time_base);
        packet.set_stream(track.index);
        packet.set_position(-1);
        tracing::trace!(kind = %track.kind, pts = ?packet.pts(), "writing packet");
        packet
            .write_interleaved(output)
            .map_err(|e| Error::write(e.to_string(), engine_code(&e)))?;
        track.packets += 1;
    }
}

fn open_video(
    output: &mut Output,
    params: &VideoParams,
    global_header: bool,
) -> Result<(encoder::video::Video, OutputTrack)> {
    let kind = MediaKind::Video;
    let codec = encoder::find(video_codec_id(params.codec)).ok_or_else(|| Error::CodecOpen {
        kind,
        message: format!("no {} encoder available", params.codec.name()),
        code: crate::error::GENERIC_STATUS,
    })?;

    let index = {
        let mut stream = output.add_stream(codec).map_err(|e| codec_open(kind, &e))?;
        stream.set_time_base(Rational::from(params.stream_time_base));
        stream.index()
    };

    let mut video_enc = codec::context::Context::new_with_codec(codec)
        .encoder()
        .video()
        .map_err(|e| codec_open(kind, &e))?;
    let (fps_num, fps_den) = params.frame_rate();
    video_enc.set_width(params.width);
    video_enc.set_height(params.height);
    video_enc.set_format(pixel(params.pixel_format));
    video_enc.set_time_base(Rational::from(params.time_base));
    video_enc.set_frame_rate(Some(Rational::new(fps_num, fps_den)));
    video_enc.set_bit_rate(params.bit_rate);
    video_enc.set_gop(params.gop_size);
    if global_header {
        video_enc.set_flags(codec::Flags::GLOBAL_HEADER);
    }

    let mut opts = Dictionary::new();
    if let Some(preset) = &params.preset {
        opts.set("preset", preset);
    }
    let video_encoder = video_enc
        .open_as_with(codec, opts)
        .map_err(|e| codec_open(kind, &e))?;

    copy_parameters(output, index, kind, unsafe { video_encoder.as_ptr() })?;

    Ok((
        video_encoder,
        OutputTrack {
            kind,
            index,
            encoder_time_base: params.time_base,
            packets: 0,
        },
    ))
}

fn open_audio(
    output: &mut Output,
    params: &AudioParams,
    global_header: bool,
) -> Result<(encoder::Audio, OutputTrack, usize)> {
    let kind = MediaKind::Audio;
    let codec = encoder::find(audio_codec_id(params.codec)).ok_or_else(|| Error::CodecOpen {
        kind,
        message: format!("no {} encoder available", params.codec.name()),
        code: crate::error::GENERIC_STATUS,
    })?;
    let time_base = TimeBase::per_sample(params.sample_rate);

    let index = {
        let mut stream = output.add_stream(codec).map_err(|e| codec_open(kind, &e))?;
        stream.set_time_base(Rational::from(time_base));
        stream.index()
    };

    let mut audio_enc = codec::context::Context::new_with_codec(codec)
        .encoder()
        .audio()
        .map_err(|e| codec_open(kind, &e))?;
    audio_enc.set_rate(params.sample_rate as i32);
    audio_enc.set_ch_layout(channel_layout(params.channels));
    audio_enc.set_format(PLANAR_F32);
    audio_enc.set_bit_rate(params.bit_rate);
    audio_enc.set_time_base(Rational::from(time_base));
    if global_header {
        audio_enc.set_flags(codec::Flags::GLOBAL_HEADER);
    }

    let audio_encoder = audio_enc
        .open_as_with(codec, Dictionary::new())
        .map_err(|e| codec_open(kind, &e))?;

    let frame_size = match audio_encoder.frame_size() as usize {
        0 => params.fallback_frame_size,
        size => size,
    };

    copy_parameters(output, index, kind, unsafe { audio_encoder.as_ptr() })?;

    Ok((
        audio_encoder,
        OutputTrack {
            kind,
            index,
            encoder_time_base: time_base,
            packets: 0,
        },
        frame_size,
    ))
}

/// Hand the opened encoder's parameters to its output stream.
fn copy_parameters(
    output: &mut Output,
    index: usize,
    kind: MediaKind,
    encoder: *const ffmpeg::ffi::AVCodecContext,
) -> Result<()> {
    let mut stream = output
        .stream_mut(index)
        .ok_or(Error::UnknownStreamIndex(index))?;
    let ret = unsafe {
        ffmpeg::ffi::avcodec_parameters_from_context((*stream.as_mut_ptr()).codecpar, encoder)
    };
    if ret < 0 {
        return Err(Error::CodecOpen {
            kind,
            message: "could not copy encoder parameters to the stream".into(),
            code: ret,
        });
    }
    Ok(())
}

fn codec_open(kind: MediaKind, err: &ffmpeg::Error) -> Error {
    Error::CodecOpen {
        kind,
        message: err.to_string(),
        code: engine_code(err),
    }
}
