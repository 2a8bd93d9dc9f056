//! Source reader: demux, decode and trim-window one input file.

use std::ops::DerefMut;
use std::path::{Path, PathBuf};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::decoder;
use ffmpeg::format::context::Input;
use ffmpeg::media::Type as MediaType;
use ffmpeg::software::resampling;
use ffmpeg::util::frame::audio::Audio as AudioFrame;
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::util::frame::Frame;
use ffmpeg::Packet;

use crate::chain::{FrameChain, FrameNode, MediaKind, StreamTag};
use crate::engine::{
    channel_layout, engine_code, init, is_again, pixel_format_of, AudioLayout, PLANAR_F32,
};
use crate::pipeline::{DecodedUnit, FrameSource};
use crate::settings::PictureFormat;
use crate::resample::SampleBuffer;
use crate::time::{TimeBase, Timestamped};
use crate::trim::{validate_seconds, Track, TrackPair, TrimWindow};
use crate::{Error, Result};

/// A frame type a decoder can fill.
trait Decoded: Timestamped + DerefMut<Target = Frame> {
    fn blank() -> Self;
}

impl Decoded for VideoFrame {
    fn blank() -> Self {
        VideoFrame::empty()
    }
}

impl Decoded for AudioFrame {
    fn blank() -> Self {
        AudioFrame::empty()
    }
}

/// Feed one packet (or the end-of-stream signal for `None`) to `decoder` and
/// window what it hands back.
fn decode_step<F, D>(
    track: &mut Track,
    decoder: &mut D,
    packet: Option<&Packet>,
) -> Result<FrameChain<F>>
where
    F: Decoded,
    D: DerefMut<Target = decoder::Opened>,
{
    let kind = track.kind();
    let sent = match packet {
        Some(packet) => decoder.send_packet(packet),
        None => decoder.send_eof(),
    };
    match sent {
        Ok(()) => {}
        Err(ffmpeg::Error::Eof) if packet.is_none() => {}
        Err(e) => return Err(Error::decode(kind, e.to_string(), engine_code(&e))),
    }

    track.collect(packet.is_none(), || receive::<F>(&mut **decoder, kind))
}

/// Pull one frame out of `decoder`; `None` when it needs more input or is done.
fn receive<F: Decoded>(decoder: &mut decoder::Opened, kind: MediaKind) -> Result<Option<F>> {
    let mut frame = F::blank();
    match decoder.receive_frame(&mut *frame) {
        Ok(()) => {
            if frame.pts().is_none() {
                let best_effort = frame.timestamp();
                frame.set_pts(best_effort);
            }
            Ok(Some(frame))
        }
        Err(ffmpeg::Error::Eof) => Ok(None),
        Err(e) if is_again(&e) => Ok(None),
        Err(e) => Err(Error::decode(kind, e.to_string(), engine_code(&e))),
    }
}

/// Samples requested per call when draining the converter.
const FLUSH_CHUNK: usize = 1024;

/// Output samples one `run` may produce: the rate-scaled input plus what the
/// converter already holds.
fn output_capacity(input_samples: usize, from_rate: u32, to_rate: u32, pending: i64) -> usize {
    let scaled = (input_samples as u64 * to_rate as u64).div_ceil(from_rate.max(1) as u64);
    scaled as usize + pending.max(0) as usize
}

/// Converts decoded audio into the planar float layout the repacker copies.
struct AudioConverter {
    target: AudioLayout,
    context: Option<resampling::Context>,
    source_rate: u32,
}

impl AudioConverter {
    fn new(target: AudioLayout) -> Self {
        Self {
            target,
            context: None,
            source_rate: target.rate,
        }
    }

    fn needs_conversion(&self, frame: &AudioFrame) -> bool {
        frame.format() != PLANAR_F32
            || frame.rate() != self.target.rate
            || frame.ch_layout().channels() as usize != self.target.setup.channels()
    }

    fn convert(&mut self, frame: &AudioFrame) -> Result<Option<AudioFrame>> {
        if self.context.is_none() {
            if !self.needs_conversion(frame) {
                return Ok(None);
            }
            let context = resampling::Context::get2(
                frame.format(),
                frame.ch_layout(),
                frame.rate(),
                PLANAR_F32,
                channel_layout(self.target.setup),
                self.target.rate,
            )
            .map_err(|e| Error::Transform {
                message: format!("could not build audio converter: {}", e),
                code: engine_code(&e),
            })?;
            tracing::debug!(
                from_rate = frame.rate(),
                to_rate = self.target.rate,
                channels = self.target.setup.channels(),
                "audio converter ready"
            );
            self.source_rate = frame.rate();
            self.context = Some(context);
        }

        let Some(context) = self.context.as_mut() else {
            return Ok(None);
        };
        let pending = context.delay().map_or(0, |delay| delay.output);
        let capacity = output_capacity(
            AudioFrame::samples(frame),
            self.source_rate,
            self.target.rate,
            pending,
        );
        let mut converted = AudioFrame::allocate(&self.target, capacity)?;
        context
            .run(frame, &mut converted)
            .map_err(|e| Error::Transform {
                message: format!("could not convert audio: {}", e),
                code: engine_code(&e),
            })?;
        converted.set_pts(Timestamped::pts(frame));
        Ok(Some(converted))
    }

    /// Drain the samples the converter still buffers. Later calls return
    /// nothing.
    fn finish(&mut self) -> Result<Vec<AudioFrame>> {
        let Some(mut context) = self.context.take() else {
            return Ok(Vec::new());
        };

        let mut tail = Vec::new();
        loop {
            let pending = context.delay().map_or(0, |delay| delay.output);
            let capacity = output_capacity(0, self.source_rate, self.target.rate, pending)
                .max(FLUSH_CHUNK);
            let mut frame = AudioFrame::allocate(&self.target, capacity)?;
            context.flush(&mut frame).map_err(|e| Error::Transform {
                message: format!("could not flush audio converter: {}", e),
                code: engine_code(&e),
            })?;
            if SampleBuffer::samples(&frame) == 0 {
                break;
            }
            tail.push(frame);
        }

        tracing::debug!(
            frames = tail.len(),
            samples = tail.iter().map(SampleBuffer::samples).sum::<usize>(),
            "audio converter drained"
        );
        Ok(tail)
    }
}

/// Reads one input file and hands out trimmed, rebased decoded frames.
pub struct SourceReader {
    path: PathBuf,
    input: Input,
    tracks: TrackPair,
    video_decoder: decoder::Video,
    audio_decoder: decoder::Audio,
    video_time_base: TimeBase,
    converter: Option<AudioConverter>,
    exhausted: bool,
}

impl SourceReader {
    /// Open `path`, pick the best video and audio streams and position the
    /// input at `start` seconds.
    pub fn open(path: &Path, start: f64, end: f64) -> Result<Self> {
        validate_seconds(start, end)?;
        init();

        let mut input = ffmpeg::format::input(path).map_err(|e| Error::InputOpen {
            path: path.to_path_buf(),
            message: e.to_string(),
            code: engine_code(&e),
        })?;

        let (video_index, video_tb, video_decoder) = {
            let stream = input
                .streams()
                .best(MediaType::Video)
                .ok_or(Error::StreamNotFound {
                    kind: MediaKind::Video,
                })?;
            let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
                .and_then(|ctx| ctx.decoder().video())
                .map_err(|e| codec_open(MediaKind::Video, &e))?;
            (stream.index(), TimeBase::from(stream.time_base()), decoder)
        };

        let (audio_index, audio_tb, audio_decoder) = {
            let stream = input
                .streams()
                .best(MediaType::Audio)
                .ok_or(Error::StreamNotFound {
                    kind: MediaKind::Audio,
                })?;
            let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
                .and_then(|ctx| ctx.decoder().audio())
                .map_err(|e| codec_open(MediaKind::Audio, &e))?;
            (stream.index(), TimeBase::from(stream.time_base()), decoder)
        };

        let tracks = TrackPair::new(
            Track::new(
                MediaKind::Video,
                video_index,
                TrimWindow::from_seconds(start, end, video_tb)?,
            ),
            Track::new(
                MediaKind::Audio,
                audio_index,
                TrimWindow::from_seconds(start, end, audio_tb)?,
            ),
        );

        if start > 0.0 {
            let position = TimeBase::MICROSECONDS.from_seconds(start);
            input.seek(position, ..=position).map_err(|e| Error::Seek {
                message: e.to_string(),
                code: engine_code(&e),
            })?;
        }

        tracing::debug!(
            path = %path.display(),
            video_stream = video_index,
            video_time_base = %video_tb,
            video_window = ?tracks.video.window(),
            audio_stream = audio_index,
            audio_time_base = %audio_tb,
            audio_window = ?tracks.audio.window(),
            "input opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            input,
            tracks,
            video_decoder,
            audio_decoder,
            video_time_base: video_tb,
            converter: None,
            exhausted: false,
        })
    }

    /// Convert kept audio frames to planar float at `target` before they
    /// are handed out.
    pub fn convert_audio(&mut self, target: AudioLayout) {
        self.converter = Some(AudioConverter::new(target));
    }

    /// Picture size and pixel format the video decoder produces.
    pub fn video_geometry(&self) -> Result<PictureFormat> {
        Ok(PictureFormat {
            width: self.video_decoder.width(),
            height: self.video_decoder.height(),
            pixel_format: pixel_format_of(self.video_decoder.format())?,
        })
    }

    /// Time base decoded video timestamps are expressed in.
    pub fn video_time_base(&self) -> TimeBase {
        self.video_time_base
    }

    /// Read packets until a decode step yields frames.
    ///
    /// A packet of a stream other than the chosen video and audio pair is
    /// an [`Error::UnknownStreamIndex`].
    pub fn next_unit(&mut self) -> Result<Option<DecodedUnit<VideoFrame, AudioFrame>>> {
        loop {
            if self.tracks.ended() {
                return Ok(None);
            }

            if self.exhausted {
                let Some(kind) = self.tracks.next_to_flush() else {
                    return Ok(None);
                };
                let unit = self.decode(kind, None)?;
                if !unit.is_empty() {
                    return Ok(Some(unit));
                }
                continue;
            }

            let (index, packet) = match self.input.packets().next() {
                Some(Ok((stream, packet))) => (stream.index(), packet),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "read failed, treating as end of input");
                    self.exhausted = true;
                    continue;
                }
                None => {
                    tracing::debug!("end of input, flushing decoders");
                    self.exhausted = true;
                    continue;
                }
            };

            let Some(kind) = self.tracks.route(index)? else {
                tracing::trace!(index, "packet of a finished stream skipped");
                continue;
            };
            let unit = self.decode(kind, Some(&packet))?;
            if !unit.is_empty() {
                return Ok(Some(unit));
            }
        }
    }

    fn decode(
        &mut self,
        kind: MediaKind,
        packet: Option<&Packet>,
    ) -> Result<DecodedUnit<VideoFrame, AudioFrame>> {
        match kind {
            MediaKind::Video => Ok(DecodedUnit::Video(decode_step(
                &mut self.tracks.video,
                &mut self.video_decoder,
                packet,
            )?)),
            MediaKind::Audio => {
                let chain = decode_step(&mut self.tracks.audio, &mut self.audio_decoder, packet)?;
                Ok(DecodedUnit::Audio(self.convert(chain)?))
            }
        }
    }

    fn convert(&mut self, mut chain: FrameChain<AudioFrame>) -> Result<FrameChain<AudioFrame>> {
        let Some(converter) = self.converter.as_mut() else {
            return Ok(chain);
        };
        for node in chain.iter_mut() {
            if node.tag().is_dropped() {
                continue;
            }
            if let Some(converted) = converter.convert(node.payload())? {
                *node.payload_mut() = converted;
            }
        }

        // The audio stream is done; hand out what the converter still holds.
        if !self.tracks.audio.is_live() {
            let tag = StreamTag::Stream(self.tracks.audio.index());
            for frame in converter.finish()? {
                chain.append(FrameNode::new(MediaKind::Audio, tag, frame))?;
            }
        }
        Ok(chain)
    }

    /// Close the decoders and the input.
    pub fn close(self) {
        tracing::debug!(path = %self.path.display(), "input closed");
    }
}

impl FrameSource for SourceReader {
    type Video = VideoFrame;
    type Audio = AudioFrame;

    fn next_unit(&mut self) -> Result<Option<DecodedUnit<VideoFrame, AudioFrame>>> {
        SourceReader::next_unit(self)
    }
}

fn codec_open(kind: MediaKind, err: &ffmpeg::Error) -> Error {
    Error::CodecOpen {
        kind,
        message: err.to_string(),
        code: engine_code(err),
    }
}
