//! The driver loop tying reader, rescaler, repacker and writer together.

use serde::Serialize;

use crate::chain::FrameChain;
use crate::interleave::{write_interleaved, InterleaveSink};
use crate::rescale::{PictureTransform, VideoRescaler};
use crate::resample::{AudioResampler, SampleBuffer};
use crate::time::Timestamped;
use crate::Result;

/// One decode step's worth of frames, all from a single stream.
#[derive(Debug)]
pub enum DecodedUnit<V, A> {
    Video(FrameChain<V>),
    Audio(FrameChain<A>),
}

impl<V, A> DecodedUnit<V, A> {
    pub fn len(&self) -> usize {
        match self {
            DecodedUnit::Video(chain) => chain.len(),
            DecodedUnit::Audio(chain) => chain.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The decoding end of the pipeline.
pub trait FrameSource {
    type Video: Timestamped;
    type Audio: SampleBuffer;

    /// Next non-empty unit of frames, or `None` once the input is exhausted
    /// or every stream has left the trim window.
    fn next_unit(&mut self) -> Result<Option<DecodedUnit<Self::Video, Self::Audio>>>;
}

/// Counters for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Units handed out by the source.
    pub units: usize,
    /// Decoded frames discarded for lying outside the trim window.
    pub dropped_frames: usize,
    pub video_frames_in: usize,
    pub audio_frames_in: usize,
    /// Frames written to the sink.
    pub video_frames_out: usize,
    pub audio_frames_out: usize,
}

/// Run every unit of `source` through the transforms, then write both
/// resulting chains to `sink` interleaved.
///
/// The sink sees nothing until the source is exhausted.
pub fn drive<S, T, A, K>(
    source: &mut S,
    rescaler: &mut VideoRescaler<T>,
    resampler: &mut AudioResampler<A>,
    sink: &mut K,
) -> Result<PipelineStats>
where
    S: FrameSource,
    T: PictureTransform<Input = S::Video>,
    A: SampleBuffer,
    K: InterleaveSink<Video = T::Output, Audio = A>,
{
    let mut stats = PipelineStats::default();

    while let Some(unit) = source.next_unit()? {
        stats.units += 1;
        match unit {
            DecodedUnit::Video(mut chain) => {
                stats.dropped_frames += chain.retain_kept();
                for node in chain {
                    rescaler.put(node.payload())?;
                    stats.video_frames_in += 1;
                }
            }
            DecodedUnit::Audio(mut chain) => {
                stats.dropped_frames += chain.retain_kept();
                for node in chain {
                    resampler.put(node.payload())?;
                    stats.audio_frames_in += 1;
                }
            }
        }
    }

    let video = rescaler.drain();
    let audio = resampler.drain()?;
    tracing::info!(
        units = stats.units,
        video = video.len(),
        audio = audio.len(),
        dropped = stats.dropped_frames,
        "input exhausted"
    );

    let written = write_interleaved(sink, video, audio)?;
    stats.video_frames_out = written.video_frames;
    stats.audio_frames_out = written.audio_frames;
    Ok(stats)
}

#[cfg(feature = "native-ffmpeg")]
pub use native::{trim_file, TrimReport, TrimRequest};

#[cfg(feature = "native-ffmpeg")]
mod native {
    use std::path::PathBuf;
    use std::time::Instant;

    use serde::Serialize;

    use super::{drive, PipelineStats};
    use crate::chain::MediaKind;
    use crate::interleave::InterleaveSink;
    use crate::reader::SourceReader;
    use crate::rescale::{SwsTransform, VideoRescaler};
    use crate::resample::AudioResampler;
    use crate::settings::EncodeSettings;
    use crate::trim::validate_seconds;
    use crate::writer::{PacketCounts, SinkWriter};
    use crate::Result;

    /// Which file to trim, where to, and the window in seconds.
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct TrimRequest {
        pub input: PathBuf,
        pub output: PathBuf,
        pub start: f64,
        pub end: f64,
    }

    /// Outcome of a finished trim.
    #[derive(Debug, Clone, Serialize)]
    pub struct TrimReport {
        pub input: PathBuf,
        pub output: PathBuf,
        pub start: f64,
        pub end: f64,
        pub stats: PipelineStats,
        pub packets: PacketCounts,
        pub elapsed_ms: u64,
    }

    /// Trim `request.input` to its window and re-encode it into
    /// `request.output`.
    ///
    /// The output trailer is only written when every stage succeeded.
    pub fn trim_file(request: &TrimRequest, settings: &EncodeSettings) -> Result<TrimReport> {
        let started = Instant::now();
        validate_seconds(request.start, request.end)?;

        let mut reader = SourceReader::open(&request.input, request.start, request.end)?;
        let mut writer = SinkWriter::open(&request.output, settings)?;
        reader.convert_audio(writer.audio_layout());

        let (source_picture, input_time_base) = if settings.rescaler.match_input {
            (reader.video_geometry()?, reader.video_time_base())
        } else {
            (settings.rescaler.source, settings.rescaler.input_time_base)
        };

        let transform = SwsTransform::new(source_picture, settings.video.picture())?;
        let mut rescaler = VideoRescaler::new(
            transform,
            input_time_base,
            writer.time_base(MediaKind::Video),
            writer.stream_index(MediaKind::Video),
        );
        let mut resampler = AudioResampler::new(writer.audio_target())?;

        let stats = drive(&mut reader, &mut rescaler, &mut resampler, &mut writer)?;
        let packets = writer.close()?;
        reader.close();

        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            output = %request.output.display(),
            video_packets = packets.video,
            audio_packets = packets.audio,
            elapsed_ms,
            "trim complete"
        );

        Ok(TrimReport {
            input: request.input.clone(),
            output: request.output.clone(),
            start: request.start,
            end: request.end,
            stats,
            packets,
            elapsed_ms,
        })
    }
}
