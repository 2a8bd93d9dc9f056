//! # sceneclip-av
//!
//! Frame pipeline for cutting a time window out of a media file and
//! re-encoding it.
//!
//! This crate provides:
//! - An owning frame chain used to hand decoded and encoded frames between stages
//! - A source reader that decodes one video and one audio stream and keeps
//!   only the frames inside a trim window, rebased to start at zero
//! - A video rescaler that converts pictures to the encoder's geometry
//! - An audio repacker that regroups samples into fixed-size encoder frames
//! - A sink writer that encodes both chains interleaved in presentation order
//!
//! The chain, window, repacking and interleaving logic is generic over small
//! traits ([`Timestamped`], [`SampleBuffer`], [`PictureTransform`],
//! [`FrameSource`], [`InterleaveSink`]) and builds without FFmpeg.
//!
//! ## Features
//!
//! - `native-ffmpeg` (default) - Reader, writer and transforms over `ffmpeg-the-third`
//!
//! ## Example
//!
//! ```no_run
//! use sceneclip_av::{trim_file, EncodeSettings, TrimRequest};
//!
//! let request = TrimRequest {
//!     input: "/path/to/movie.mp4".into(),
//!     output: "/path/to/clip.mkv".into(),
//!     start: 2.0,
//!     end: 5.0,
//! };
//! let report = trim_file(&request, &EncodeSettings::default())?;
//! println!("wrote {} video packets", report.packets.video);
//! # Ok::<(), sceneclip_av::Error>(())
//! ```

pub mod chain;
mod error;
pub mod interleave;
pub mod pipeline;
pub mod resample;
pub mod rescale;
pub mod settings;
pub mod time;
pub mod trim;

#[cfg(feature = "native-ffmpeg")]
pub mod engine;
#[cfg(feature = "native-ffmpeg")]
pub mod reader;
#[cfg(feature = "native-ffmpeg")]
pub mod writer;

// Re-exports
pub use chain::{FrameChain, FrameNode, MediaKind, StreamTag};
pub use error::{Error, Result, GENERIC_STATUS};
pub use interleave::{write_interleaved, InterleaveSink, InterleaveStats};
pub use pipeline::{drive, DecodedUnit, FrameSource, PipelineStats};
pub use resample::{AudioResampler, AudioTarget, PcmBuffer, SampleBuffer};
pub use rescale::{PictureTransform, VideoRescaler};
pub use settings::{EncodeSettings, PictureFormat};
pub use time::{compare_ts, TimeBase, Timestamped};
pub use trim::{Track, TrackPair, TrackState, TrimWindow, WindowState};

#[cfg(feature = "native-ffmpeg")]
pub use pipeline::{trim_file, TrimReport, TrimRequest};
#[cfg(feature = "native-ffmpeg")]
pub use reader::SourceReader;
#[cfg(feature = "native-ffmpeg")]
pub use rescale::SwsTransform;
#[cfg(feature = "native-ffmpeg")]
pub use writer::{PacketCounts, SinkWriter};
