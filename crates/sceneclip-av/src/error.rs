//! Error types for sceneclip-av.

use std::path::PathBuf;

use crate::chain::MediaKind;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Status reported for failures that did not come from the codec engine.
pub const GENERIC_STATUS: i32 = -1;

/// Errors that can occur while trimming a media file.
///
/// Variants raised by the codec engine carry the engine's numeric status in
/// `code`, which becomes the process exit status at the top level.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A frame, buffer or codec context could not be allocated.
    #[error("allocation failed: {0}")]
    ResourceAllocation(String),

    /// The input container could not be opened.
    #[error("could not open input {}: {message}", path.display())]
    InputOpen {
        path: PathBuf,
        message: String,
        code: i32,
    },

    /// The input has no usable stream of the requested kind.
    #[error("no {kind} stream found in input")]
    StreamNotFound { kind: MediaKind },

    /// A decoder or encoder could not be opened.
    #[error("could not open {kind} codec: {message}")]
    CodecOpen {
        kind: MediaKind,
        message: String,
        code: i32,
    },

    /// Seeking to the start of the trim window failed.
    #[error("error seeking to trim start: {message}")]
    Seek { message: String, code: i32 },

    /// The decoder rejected a packet or failed while producing frames.
    #[error("error decoding {kind}: {message}")]
    Decode {
        kind: MediaKind,
        message: String,
        code: i32,
    },

    /// The encoder rejected a frame or failed while producing packets.
    #[error("error encoding {kind}: {message}")]
    Encode {
        kind: MediaKind,
        message: String,
        code: i32,
    },

    /// The output container could not be created or written.
    #[error("error writing output: {message}")]
    Write { message: String, code: i32 },

    /// The trim window is empty, reversed or not a finite position.
    #[error("invalid trim window: start {start}s, end {end}s")]
    InvalidTrimWindow { start: f64, end: f64 },

    /// A packet referenced a stream the reader does not track.
    #[error("undefined stream index {0}")]
    UnknownStreamIndex(usize),

    /// A node of one media kind was appended to a chain of the other.
    #[error("cannot append {found} frame to a {expected} chain")]
    KindMismatch { expected: MediaKind, found: MediaKind },

    /// An audio frame does not match the destination channel count.
    #[error("audio frame has {found} channels, expected {expected}")]
    ChannelMismatch { expected: usize, found: usize },

    /// The pixel transform could not be built or run.
    #[error("error scaling video frame: {message}")]
    Transform { message: String, code: i32 },

    /// A sample or pixel format the pipeline cannot handle.
    #[error("unsupported: {0}")]
    UnsupportedFormat(String),
}

impl Error {
    /// The codec engine status behind this error, or [`GENERIC_STATUS`].
    pub fn code(&self) -> i32 {
        match self {
            Error::InputOpen { code, .. }
            | Error::CodecOpen { code, .. }
            | Error::Seek { code, .. }
            | Error::Decode { code, .. }
            | Error::Encode { code, .. }
            | Error::Write { code, .. }
            | Error::Transform { code, .. } => *code,
            _ => GENERIC_STATUS,
        }
    }

    /// Process exit status for this error. Never zero.
    pub fn exit_code(&self) -> i32 {
        match self.code() & 0xff {
            0 => 1,
            _ => self.code(),
        }
    }

    /// Create a decode error for a media kind.
    pub fn decode(kind: MediaKind, message: impl Into<String>, code: i32) -> Self {
        Self::Decode {
            kind,
            message: message.into(),
            code,
        }
    }

    /// Create an encode error for a media kind.
    pub fn encode(kind: MediaKind, message: impl Into<String>, code: i32) -> Self {
        Self::Encode {
            kind,
            message: message.into(),
            code,
        }
    }

    /// Create a write error.
    pub fn write(message: impl Into<String>, code: i32) -> Self {
        Self::Write {
            message: message.into(),
            code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_code_is_preserved() {
        let err = Error::decode(MediaKind::Audio, "Invalid data found", -1094995529);
        assert_eq!(err.code(), -1094995529);
        assert_eq!(err.to_string(), "error decoding audio: Invalid data found");
    }

    #[test]
    fn test_non_engine_errors_use_generic_status() {
        let err = Error::InvalidTrimWindow {
            start: 5.0,
            end: 2.0,
        };
        assert_eq!(err.code(), GENERIC_STATUS);
        assert_eq!(err.exit_code(), GENERIC_STATUS);

        let err = Error::StreamNotFound {
            kind: MediaKind::Video,
        };
        assert_eq!(err.to_string(), "no video stream found in input");
    }

    #[test]
    fn test_exit_code_never_zero() {
        let err = Error::write("disk full", 256);
        assert_ne!(err.exit_code() & 0xff, 0);
        assert_eq!(err.exit_code(), 1);
    }
}
