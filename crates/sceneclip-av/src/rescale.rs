//! Video rescaling: one decoded picture in, one encoder-ready picture out.

use crate::chain::{FrameChain, FrameNode, MediaKind, StreamTag};
use crate::time::{rescale, TimeBase, Timestamped};
use crate::Result;

/// A per-picture pixel transform.
pub trait PictureTransform {
    type Input: Timestamped;
    type Output: Timestamped;

    fn transform(&mut self, source: &Self::Input) -> Result<Self::Output>;
}

/// Runs decoded pictures through a [`PictureTransform`] and collects them.
pub struct VideoRescaler<T: PictureTransform> {
    transform: T,
    input_time_base: TimeBase,
    output_time_base: TimeBase,
    stream_index: usize,
    chain: FrameChain<T::Output>,
}

impl<T: PictureTransform> VideoRescaler<T> {
    pub fn new(
        transform: T,
        input_time_base: TimeBase,
        output_time_base: TimeBase,
        stream_index: usize,
    ) -> Self {
        Self {
            transform,
            input_time_base,
            output_time_base,
            stream_index,
            chain: FrameChain::new(MediaKind::Video),
        }
    }

    /// Transform `source` and append the result, timestamps moved into the
    /// output time base. Unset timestamps stay unset.
    pub fn put(&mut self, source: &T::Input) -> Result<()> {
        let mut frame = self.transform.transform(source)?;
        frame.set_pts(
            source
                .pts()
                .map(|pts| rescale(pts, self.input_time_base, self.output_time_base)),
        );
        frame.set_dts(
            source
                .dts()
                .map(|dts| rescale(dts, self.input_time_base, self.output_time_base)),
        );

        tracing::trace!(pts = ?frame.pts(), "video frame rescaled");

        self.chain.append(FrameNode::new(
            MediaKind::Video,
            StreamTag::Stream(self.stream_index),
            frame,
        ))
    }

    /// Number of rescaled frames waiting to be drained.
    pub fn pending_frames(&self) -> usize {
        self.chain.len()
    }

    /// Hand over everything rescaled so far.
    pub fn drain(&mut self) -> FrameChain<T::Output> {
        std::mem::replace(&mut self.chain, FrameChain::new(MediaKind::Video))
    }
}

#[cfg(feature = "native-ffmpeg")]
pub use native::SwsTransform;

#[cfg(feature = "native-ffmpeg")]
mod native {
    use ffmpeg_the_third as ffmpeg;
    use ffmpeg::software::scaling::{Context as ScaleCtx, Flags as ScaleFlags};
    use ffmpeg::util::frame::video::Video as VideoFrame;

    use super::PictureTransform;
    use crate::engine::{engine_code, pixel};
    use crate::settings::PictureFormat;
    use crate::{Error, Result};

    /// Bilinear swscale transform between two fixed picture formats.
    pub struct SwsTransform {
        context: ScaleCtx,
        target: PictureFormat,
    }

    impl SwsTransform {
        pub fn new(source: PictureFormat, target: PictureFormat) -> Result<Self> {
            let context = ScaleCtx::get(
                pixel(source.pixel_format),
                source.width,
                source.height,
                pixel(target.pixel_format),
                target.width,
                target.height,
                ScaleFlags::BILINEAR,
            )
            .map_err(|e| Error::Transform {
                message: format!("could not build scaler {source:?} -> {target:?}: {e}"),
                code: engine_code(&e),
            })?;

            tracing::debug!(?source, ?target, "video scaler ready");

            Ok(Self { context, target })
        }
    }

    impl PictureTransform for SwsTransform {
        type Input = VideoFrame;
        type Output = VideoFrame;

        fn transform(&mut self, source: &VideoFrame) -> Result<VideoFrame> {
            let mut scaled = VideoFrame::new(
                pixel(self.target.pixel_format),
                self.target.width,
                self.target.height,
            );
            self.context
                .run(source, &mut scaled)
                .map_err(|e| Error::Transform {
                    message: e.to_string(),
                    code: engine_code(&e),
                })?;
            Ok(scaled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use assert_matches::assert_matches;

    #[derive(Debug, Default)]
    struct Picture {
        id: u32,
        pts: Option<i64>,
        dts: Option<i64>,
    }

    impl Timestamped for Picture {
        fn pts(&self) -> Option<i64> {
            self.pts
        }

        fn set_pts(&mut self, pts: Option<i64>) {
            self.pts = pts;
        }

        fn dts(&self) -> Option<i64> {
            self.dts
        }

        fn set_dts(&mut self, dts: Option<i64>) {
            self.dts = dts;
        }
    }

    /// Copies the id and poisons the timestamps so the rescaler must set them.
    struct Passthrough;

    impl PictureTransform for Passthrough {
        type Input = Picture;
        type Output = Picture;

        fn transform(&mut self, source: &Picture) -> Result<Picture> {
            Ok(Picture {
                id: source.id,
                pts: Some(-1),
                dts: Some(-1),
            })
        }
    }

    struct Failing;

    impl PictureTransform for Failing {
        type Input = Picture;
        type Output = Picture;

        fn transform(&mut self, _: &Picture) -> Result<Picture> {
            Err(Error::Transform {
                message: "bad geometry".into(),
                code: -22,
            })
        }
    }

    #[test]
    fn test_put_rescales_timestamps() {
        let mut rescaler = VideoRescaler::new(
            Passthrough,
            TimeBase::MILLISECONDS,
            TimeBase::new(1001, 24000),
            0,
        );

        for (id, ms) in [(0, 0), (1, 42), (2, 83), (3, 1001)] {
            rescaler
                .put(&Picture {
                    id,
                    pts: Some(ms),
                    dts: Some(ms),
                })
                .unwrap();
        }

        let chain = rescaler.drain();
        let stamps: Vec<(u32, Option<i64>, Option<i64>)> = chain
            .iter()
            .map(|n| (n.payload().id, n.payload().pts, n.payload().dts))
            .collect();
        assert_eq!(
            stamps,
            vec![
                (0, Some(0), Some(0)),
                (1, Some(1), Some(1)),
                (2, Some(2), Some(2)),
                (3, Some(24), Some(24)),
            ]
        );
    }

    #[test]
    fn test_unset_timestamps_stay_unset() {
        let mut rescaler =
            VideoRescaler::new(Passthrough, TimeBase::MILLISECONDS, TimeBase::new(1, 25), 0);
        rescaler.put(&Picture::default()).unwrap();
        let chain = rescaler.drain();
        let frame = chain.head().unwrap().payload();
        assert_eq!(frame.pts, None);
        assert_eq!(frame.dts, None);
    }

    #[test]
    fn test_drain_hands_over_and_clears() {
        let mut rescaler =
            VideoRescaler::new(Passthrough, TimeBase::MILLISECONDS, TimeBase::MILLISECONDS, 0);
        rescaler.put(&Picture::default()).unwrap();
        rescaler.put(&Picture::default()).unwrap();
        assert_eq!(rescaler.pending_frames(), 2);

        let chain = rescaler.drain();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.kind(), MediaKind::Video);
        assert!(chain.iter().all(|n| n.tag() == StreamTag::Stream(0)));
        assert_eq!(rescaler.pending_frames(), 0);
        assert!(rescaler.drain().is_empty());
    }

    #[test]
    fn test_transform_failure_appends_nothing() {
        let mut rescaler =
            VideoRescaler::new(Failing, TimeBase::MILLISECONDS, TimeBase::MILLISECONDS, 0);
        assert_matches!(
            rescaler.put(&Picture::default()),
            Err(Error::Transform { code: -22, .. })
        );
        assert_eq!(rescaler.pending_frames(), 0);
    }
}
