//! Merging the video and audio chains into one presentation-ordered write.

use std::cmp::Ordering;

use serde::Serialize;

use crate::chain::{FrameChain, MediaKind};
use crate::time::{compare_ts, TimeBase, Timestamped};
use crate::Result;

/// The encoding end of the pipeline.
pub trait InterleaveSink {
    type Video: Timestamped;
    type Audio: Timestamped;

    /// Time base the frames of `kind` are stamped in when handed over.
    fn time_base(&self, kind: MediaKind) -> TimeBase;

    fn write_video(&mut self, frame: Self::Video) -> Result<()>;

    fn write_audio(&mut self, frame: Self::Audio) -> Result<()>;
}

/// Frames handed to the sink by one interleaved write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InterleaveStats {
    pub video_frames: usize,
    pub audio_frames: usize,
}

/// Hand both chains to `sink` in presentation order.
///
/// Frames are compared across time bases; on a tie the video frame goes
/// first. Once one chain is exhausted the rest of the other follows in its
/// own order. A frame without a timestamp sorts before everything else.
pub fn write_interleaved<S: InterleaveSink>(
    sink: &mut S,
    video: FrameChain<S::Video>,
    audio: FrameChain<S::Audio>,
) -> Result<InterleaveStats> {
    let video_tb = sink.time_base(MediaKind::Video);
    let audio_tb = sink.time_base(MediaKind::Audio);

    let mut video = video.into_iter().map(|node| node.into_payload()).peekable();
    let mut audio = audio.into_iter().map(|node| node.into_payload()).peekable();
    let mut stats = InterleaveStats::default();

    loop {
        let take_video = match (video.peek(), audio.peek()) {
            (None, None) => break,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (Some(v), Some(a)) => {
                compare_ts(
                    v.pts().unwrap_or(i64::MIN),
                    video_tb,
                    a.pts().unwrap_or(i64::MIN),
                    audio_tb,
                ) != Ordering::Greater
            }
        };

        if take_video {
            if let Some(frame) = video.next() {
                sink.write_video(frame)?;
                stats.video_frames += 1;
            }
        } else if let Some(frame) = audio.next() {
            sink.write_audio(frame)?;
            stats.audio_frames += 1;
        }
    }

    tracing::debug!(
        video = stats.video_frames,
        audio = stats.audio_frames,
        "chains interleaved"
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{FrameNode, StreamTag};
    use crate::Error;
    use assert_matches::assert_matches;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Tick(Option<i64>);

    impl Timestamped for Tick {
        fn pts(&self) -> Option<i64> {
            self.0
        }

        fn set_pts(&mut self, pts: Option<i64>) {
            self.0 = pts;
        }
    }

    #[derive(Default)]
    struct Recorder {
        video_tb: Option<TimeBase>,
        audio_tb: Option<TimeBase>,
        written: Vec<(MediaKind, Option<i64>)>,
        fail_audio: bool,
    }

    impl InterleaveSink for Recorder {
        type Video = Tick;
        type Audio = Tick;

        fn time_base(&self, kind: MediaKind) -> TimeBase {
            match kind {
                MediaKind::Video => self.video_tb.unwrap_or(TimeBase::MILLISECONDS),
                MediaKind::Audio => self.audio_tb.unwrap_or(TimeBase::MILLISECONDS),
            }
        }

        fn write_video(&mut self, frame: Tick) -> Result<()> {
            self.written.push((MediaKind::Video, frame.0));
            Ok(())
        }

        fn write_audio(&mut self, frame: Tick) -> Result<()> {
            if self.fail_audio {
                return Err(Error::encode(MediaKind::Audio, "encoder gone", -32));
            }
            self.written.push((MediaKind::Audio, frame.0));
            Ok(())
        }
    }

    fn chain(kind: MediaKind, stamps: &[i64]) -> FrameChain<Tick> {
        let mut chain = FrameChain::new(kind);
        for &pts in stamps {
            chain
                .append(FrameNode::new(kind, StreamTag::Stream(0), Tick(Some(pts))))
                .unwrap();
        }
        chain
    }

    #[test]
    fn test_alternating_timestamps() {
        let mut sink = Recorder::default();
        let stats = write_interleaved(
            &mut sink,
            chain(MediaKind::Video, &[0, 2, 4]),
            chain(MediaKind::Audio, &[1, 3, 5]),
        )
        .unwrap();

        let kinds: Vec<MediaKind> = sink.written.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![
                MediaKind::Video,
                MediaKind::Audio,
                MediaKind::Video,
                MediaKind::Audio,
                MediaKind::Video,
                MediaKind::Audio,
            ]
        );
        assert_eq!(
            stats,
            InterleaveStats {
                video_frames: 3,
                audio_frames: 3
            }
        );
    }

    #[test]
    fn test_video_wins_ties() {
        let mut sink = Recorder::default();
        write_interleaved(
            &mut sink,
            chain(MediaKind::Video, &[10]),
            chain(MediaKind::Audio, &[10]),
        )
        .unwrap();
        assert_eq!(
            sink.written,
            vec![(MediaKind::Video, Some(10)), (MediaKind::Audio, Some(10))]
        );
    }

    #[test]
    fn test_compares_across_time_bases() {
        // 1 tick of 1001/24000 is ~41.7ms; 1536 samples at 48kHz is 32ms.
        let mut sink = Recorder {
            video_tb: Some(TimeBase::new(1001, 24000)),
            audio_tb: Some(TimeBase::per_sample(48000)),
            ..Default::default()
        };
        write_interleaved(
            &mut sink,
            chain(MediaKind::Video, &[0, 1]),
            chain(MediaKind::Audio, &[0, 1536, 3072]),
        )
        .unwrap();
        assert_eq!(
            sink.written,
            vec![
                (MediaKind::Video, Some(0)),
                (MediaKind::Audio, Some(0)),
                (MediaKind::Audio, Some(1536)),
                (MediaKind::Video, Some(1)),
                (MediaKind::Audio, Some(3072)),
            ]
        );
    }

    #[test]
    fn test_one_side_empty() {
        let mut sink = Recorder::default();
        write_interleaved(
            &mut sink,
            chain(MediaKind::Video, &[2]),
            FrameChain::new(MediaKind::Audio),
        )
        .unwrap();
        assert_eq!(sink.written, vec![(MediaKind::Video, Some(2))]);

        let mut sink = Recorder::default();
        let stats = write_interleaved(
            &mut sink,
            FrameChain::new(MediaKind::Video),
            FrameChain::new(MediaKind::Audio),
        )
        .unwrap();
        assert_eq!(stats, InterleaveStats::default());
        assert!(sink.written.is_empty());
    }

    #[test]
    fn test_remainder_keeps_its_order() {
        let mut sink = Recorder::default();
        write_interleaved(
            &mut sink,
            chain(MediaKind::Video, &[0]),
            chain(MediaKind::Audio, &[5, 6, 7]),
        )
        .unwrap();
        let audio: Vec<Option<i64>> = sink
            .written
            .iter()
            .filter(|(k, _)| *k == MediaKind::Audio)
            .map(|(_, pts)| *pts)
            .collect();
        assert_eq!(audio, vec![Some(5), Some(6), Some(7)]);
    }

    #[test]
    fn test_sink_error_stops_the_write() {
        let mut sink = Recorder {
            fail_audio: true,
            ..Default::default()
        };
        let result = write_interleaved(
            &mut sink,
            chain(MediaKind::Video, &[0, 40]),
            chain(MediaKind::Audio, &[20]),
        );
        assert_matches!(result, Err(Error::Encode { code: -32, .. }));
        assert_eq!(sink.written, vec![(MediaKind::Video, Some(0))]);
    }
}
