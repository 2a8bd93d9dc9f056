//! The trim window and the windowed collection of decoded frames.
//!
//! The window is traversed once, in timestamp order. A frame inside
//! `[start, end]` is kept and rebased so the first kept frame lands at zero.
//! A frame outside it stops the current collection; a frame past `end`
//! also ends the stream. [`TrackPair`] keeps that per-stream state for a
//! read loop and routes packets to their track.

use crate::chain::{FrameChain, FrameNode, MediaKind, StreamTag};
use crate::time::{TimeBase, Timestamped};
use crate::{Error, Result};

/// Check a wall-clock window before anything is opened.
pub fn validate_seconds(start: f64, end: f64) -> Result<()> {
    if !start.is_finite() || !end.is_finite() || start < 0.0 || start > end {
        return Err(Error::InvalidTrimWindow { start, end });
    }
    Ok(())
}

/// Inclusive `[start, end]` bounds in one stream's time base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimWindow {
    start: i64,
    end: i64,
}

/// What the window says about one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Inside the window; carries the rebased timestamp.
    Keep(i64),
    /// Before the window, or no timestamp at all.
    Early,
    /// Past the window end.
    Late,
}

/// Whether a stream can still produce frames inside the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Open,
    Passed,
}

impl TrimWindow {
    pub fn new(start: i64, end: i64) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidTrimWindow {
                start: start as f64,
                end: end as f64,
            });
        }
        Ok(Self { start, end })
    }

    /// Rescale a wall-clock window into `time_base`.
    pub fn from_seconds(start: f64, end: f64, time_base: TimeBase) -> Result<Self> {
        validate_seconds(start, end)?;
        Self::new(time_base.from_seconds(start), time_base.from_seconds(end))
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn admit(&self, timestamp: Option<i64>) -> Admission {
        match timestamp {
            Some(ts) if ts > self.end => Admission::Late,
            Some(ts) if ts >= self.start => Admission::Keep(ts - self.start),
            _ => Admission::Early,
        }
    }
}

/// Frames collected from one decode step.
#[derive(Debug)]
pub struct Windowed<F> {
    pub chain: FrameChain<F>,
    pub state: WindowState,
}

/// Pull frames from `next` into a chain until the decoder runs dry or a
/// frame falls outside `window`.
///
/// The first out-of-window frame is appended tagged [`StreamTag::Dropped`]
/// and nothing after it is appended.
pub fn collect_window<F, N>(
    window: &TrimWindow,
    kind: MediaKind,
    stream_index: usize,
    mut next: N,
) -> Result<Windowed<F>>
where
    F: Timestamped,
    N: FnMut() -> Result<Option<F>>,
{
    let mut chain = FrameChain::new(kind);
    let mut state = WindowState::Open;

    while let Some(mut frame) = next()? {
        match window.admit(frame.pts()) {
            Admission::Keep(rebased) => {
                frame.set_pts(Some(rebased));
                chain.append(FrameNode::new(kind, StreamTag::Stream(stream_index), frame))?;
            }
            Admission::Early => {
                tracing::trace!(%kind, pts = ?frame.pts(), "frame before trim window");
                chain.append(FrameNode::new(kind, StreamTag::Dropped, frame))?;
                break;
            }
            Admission::Late => {
                tracing::debug!(%kind, pts = ?frame.pts(), "trim window passed");
                chain.append(FrameNode::new(kind, StreamTag::Dropped, frame))?;
                state = WindowState::Passed;
                break;
            }
        }
    }

    Ok(Windowed { chain, state })
}

/// Where one tracked stream stands in the read loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Packets are still decoded.
    Open,
    /// A frame past the window end was seen.
    Passed,
    /// The decoder was flushed at container end.
    Flushed,
}

/// One tracked input stream: its index, window and read state.
#[derive(Debug, Clone, Copy)]
pub struct Track {
    kind: MediaKind,
    index: usize,
    window: TrimWindow,
    state: TrackState,
}

impl Track {
    pub fn new(kind: MediaKind, index: usize, window: TrimWindow) -> Self {
        Self {
            kind,
            index,
            window,
            state: TrackState::Open,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn window(&self) -> &TrimWindow {
        &self.window
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.state == TrackState::Open
    }

    /// Window one decode step's frames.
    ///
    /// `flushing` marks the step after the end-of-stream signal. Frames the
    /// decoder still holds after a [`StreamTag::Dropped`] tail are received
    /// and discarded, so the decoder is ready for its next packet.
    pub fn collect<F, N>(&mut self, flushing: bool, mut next: N) -> Result<FrameChain<F>>
    where
        F: Timestamped,
        N: FnMut() -> Result<Option<F>>,
    {
        let windowed = collect_window(&self.window, self.kind, self.index, &mut next)?;

        if windowed.chain.tail().is_some_and(|node| node.tag().is_dropped()) {
            let mut discarded = 0;
            while next()?.is_some() {
                discarded += 1;
            }
            if discarded > 0 {
                tracing::trace!(kind = %self.kind, discarded, "frames after window stop discarded");
            }
        }

        if windowed.state == WindowState::Passed {
            self.state = TrackState::Passed;
        } else if flushing {
            self.state = TrackState::Flushed;
        }
        Ok(windowed.chain)
    }
}

/// The tracked video and audio streams of one input.
#[derive(Debug, Clone, Copy)]
pub struct TrackPair {
    pub video: Track,
    pub audio: Track,
}

impl TrackPair {
    pub fn new(video: Track, audio: Track) -> Self {
        Self { video, audio }
    }

    pub fn get(&self, kind: MediaKind) -> &Track {
        match kind {
            MediaKind::Video => &self.video,
            MediaKind::Audio => &self.audio,
        }
    }

    pub fn get_mut(&mut self, kind: MediaKind) -> &mut Track {
        match kind {
            MediaKind::Video => &mut self.video,
            MediaKind::Audio => &mut self.audio,
        }
    }

    /// Which track a packet of stream `index` belongs to.
    ///
    /// `None` when that track no longer decodes. A stream outside the pair
    /// is an [`Error::UnknownStreamIndex`].
    pub fn route(&self, index: usize) -> Result<Option<MediaKind>> {
        let track = if index == self.video.index {
            &self.video
        } else if index == self.audio.index {
            &self.audio
        } else {
            return Err(Error::UnknownStreamIndex(index));
        };
        Ok(track.is_live().then_some(track.kind))
    }

    /// Both streams are done: nothing left to read or flush.
    pub fn ended(&self) -> bool {
        !self.video.is_live() && !self.audio.is_live()
    }

    /// The next track to flush once the input has run out, video first.
    pub fn next_to_flush(&self) -> Option<MediaKind> {
        [&self.video, &self.audio]
            .into_iter()
            .find(|track| track.is_live())
            .map(|track| track.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[derive(Debug, PartialEq)]
    struct Stamp(Option<i64>);

    impl Timestamped for Stamp {
        fn pts(&self) -> Option<i64> {
            self.0
        }

        fn set_pts(&mut self, pts: Option<i64>) {
            self.0 = pts;
        }
    }

    fn feed(stamps: Vec<Option<i64>>) -> impl FnMut() -> Result<Option<Stamp>> {
        let mut stamps = stamps.into_iter();
        move || Ok(stamps.next().map(Stamp))
    }

    fn collected(windowed: Windowed<Stamp>) -> Vec<(StreamTag, Option<i64>)> {
        windowed
            .chain
            .into_iter()
            .map(|node| (node.tag(), node.payload().0))
            .collect()
    }

    #[test]
    fn test_window_boundaries_are_inclusive() {
        let window = TrimWindow::new(100, 200).unwrap();
        assert_eq!(window.admit(Some(100)), Admission::Keep(0));
        assert_eq!(window.admit(Some(200)), Admission::Keep(100));
        assert_eq!(window.admit(Some(201)), Admission::Late);
        assert_eq!(window.admit(Some(99)), Admission::Early);
        assert_eq!(window.admit(None), Admission::Early);
    }

    #[test]
    fn test_reversed_window_is_rejected() {
        assert_matches!(TrimWindow::new(5, 2), Err(Error::InvalidTrimWindow { .. }));
        assert_matches!(
            TrimWindow::from_seconds(5.0, 2.0, TimeBase::MILLISECONDS),
            Err(Error::InvalidTrimWindow { .. })
        );
        assert_matches!(validate_seconds(f64::NAN, 2.0), Err(_));
        assert_matches!(validate_seconds(-1.0, 2.0), Err(_));
        assert!(validate_seconds(3.0, 3.0).is_ok());
    }

    #[test]
    fn test_from_seconds_rescales_per_stream() {
        let video = TrimWindow::from_seconds(2.0, 5.0, TimeBase::MILLISECONDS).unwrap();
        let audio = TrimWindow::from_seconds(2.0, 5.0, TimeBase::per_sample(48000)).unwrap();
        assert_eq!((video.start(), video.end()), (2000, 5000));
        assert_eq!((audio.start(), audio.end()), (96_000, 240_000));
    }

    #[test]
    fn test_collect_keeps_and_rebases() {
        let window = TrimWindow::new(100, 200).unwrap();
        let out = collect_window(
            &window,
            MediaKind::Video,
            0,
            feed(vec![Some(100), Some(150), Some(200)]),
        )
        .unwrap();
        assert_eq!(out.state, WindowState::Open);
        assert_eq!(
            collected(out),
            vec![
                (StreamTag::Stream(0), Some(0)),
                (StreamTag::Stream(0), Some(50)),
                (StreamTag::Stream(0), Some(100)),
            ]
        );
    }

    #[test]
    fn test_collect_stops_past_end() {
        let window = TrimWindow::new(100, 200).unwrap();
        let out = collect_window(
            &window,
            MediaKind::Audio,
            1,
            feed(vec![Some(200), Some(201), Some(202)]),
        )
        .unwrap();
        assert_eq!(out.state, WindowState::Passed);
        assert_eq!(
            collected(out),
            vec![
                (StreamTag::Stream(1), Some(100)),
                (StreamTag::Dropped, Some(201)),
            ]
        );
    }

    #[test]
    fn test_collect_stops_before_start_without_ending_stream() {
        let window = TrimWindow::new(100, 200).unwrap();
        let out = collect_window(
            &window,
            MediaKind::Video,
            0,
            feed(vec![Some(40), Some(120)]),
        )
        .unwrap();
        assert_eq!(out.state, WindowState::Open);
        assert_eq!(collected(out), vec![(StreamTag::Dropped, Some(40))]);
    }

    #[test]
    fn test_collect_propagates_decoder_errors() {
        let window = TrimWindow::new(0, 10).unwrap();
        let result: Result<Windowed<Stamp>> = collect_window(&window, MediaKind::Video, 0, || {
            Err(Error::decode(MediaKind::Video, "corrupt", -22))
        });
        assert_matches!(result, Err(Error::Decode { code: -22, .. }));
    }

    fn pair() -> TrackPair {
        let window = TrimWindow::new(100, 200).unwrap();
        TrackPair::new(
            Track::new(MediaKind::Video, 0, window),
            Track::new(MediaKind::Audio, 1, window),
        )
    }

    #[test]
    fn test_track_discards_frames_after_an_early_stop() {
        let mut track = Track::new(MediaKind::Video, 0, TrimWindow::new(100, 200).unwrap());
        let mut pending = vec![Some(40), Some(120), Some(130)].into_iter();

        let chain = track
            .collect(false, || Ok(pending.next().map(Stamp)))
            .unwrap();

        assert_eq!(chain.len(), 1);
        assert!(chain.head().unwrap().tag().is_dropped());
        assert_eq!(pending.next(), None);
        assert_eq!(track.state(), TrackState::Open);
    }

    #[test]
    fn test_track_flush_ends_the_stream() {
        let mut track = Track::new(MediaKind::Audio, 1, TrimWindow::new(100, 200).unwrap());
        let chain = track.collect(true, feed(vec![Some(150), Some(160)])).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(track.state(), TrackState::Flushed);
        assert!(!track.is_live());
    }

    #[test]
    fn test_track_passed_wins_over_flush() {
        let mut track = Track::new(MediaKind::Audio, 1, TrimWindow::new(100, 200).unwrap());
        let chain = track.collect(true, feed(vec![Some(150), Some(250), Some(260)])).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(track.state(), TrackState::Passed);
    }

    #[test]
    fn test_pair_routes_packets() {
        let mut tracks = pair();
        assert_eq!(tracks.route(0).unwrap(), Some(MediaKind::Video));
        assert_eq!(tracks.route(1).unwrap(), Some(MediaKind::Audio));
        assert_matches!(tracks.route(2), Err(Error::UnknownStreamIndex(2)));

        tracks
            .get_mut(MediaKind::Video)
            .collect(false, feed(vec![Some(300)]))
            .unwrap();
        assert_eq!(tracks.route(0).unwrap(), None);
        assert_eq!(tracks.next_to_flush(), Some(MediaKind::Audio));
        assert!(!tracks.ended());

        tracks
            .get_mut(MediaKind::Audio)
            .collect::<Stamp, _>(true, feed(vec![]))
            .unwrap();
        assert!(tracks.ended());
        assert_eq!(tracks.next_to_flush(), None);
        assert_eq!(tracks.get(MediaKind::Audio).state(), TrackState::Flushed);
    }
}
