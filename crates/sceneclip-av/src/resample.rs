//! Audio repacking into fixed-size encoder frames.
//!
//! Decoders hand out audio in runs of any length; most encoders want exactly
//! `frame_size` samples per frame. [`AudioResampler`] copies sample runs into
//! a chain of destination frames, spilling into a fresh frame whenever the
//! current one fills up. Destination frame `k` is stamped `k * frame_size`
//! samples after the start, whatever the source frame boundaries were.

use std::mem;

use crate::chain::{FrameChain, FrameNode, MediaKind, StreamTag};
use crate::time::{rescale, TimeBase, Timestamped};
use crate::{Error, Result};

/// Planar `f32` audio storage.
///
/// `plane` exposes the valid samples of a channel; `plane_mut` exposes the
/// whole allocated capacity so writers can fill past the valid count.
pub trait SampleBuffer: Timestamped + Sized {
    /// Whatever the buffer needs besides a capacity to be allocated.
    type Layout: Clone;

    /// Allocate a buffer holding `capacity` samples per channel, none valid.
    fn allocate(layout: &Self::Layout, capacity: usize) -> Result<Self>;

    fn channels(&self) -> usize;

    /// Number of valid samples per channel.
    fn samples(&self) -> usize;

    fn set_samples(&mut self, samples: usize);

    fn plane(&self, channel: usize) -> &[f32];

    fn plane_mut(&mut self, channel: usize) -> &mut [f32];
}

/// Encoder-side description the repacker fills frames for.
#[derive(Debug, Clone)]
pub struct AudioTarget<L> {
    pub layout: L,
    /// Samples per encoder frame.
    pub frame_size: usize,
    pub sample_rate: u32,
    /// Time base of the encoder the frames are stamped for.
    pub time_base: TimeBase,
    /// Output stream the frames are tagged with.
    pub stream_index: usize,
}

/// Repacks irregular sample runs into `frame_size` frames.
#[derive(Debug)]
pub struct AudioResampler<F: SampleBuffer> {
    target: AudioTarget<F::Layout>,
    channels: usize,
    chain: FrameChain<F>,
    /// Sample position of the most recently allocated destination frame.
    samples_count: i64,
}

impl<F: SampleBuffer> AudioResampler<F> {
    /// Create a resampler holding one empty destination frame at timestamp 0.
    pub fn new(target: AudioTarget<F::Layout>) -> Result<Self> {
        if target.frame_size == 0 || target.sample_rate == 0 {
            return Err(Error::UnsupportedFormat(format!(
                "audio frame size {} at {} Hz",
                target.frame_size, target.sample_rate
            )));
        }

        let first = F::allocate(&target.layout, target.frame_size)?;
        let channels = first.channels();
        let mut resampler = Self {
            target,
            channels,
            chain: FrameChain::new(MediaKind::Audio),
            samples_count: 0,
        };
        resampler.push_frame(first, 0)?;
        Ok(resampler)
    }

    pub fn frame_size(&self) -> usize {
        self.target.frame_size
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Frames currently held, including the partially filled tail.
    pub fn pending_frames(&self) -> usize {
        self.chain.len()
    }

    /// Copy every sample of `source` into the chain.
    pub fn put<S: SampleBuffer>(&mut self, source: &S) -> Result<()> {
        if source.channels() != self.channels {
            return Err(Error::ChannelMismatch {
                expected: self.channels,
                found: source.channels(),
            });
        }

        let total = source.samples();
        let mut offset = 0;

        loop {
            let frame_size = self.target.frame_size;
            if self.chain.is_empty() {
                self.allocate_next()?;
            }
            let tail = match self.chain.tail_mut() {
                Some(node) => node.payload_mut(),
                None => {
                    return Err(Error::ResourceAllocation(
                        "audio chain has no destination frame".into(),
                    ))
                }
            };

            let filled = tail.samples();
            let room = frame_size - filled;
            let available = total - offset;
            let copied = room.min(available);

            for channel in 0..self.channels {
                let src = &source.plane(channel)[offset..offset + copied];
                tail.plane_mut(channel)[filled..filled + copied].copy_from_slice(src);
            }
            tail.set_samples(filled + copied);
            offset += copied;

            if offset == total {
                return Ok(());
            }
            self.allocate_next()?;
        }
    }

    /// Hand over the chain and start again from an empty frame at zero.
    ///
    /// The last frame may be short. A tail frame that never received a sample
    /// is discarded rather than emitted.
    pub fn drain(&mut self) -> Result<FrameChain<F>> {
        let mut chain = mem::replace(&mut self.chain, FrameChain::new(MediaKind::Audio));
        if chain.tail().is_some_and(|node| node.payload().samples() == 0) {
            chain.pop_back();
        }

        tracing::debug!(frames = chain.len(), "audio chain drained");

        self.samples_count = 0;
        let first = F::allocate(&self.target.layout, self.target.frame_size)?;
        self.push_frame(first, 0)?;
        Ok(chain)
    }

    fn allocate_next(&mut self) -> Result<()> {
        let frame = F::allocate(&self.target.layout, self.target.frame_size)?;
        let position = if self.chain.is_empty() {
            self.samples_count
        } else {
            self.samples_count + self.target.frame_size as i64
        };
        self.push_frame(frame, position)
    }

    fn push_frame(&mut self, mut frame: F, position: i64) -> Result<()> {
        frame.set_samples(0);
        frame.set_pts(Some(rescale(
            position,
            TimeBase::per_sample(self.target.sample_rate),
            self.target.time_base,
        )));
        self.samples_count = position;
        self.chain.append(FrameNode::new(
            MediaKind::Audio,
            StreamTag::Stream(self.target.stream_index),
            frame,
        ))
    }
}

/// Heap-backed planar audio, used where no codec engine buffer is needed.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    planes: Vec<Vec<f32>>,
    samples: usize,
    pts: Option<i64>,
}

impl PcmBuffer {
    /// Wrap fully valid planes. All planes must have the same length.
    pub fn from_planes(planes: Vec<Vec<f32>>, pts: Option<i64>) -> Self {
        let samples = planes.first().map_or(0, Vec::len);
        debug_assert!(planes.iter().all(|plane| plane.len() == samples));
        Self {
            planes,
            samples,
            pts,
        }
    }

    pub fn capacity(&self) -> usize {
        self.planes.first().map_or(0, Vec::len)
    }
}

impl Timestamped for PcmBuffer {
    fn pts(&self) -> Option<i64> {
        self.pts
    }

    fn set_pts(&mut self, pts: Option<i64>) {
        self.pts = pts;
    }
}

impl SampleBuffer for PcmBuffer {
    /// Channel count.
    type Layout = usize;

    fn allocate(channels: &usize, capacity: usize) -> Result<Self> {
        Ok(Self {
            planes: vec![vec![0.0; capacity]; *channels],
            samples: 0,
            pts: None,
        })
    }

    fn channels(&self) -> usize {
        self.planes.len()
    }

    fn samples(&self) -> usize {
        self.samples
    }

    fn set_samples(&mut self, samples: usize) {
        self.samples = samples.min(self.capacity());
    }

    fn plane(&self, channel: usize) -> &[f32] {
        &self.planes[channel][..self.samples]
    }

    fn plane_mut(&mut self, channel: usize) -> &mut [f32] {
        &mut self.planes[channel]
    }
}
