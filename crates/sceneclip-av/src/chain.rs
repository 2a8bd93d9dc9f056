//! Frame chains: owned, single-kind sequences of decoded or pre-encode frames.
//!
//! A [`FrameChain`] owns every node it holds. Handing a chain to another
//! component moves it; splitting a chain moves the suffix out. Releasing a
//! chain drops its payloads front to back, iteratively.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The two media kinds a pipeline carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    /// Both kinds, video first.
    pub const ALL: [MediaKind; 2] = [MediaKind::Video, MediaKind::Audio];
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => f.write_str("video"),
            MediaKind::Audio => f.write_str("audio"),
        }
    }
}

/// Routing tag carried by every node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTag {
    /// Index of the source or destination stream.
    Stream(usize),
    /// Marked by the trim filter; consumers skip the node.
    Dropped,
}

impl StreamTag {
    pub fn is_dropped(&self) -> bool {
        matches!(self, StreamTag::Dropped)
    }
}

/// One frame plus its kind and routing tag.
#[derive(Debug)]
pub struct FrameNode<P> {
    kind: MediaKind,
    tag: StreamTag,
    payload: P,
}

impl<P> FrameNode<P> {
    pub fn new(kind: MediaKind, tag: StreamTag, payload: P) -> Self {
        Self { kind, tag, payload }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn tag(&self) -> StreamTag {
        self.tag
    }

    pub fn set_tag(&mut self, tag: StreamTag) {
        self.tag = tag;
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut P {
        &mut self.payload
    }

    /// Take the payload out, consuming the node.
    pub fn into_payload(self) -> P {
        self.payload
    }
}

/// An owned sequence of nodes of a single [`MediaKind`].
///
/// Head and tail are both reachable in O(1); appending never walks the chain.
#[derive(Debug)]
pub struct FrameChain<P> {
    kind: MediaKind,
    nodes: VecDeque<FrameNode<P>>,
}

impl<P> FrameChain<P> {
    /// Create an empty chain for `kind`.
    pub fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            nodes: VecDeque::new(),
        }
    }

    /// Create a chain holding exactly `node`.
    pub fn single(node: FrameNode<P>) -> Self {
        let mut nodes = VecDeque::with_capacity(1);
        let kind = node.kind;
        nodes.push_back(node);
        Self { kind, nodes }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Attach `node` after the current tail.
    ///
    /// Fails with [`Error::KindMismatch`] when the node's kind differs from
    /// the chain's; the node is dropped in that case.
    pub fn append(&mut self, node: FrameNode<P>) -> Result<()> {
        if node.kind != self.kind {
            return Err(Error::KindMismatch {
                expected: self.kind,
                found: node.kind,
            });
        }
        self.nodes.push_back(node);
        Ok(())
    }

    /// Move every node of `other` to the end of this chain.
    pub fn append_chain(&mut self, mut other: FrameChain<P>) -> Result<()> {
        if other.is_empty() {
            return Ok(());
        }
        if other.kind != self.kind {
            return Err(Error::KindMismatch {
                expected: self.kind,
                found: other.kind,
            });
        }
        self.nodes.append(&mut other.nodes);
        Ok(())
    }

    pub fn head(&self) -> Option<&FrameNode<P>> {
        self.nodes.front()
    }

    pub fn tail(&self) -> Option<&FrameNode<P>> {
        self.nodes.back()
    }

    pub fn tail_mut(&mut self) -> Option<&mut FrameNode<P>> {
        self.nodes.back_mut()
    }

    /// Remove and return the head node.
    pub fn pop_front(&mut self) -> Option<FrameNode<P>> {
        self.nodes.pop_front()
    }

    /// Remove and return the tail node.
    pub fn pop_back(&mut self) -> Option<FrameNode<P>> {
        self.nodes.pop_back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameNode<P>> {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FrameNode<P>> {
        self.nodes.iter_mut()
    }

    /// Cut the chain after `at` nodes and return the suffix.
    ///
    /// This chain keeps `[0, at)`, the caller owns the rest. Out-of-range
    /// cuts return an empty chain.
    pub fn split_off(&mut self, at: usize) -> FrameChain<P> {
        if at >= self.nodes.len() {
            return FrameChain::new(self.kind);
        }
        FrameChain {
            kind: self.kind,
            nodes: self.nodes.split_off(at),
        }
    }

    /// Drop every node tagged [`StreamTag::Dropped`].
    ///
    /// Returns how many nodes were removed.
    pub fn retain_kept(&mut self) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|node| !node.tag.is_dropped());
        before - self.nodes.len()
    }

    /// Release every node from head to tail and return how many there were.
    pub fn release(mut self) -> usize {
        let mut released = 0;
        while self.nodes.pop_front().is_some() {
            released += 1;
        }
        released
    }
}

impl<P> IntoIterator for FrameChain<P> {
    type Item = FrameNode<P>;
    type IntoIter = std::collections::vec_deque::IntoIter<FrameNode<P>>;

    /// Forward, single-pass traversal that consumes the chain.
    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn video(id: u32) -> FrameNode<u32> {
        FrameNode::new(MediaKind::Video, StreamTag::Stream(0), id)
    }

    #[test]
    fn test_tail_tracks_every_append() {
        let mut chain = FrameChain::new(MediaKind::Video);
        assert!(chain.tail().is_none());

        for id in 0..16 {
            chain.append(video(id)).unwrap();
            assert_eq!(*chain.tail().unwrap().payload(), id);
            assert_eq!(*chain.head().unwrap().payload(), 0);
        }

        let visited: Vec<u32> = chain.into_iter().map(FrameNode::into_payload).collect();
        assert_eq!(visited, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_single_node_is_its_own_tail() {
        let chain = FrameChain::single(video(7));
        assert_eq!(chain.len(), 1);
        assert_eq!(*chain.tail().unwrap().payload(), 7);
        assert_eq!(chain.kind(), MediaKind::Video);
    }

    #[test]
    fn test_append_rejects_other_kind() {
        let mut chain = FrameChain::single(video(1));
        let err = chain
            .append(FrameNode::new(MediaKind::Audio, StreamTag::Stream(1), 2))
            .unwrap_err();
        assert_matches!(
            err,
            Error::KindMismatch {
                expected: MediaKind::Video,
                found: MediaKind::Audio
            }
        );
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_release_empty_chain_is_noop() {
        let chain: FrameChain<u32> = FrameChain::new(MediaKind::Audio);
        assert_eq!(chain.release(), 0);
    }

    #[test]
    fn test_release_counts_nodes() {
        let mut chain = FrameChain::new(MediaKind::Video);
        for id in 0..5 {
            chain.append(video(id)).unwrap();
        }
        assert_eq!(chain.release(), 5);
    }

    #[test]
    fn test_split_off_transfers_suffix() {
        let mut chain = FrameChain::new(MediaKind::Video);
        for id in 0..6 {
            chain.append(video(id)).unwrap();
        }

        let suffix = chain.split_off(4);
        assert_eq!(chain.len(), 4);
        assert_eq!(*chain.tail().unwrap().payload(), 3);
        assert_eq!(suffix.len(), 2);
        assert_eq!(*suffix.head().unwrap().payload(), 4);

        // Releasing the suffix leaves the prefix intact.
        assert_eq!(suffix.release(), 2);
        assert_eq!(chain.len(), 4);

        chain.append(video(99)).unwrap();
        assert_eq!(*chain.tail().unwrap().payload(), 99);
    }

    #[test]
    fn test_split_off_past_end_is_empty() {
        let mut chain = FrameChain::single(video(1));
        let suffix = chain.split_off(3);
        assert!(suffix.is_empty());
        assert_eq!(suffix.kind(), MediaKind::Video);
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_retain_kept_drops_sentinel_nodes() {
        let mut chain = FrameChain::new(MediaKind::Video);
        chain.append(video(0)).unwrap();
        chain
            .append(FrameNode::new(MediaKind::Video, StreamTag::Dropped, 1))
            .unwrap();
        chain.append(video(2)).unwrap();

        assert_eq!(chain.retain_kept(), 1);
        let kept: Vec<u32> = chain.into_iter().map(FrameNode::into_payload).collect();
        assert_eq!(kept, vec![0, 2]);
    }

    #[test]
    fn test_append_chain_moves_nodes() {
        let mut first = FrameChain::single(video(0));
        let mut second = FrameChain::new(MediaKind::Video);
        second.append(video(1)).unwrap();
        second.append(video(2)).unwrap();

        first.append_chain(second).unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(*first.tail().unwrap().payload(), 2);
    }
}
