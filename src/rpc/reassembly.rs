use crate::rpc::chunk::ChunkFrame;
use bytes::{Bytes, BytesMut};
use tracing::debug;

/// Accumulates inbound frame data in arrival order.
///
/// Frames are not re-sorted by `chunk_number`: the framed TCP transport delivers
/// them in the order the worker wrote them. Out-of-sequence numbers are only
/// logged, since workers are free to number their output differently.
#[derive(Debug, Default)]
pub struct Reassembler {
    buf: BytesMut,
    frames: usize,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&mut self, frame: ChunkFrame) {
        if usize::try_from(frame.chunk_number).ok() != Some(self.frames) {
            debug!(
                expected = self.frames,
                got = frame.chunk_number,
                "inbound chunk out of sequence, appending in arrival order"
            );
        }
        self.buf.extend_from_slice(&frame.data);
        self.frames += 1;
    }

    pub fn frames_received(&self) -> usize {
        self.frames
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the buffer. Zero frames yields empty bytes, not an error.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::chunk::ChunkEncoder;
    use std::num::NonZeroUsize;

    #[test]
    fn test_round_trip_under_no_loss() {
        let data: Bytes = (0..10_000u32).map(|i| (i * 7) as u8).collect::<Vec<_>>().into();
        let mut reassembler = Reassembler::new();
        for frame in ChunkEncoder::new(data.clone(), "rt", 0, NonZeroUsize::new(333).unwrap()).unwrap() {
            reassembler.accept(frame);
        }
        assert_eq!(reassembler.frames_received(), 31);
        assert_eq!(reassembler.finish(), data);
    }

    #[test]
    fn test_no_frames_is_empty_result() {
        let reassembler = Reassembler::new();
        assert_eq!(reassembler.frames_received(), 0);
        assert!(reassembler.finish().is_empty());
    }

    #[test]
    fn test_arrival_order_wins_over_chunk_number() {
        let mut reassembler = Reassembler::new();
        reassembler.accept(ChunkFrame {
            data: Bytes::from_static(b"world"),
            chunk_number: 1,
            ..Default::default()
        });
        reassembler.accept(ChunkFrame {
            data: Bytes::from_static(b"hello "),
            chunk_number: 0,
            ..Default::default()
        });
        assert_eq!(reassembler.finish(), Bytes::from_static(b"worldhello "));
    }
}
