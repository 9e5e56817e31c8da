use crate::error::TransportError;
use crate::gate::ImagePayload;
use crate::rpc::messages::base64_bytes;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Default chunk size (64 KiB).
pub const DEFAULT_CHUNK_SIZE: NonZeroUsize = match NonZeroUsize::new(64 * 1024) {
    Some(size) => size,
    None => panic!("chunk size must be non-zero"),
};

/// Most frames one stream can carry: every `chunk_number` must fit in an `i32`.
pub const MAX_CHUNKS: usize = i32::MAX as usize + 1;

/// One message of the `ApplyFilterStream` call, in either direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkFrame {
    pub image_id: String,
    pub filter_type: i32,
    #[serde(with = "base64_bytes")]
    pub data: Bytes,
    pub chunk_number: i32,
    pub is_last: bool,
}

/// Lazily splits a payload into ordered frames.
///
/// Frame `i` covers bytes `[i * chunk_size, min((i + 1) * chunk_size, len))`.
/// An empty payload still yields exactly one (empty, `is_last`) frame.
#[derive(Debug, Clone)]
pub struct ChunkEncoder {
    data: Bytes,
    image_id: String,
    filter_type: i32,
    chunk_size: usize,
    next: usize,
    total: usize,
}

impl ChunkEncoder {
    /// Fails with `TooManyChunks` when the frame count would overflow `chunk_number`.
    pub fn new(
        data: Bytes,
        image_id: impl Into<String>,
        filter_type: i32,
        chunk_size: NonZeroUsize,
    ) -> Result<Self, TransportError> {
        let total = chunk_count(data.len(), chunk_size)?;
        Ok(Self {
            data,
            image_id: image_id.into(),
            filter_type,
            chunk_size: chunk_size.get(),
            next: 0,
            total,
        })
    }

    /// Number of frames this encoder produces in total.
    pub fn total_chunks(&self) -> usize {
        self.total
    }
}

fn chunk_count(len: usize, chunk_size: NonZeroUsize) -> Result<usize, TransportError> {
    let chunks = len.div_ceil(chunk_size.get()).max(1);
    if chunks > MAX_CHUNKS {
        return Err(TransportError::TooManyChunks(chunks));
    }
    Ok(chunks)
}

/// Encode a validated payload for the filter stream.
pub fn encode(
    payload: &ImagePayload,
    image_id: impl Into<String>,
    filter_type: i32,
    chunk_size: NonZeroUsize,
) -> Result<ChunkEncoder, TransportError> {
    ChunkEncoder::new(payload.data().clone(), image_id, filter_type, chunk_size)
}

impl Iterator for ChunkEncoder {
    type Item = ChunkFrame;

    fn next(&mut self) -> Option<ChunkFrame> {
        if self.next >= self.total {
            return None;
        }

        let index = self.next;
        let start = index * self.chunk_size;
        let end = (start + self.chunk_size).min(self.data.len());
        self.next += 1;

        Some(ChunkFrame {
            image_id: self.image_id.clone(),
            filter_type: self.filter_type,
            data: self.data.slice(start.min(end)..end),
            // index < total <= MAX_CHUNKS
            chunk_number: index as i32,
            is_last: index + 1 == self.total,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChunkEncoder {}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn pattern(len: usize) -> Bytes {
        (0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>().into()
    }

    #[test]
    fn test_scenario_200k_in_64k_chunks() {
        let frames: Vec<_> =
            ChunkEncoder::new(pattern(200 * 1024), "abc", 1, DEFAULT_CHUNK_SIZE).unwrap().collect();

        assert_eq!(frames.len(), 4);
        let lens: Vec<_> = frames.iter().map(|f| f.data.len()).collect();
        assert_eq!(lens, vec![65536, 65536, 65536, 8192]);
        assert!(frames.iter().all(|f| f.image_id == "abc" && f.filter_type == 1));
        assert!(frames[3].is_last);
        assert!(frames[..3].iter().all(|f| !f.is_last));
    }

    #[test]
    fn test_chunk_count_and_concatenation() {
        for (len, chunk) in [(1, 1), (10, 3), (9, 3), (1000, 7), (4096, 4096), (4097, 4096)] {
            let data = pattern(len);
            let encoder = ChunkEncoder::new(data.clone(), "img", 0, size(chunk)).unwrap();
            assert_eq!(encoder.total_chunks(), len.div_ceil(chunk));

            let frames: Vec<_> = encoder.collect();
            assert_eq!(frames.len(), len.div_ceil(chunk));

            let numbers: Vec<_> = frames.iter().map(|f| f.chunk_number).collect();
            let expected: Vec<i32> = (0..frames.len() as i32).collect();
            assert_eq!(numbers, expected);

            assert!(frames.iter().all(|f| f.data.len() <= chunk && !f.data.is_empty()));
            assert_eq!(frames.iter().filter(|f| f.is_last).count(), 1);
            assert!(frames.last().unwrap().is_last);

            let joined: Vec<u8> = frames.iter().flat_map(|f| f.data.iter().copied()).collect();
            assert_eq!(joined, data.to_vec());
        }
    }

    #[test]
    fn test_empty_payload_yields_single_terminal_frame() {
        let frames: Vec<_> = ChunkEncoder::new(Bytes::new(), "empty", 3, size(16)).unwrap().collect();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_last);
        assert!(frames[0].data.is_empty());
        assert_eq!(frames[0].chunk_number, 0);
    }

    #[test]
    fn test_encoder_is_lazy_and_exact_size() {
        let mut encoder = ChunkEncoder::new(pattern(100), "lazy", 0, size(30)).unwrap();
        assert_eq!(encoder.len(), 4);
        encoder.next();
        assert_eq!(encoder.len(), 3);
    }

    #[test]
    fn test_chunk_count_limit() {
        let one = size(1);
        assert_eq!(chunk_count(MAX_CHUNKS, one).unwrap(), MAX_CHUNKS);
        assert!(matches!(
            chunk_count(MAX_CHUNKS + 1, one),
            Err(TransportError::TooManyChunks(n)) if n == MAX_CHUNKS + 1
        ));
        // the same length fits once chunks are larger
        assert_eq!(chunk_count(MAX_CHUNKS + 1, size(2)).unwrap(), MAX_CHUNKS / 2 + 1);
    }

    #[test]
    fn test_frame_json_shape() {
        let frame = ChunkFrame {
            image_id: "abc".into(),
            filter_type: 2,
            data: Bytes::from_static(b"hi"),
            chunk_number: 0,
            is_last: true,
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["data"], "aGk=");
        assert_eq!(value["chunk_number"], 0);
        assert_eq!(value["is_last"], true);
    }
}
