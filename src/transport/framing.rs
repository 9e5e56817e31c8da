use crate::error::TransportError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Largest payload accepted in a single frame (32 MiB).
///
/// Sized so a base64-wrapped `AnalyzeRequest` carrying a full-size upload
/// still fits in one frame.
pub const MAX_FRAME_SIZE: usize = 32 * 1024 * 1024;

/// Frame format: 4-byte length prefix (big-endian) + message payload
/// This is more robust than newline delimiting and handles binary data properly
pub struct FrameCodec;

impl FrameCodec {
    /// Writes a length-prefixed frame to the writer
    ///
    /// Format: [4-byte length][payload]
    /// Length is the size of the payload in bytes (u32, big-endian)
    pub async fn write_frame<W>(writer: &mut W, data: &[u8]) -> Result<(), TransportError>
    where
        W: AsyncWriteExt + Unpin,
    {
        if data.len() > MAX_FRAME_SIZE {
            return Err(TransportError::FrameTooLarge(data.len()));
        }

        let len_bytes = (data.len() as u32).to_be_bytes();

        writer.write_all(&len_bytes).await?;
        writer.write_all(data).await?;
        writer.flush().await?;

        Ok(())
    }

    /// Reads a length-prefixed frame from the reader
    ///
    /// Returns `Ok(None)` when the peer closed the connection cleanly on a frame
    /// boundary. EOF in the middle of a frame is an error.
    pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, TransportError>
    where
        R: AsyncReadExt + Unpin,
    {
        let mut len_bytes = [0u8; 4];
        let mut filled = 0;
        while filled < len_bytes.len() {
            let n = reader.read(&mut len_bytes[filled..]).await?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(TransportError::UnexpectedEof);
            }
            filled += n;
        }

        let len = u32::from_be_bytes(len_bytes) as usize;

        // Sanity check: prevent extremely large allocations
        if len > MAX_FRAME_SIZE {
            return Err(TransportError::FrameTooLarge(len));
        }

        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                TransportError::UnexpectedEof
            } else {
                TransportError::Io(e)
            }
        })?;

        Ok(Some(payload))
    }

    /// Serializes `msg` as JSON and writes it as one frame.
    pub async fn write_json<W, T>(writer: &mut W, msg: &T) -> Result<(), TransportError>
    where
        W: AsyncWriteExt + Unpin,
        T: Serialize,
    {
        let bytes = serde_json::to_vec(msg)?;
        Self::write_frame(writer, &bytes).await
    }

    /// Reads one frame and decodes it as JSON. `Ok(None)` on clean EOF.
    pub async fn read_json<R, T>(reader: &mut R) -> Result<Option<T>, TransportError>
    where
        R: AsyncReadExt + Unpin,
        T: DeserializeOwned,
    {
        match Self::read_frame(reader).await? {
            Some(frame) => Ok(Some(serde_json::from_slice(&frame)?)),
            None => Ok(None),
        }
    }
}
