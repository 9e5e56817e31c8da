use crate::error::TransportError;
use crate::rpc::wire::{CallHeader, Envelope, RpcStatus};
use crate::transport::framing::FrameCodec;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

/// Split a connected socket into independently owned read and write halves so
/// both directions of a call can be driven concurrently.
pub fn split(stream: TcpStream) -> (CallReader, CallWriter) {
    let (read_half, write_half) = stream.into_split();
    (
        CallReader {
            inner: BufReader::new(read_half),
        },
        CallWriter {
            inner: BufWriter::new(write_half),
        },
    )
}

/// Inbound half of a call.
pub struct CallReader {
    inner: BufReader<OwnedReadHalf>,
}

impl CallReader {
    /// Server side: the first frame of a connection. `Ok(None)` if the peer
    /// connected and left without sending anything.
    pub async fn read_header(&mut self) -> Result<Option<CallHeader>, TransportError> {
        FrameCodec::read_json(&mut self.inner).await
    }

    /// Next message from the peer.
    ///
    /// - `Ok(Some(msg))` for a `message` envelope
    /// - `Ok(None)` once the peer half-closed with `close`
    /// - `Err(Remote)` when the peer terminated with a status
    /// - `Err(UnexpectedEof)` when the connection ended without either
    pub async fn recv<T: DeserializeOwned>(&mut self) -> Result<Option<T>, TransportError> {
        match FrameCodec::read_json::<_, Envelope<T>>(&mut self.inner).await? {
            Some(Envelope::Message { body }) => Ok(Some(body)),
            Some(Envelope::Close) => Ok(None),
            Some(Envelope::Status(status)) => Err(TransportError::Remote {
                code: status.code,
                message: status.message,
            }),
            None => Err(TransportError::UnexpectedEof),
        }
    }

    /// Discard everything the peer still sends until it half-closes or goes
    /// away. Dropping a socket with unread input resets the connection, which
    /// can destroy a status frame the peer has not read yet.
    pub async fn drain(&mut self) {
        while let Ok(Some(_)) = self.recv::<serde::de::IgnoredAny>().await {}
    }
}

/// Outbound half of a call.
pub struct CallWriter {
    inner: BufWriter<OwnedWriteHalf>,
}

impl CallWriter {
    pub async fn write_header(&mut self, header: &CallHeader) -> Result<(), TransportError> {
        FrameCodec::write_json(&mut self.inner, header).await
    }

    pub async fn send<T: Serialize>(&mut self, body: &T) -> Result<(), TransportError> {
        FrameCodec::write_json(&mut self.inner, &Envelope::Message { body }).await
    }

    /// Half-close this direction: announce `close`, then shut the socket's write side.
    pub async fn close_send(&mut self) -> Result<(), TransportError> {
        FrameCodec::write_json(&mut self.inner, &Envelope::<()>::Close).await?;
        self.inner.shutdown().await?;
        Ok(())
    }

    /// Server side: terminate the call with an error status.
    pub async fn send_status(&mut self, status: &RpcStatus) -> Result<(), TransportError> {
        FrameCodec::write_json(&mut self.inner, &Envelope::<()>::Status(status.clone())).await?;
        self.inner.shutdown().await?;
        Ok(())
    }
}
