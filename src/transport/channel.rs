use crate::error::TransportError;
use crate::rpc::wire::CallHeader;
use crate::transport::call::{self, CallReader, CallWriter};
use tokio::net::TcpStream;
use tracing::debug;

/// Client handle for one remote worker.
///
/// Built once at startup and shared by reference; every call opens its own
/// connection so concurrent requests never share state.
#[derive(Debug, Clone)]
pub struct Channel {
    addr: String,
}

impl Channel {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Connect and send the call header for `method`.
    pub async fn open(&self, method: &str) -> Result<(CallReader, CallWriter), TransportError> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|source| TransportError::Connect {
                addr: self.addr.clone(),
                source,
            })?;
        stream.set_nodelay(true)?;

        let (reader, mut writer) = call::split(stream);
        writer.write_header(&CallHeader::new(method)).await?;
        debug!(addr = %self.addr, method, "call opened");

        Ok((reader, writer))
    }
}
