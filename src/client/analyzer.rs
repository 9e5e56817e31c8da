use crate::error::TransportError;
use crate::gate::ImagePayload;
use crate::rpc::messages::{AnalyzeRequest, AnalyzeResponse, ColorPalette, MAX_ANALYZE_PAYLOAD};
use crate::rpc::wire::ANALYZE_COLORS;
use crate::transport::Channel;
use tracing::debug;

/// Client for the analyzer worker's unary `AnalyzeColors` call.
#[derive(Debug, Clone)]
pub struct AnalyzerClient {
    channel: Channel,
}

impl AnalyzerClient {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    /// One round trip carrying the whole payload.
    ///
    /// Channel failures and worker statuses are errors. A response that simply
    /// carries no `colors` is a successful, empty palette.
    pub async fn analyze(&self, payload: &ImagePayload) -> Result<ColorPalette, TransportError> {
        if payload.len() > MAX_ANALYZE_PAYLOAD {
            return Err(TransportError::FrameTooLarge(payload.len().div_ceil(3) * 4));
        }

        let (mut reader, mut writer) = self.channel.open(ANALYZE_COLORS).await?;

        writer
            .send(&AnalyzeRequest {
                image_data: payload.data().clone(),
            })
            .await?;
        writer.close_send().await?;

        let response: AnalyzeResponse = reader.recv().await?.ok_or_else(|| {
            TransportError::Protocol("analyzer closed the call without a response".into())
        })?;

        let palette = ColorPalette::from(response);
        debug!(
            endpoint = %self.channel.addr(),
            colors = palette.len(),
            "palette received"
        );
        Ok(palette)
    }
}
