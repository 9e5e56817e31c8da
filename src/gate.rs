//! Validation/compression gate.
//!
//! Every image entering the transport passes through [`ValidationGate::validate`]:
//! the format is sniffed from magic bytes, the header is parsed to prove the image
//! is readable, and inputs over the size threshold are re-encoded once.

use crate::error::GatewayError;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat, ImageReader};
use std::fmt;
use std::io::Cursor;
use tracing::{debug, info};

/// Inputs strictly larger than this are re-encoded (1 MiB).
pub const COMPRESSION_THRESHOLD: usize = 1024 * 1024;
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// The closed set of formats the gateway accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Jpeg,
    Png,
}

impl PayloadFormat {
    fn image_format(self) -> ImageFormat {
        match self {
            PayloadFormat::Jpeg => ImageFormat::Jpeg,
            PayloadFormat::Png => ImageFormat::Png,
        }
    }
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadFormat::Jpeg => f.write_str("jpeg"),
            PayloadFormat::Png => f.write_str("png"),
        }
    }
}

/// A validated image. Only the gate constructs these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    data: Bytes,
    format: PayloadFormat,
}

impl ImagePayload {
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn format(&self) -> PayloadFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ValidationGate {
    threshold: usize,
    jpeg_quality: u8,
}

impl Default for ValidationGate {
    fn default() -> Self {
        Self {
            threshold: COMPRESSION_THRESHOLD,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ValidationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-encode inputs strictly larger than `threshold` bytes.
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Sniff, check and (if oversized) re-encode `raw`.
    ///
    /// CPU bound: async callers should run this on the blocking pool.
    pub fn validate(&self, raw: Bytes) -> Result<ImagePayload, GatewayError> {
        let format = sniff_format(&raw)?;

        if raw.len() <= self.threshold {
            debug!(%format, bytes = raw.len(), "image accepted unchanged");
            return Ok(ImagePayload { data: raw, format });
        }

        let compressed = self.compress(&raw, format)?;
        info!(
            %format,
            original = raw.len(),
            compressed = compressed.len(),
            "oversized image re-encoded"
        );
        Ok(ImagePayload {
            data: Bytes::from(compressed),
            format,
        })
    }

    fn compress(&self, raw: &[u8], format: PayloadFormat) -> Result<Vec<u8>, GatewayError> {
        let img = image::load_from_memory_with_format(raw, format.image_format())
            .map_err(|e| GatewayError::Compression(e.to_string()))?;

        let mut out = Vec::new();
        let encoded = match format {
            PayloadFormat::Jpeg => {
                // baseline JPEG has no alpha channel
                let img = match img {
                    DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => img,
                    other => DynamicImage::ImageRgb8(other.to_rgb8()),
                };
                img.write_with_encoder(JpegEncoder::new_with_quality(&mut out, self.jpeg_quality))
            }
            PayloadFormat::Png => img.write_with_encoder(PngEncoder::new_with_quality(
                &mut out,
                CompressionType::Best,
                FilterType::Adaptive,
            )),
        };
        encoded.map_err(|e| GatewayError::Compression(e.to_string()))?;

        if out.is_empty() {
            return Err(GatewayError::Compression("encoder produced no output".into()));
        }
        Ok(out)
    }
}

fn sniff_format(raw: &[u8]) -> Result<PayloadFormat, GatewayError> {
    if raw.is_empty() {
        return Err(GatewayError::CorruptImage("empty input".into()));
    }

    let detected =
        image::guess_format(raw).map_err(|e| GatewayError::CorruptImage(e.to_string()))?;
    let format = match detected {
        ImageFormat::Jpeg => PayloadFormat::Jpeg,
        ImageFormat::Png => PayloadFormat::Png,
        other => {
            return Err(GatewayError::UnsupportedFormat(
                format!("{other:?}").to_lowercase(),
            ));
        }
    };

    ImageReader::with_format(Cursor::new(raw), detected)
        .into_dimensions()
        .map_err(|e| GatewayError::CorruptImage(e.to_string()))?;

    Ok(format)
}
