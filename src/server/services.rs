//! Built-in worker services used for local development and tests.

use crate::rpc::messages::{AnalyzeRequest, AnalyzeResponse};
use crate::rpc::wire::{ANALYZE_COLORS, APPLY_FILTER_STREAM, RpcStatus};
use crate::server::worker::WorkerServer;
use std::collections::HashMap;

/// Longest edge the analyzer downsamples to before counting colors.
const ANALYSIS_EDGE: u32 = 64;

/// Stream every inbound filter frame straight back to the caller.
pub async fn register_echo_filter(server: &WorkerServer) {
    server
        .register_streaming(APPLY_FILTER_STREAM, |mut inbound, outbound| async move {
            while let Some(frame) = inbound.recv().await {
                if outbound.send(frame).await.is_err() {
                    break;
                }
            }
            Ok(())
        })
        .await;
}

/// Answer `AnalyzeColors` with up to `palette_size` dominant colors.
pub async fn register_palette_analyzer(server: &WorkerServer, palette_size: usize) {
    server
        .register_unary(ANALYZE_COLORS, move |request| async move {
            let request: AnalyzeRequest = serde_json::from_value(request)
                .map_err(|e| RpcStatus::invalid_argument(e.to_string()))?;

            let colors = tokio::task::spawn_blocking(move || {
                dominant_colors(&request.image_data, palette_size)
            })
            .await
            .map_err(|e| RpcStatus::internal(e.to_string()))?
            .map_err(|e| RpcStatus::invalid_argument(e.to_string()))?;

            serde_json::to_value(AnalyzeResponse {
                colors: Some(colors),
            })
            .map_err(|e| RpcStatus::internal(e.to_string()))
        })
        .await;
}

/// Most frequent colors as `#RRGGBB`, using a 4-bit-per-channel histogram.
pub fn dominant_colors(image_data: &[u8], palette_size: usize) -> image::ImageResult<Vec<String>> {
    let img = image::load_from_memory(image_data)?;
    let img = if img.width() > ANALYSIS_EDGE || img.height() > ANALYSIS_EDGE {
        img.thumbnail(ANALYSIS_EDGE, ANALYSIS_EDGE)
    } else {
        img
    }
    .to_rgb8();

    let mut histogram: HashMap<[u8; 3], u32> = HashMap::new();
    for pixel in img.pixels() {
        let bucket = pixel.0.map(|channel| channel >> 4);
        *histogram.entry(bucket).or_insert(0) += 1;
    }

    let mut buckets: Vec<_> = histogram.into_iter().collect();
    buckets.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    Ok(buckets
        .into_iter()
        .take(palette_size)
        .map(|(bucket, _)| {
            let [r, g, b] = bucket.map(|q| (q << 4) | 0x8);
            format!("#{:02X}{:02X}{:02X}", r, g, b)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    #[test]
    fn test_dominant_colors_orders_by_frequency() {
        let img = RgbImage::from_fn(10, 10, |x, _| {
            if x < 7 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) }
        });
        let mut png = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut png, ImageFormat::Png)
            .unwrap();

        let colors = dominant_colors(png.get_ref(), 8).unwrap();
        assert_eq!(colors, vec!["#F80808".to_string(), "#0808F8".to_string()]);
    }

    #[test]
    fn test_palette_size_caps_output() {
        let img = RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 0]));
        let mut png = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut png, ImageFormat::Png)
            .unwrap();

        assert_eq!(dominant_colors(png.get_ref(), 3).unwrap().len(), 3);
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(dominant_colors(b"nope", 4).is_err());
    }
}
