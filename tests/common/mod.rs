//! Shared helpers for integration tests: in-process workers and test images.
#![allow(dead_code)]

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use pixgate::server::{self, WorkerServer};
use pixgate::transport::ShutdownCoordinator;
use std::io::Cursor;
use std::sync::Arc;
use tokio::net::TcpListener;

/// A worker serving on an ephemeral port; stops when dropped.
pub struct WorkerHandle {
    pub addr: String,
    shutdown: ShutdownCoordinator,
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown.shutdown();
    }
}

pub async fn spawn_worker(worker: WorkerServer) -> WorkerHandle {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let shutdown = ShutdownCoordinator::new();
    let rx = shutdown.subscribe();
    tokio::spawn(server::serve(listener, Arc::new(worker), rx));
    WorkerHandle { addr, shutdown }
}

pub async fn spawn_echo_worker() -> WorkerHandle {
    let worker = WorkerServer::new();
    server::register_echo_filter(&worker).await;
    server::register_palette_analyzer(&worker, 8).await;
    spawn_worker(worker).await
}

/// An address nothing listens on.
pub async fn dead_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().to_string()
}

/// Deterministic pseudo-random bytes (xorshift32).
pub fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.max(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}

pub fn noise_image(width: u32, height: u32) -> RgbImage {
    let pixels = noise((width * height * 3) as usize, width ^ (height << 16));
    RgbImage::from_raw(width, height, pixels).unwrap()
}

pub fn png_bytes(img: &RgbImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

pub fn jpeg_bytes(img: &RgbImage, quality: u8) -> Vec<u8> {
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img.clone())
        .write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))
        .unwrap();
    out
}

pub fn small_png() -> Vec<u8> {
    png_bytes(&RgbImage::from_fn(32, 32, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            Rgb([230, 40, 40])
        } else {
            Rgb([20, 60, 200])
        }
    }))
}

pub fn small_jpeg() -> Vec<u8> {
    jpeg_bytes(&RgbImage::from_pixel(48, 48, Rgb([10, 180, 90])), 90)
}

/// A complete 1x1 GIF.
pub const TINY_GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xff\xff\xff\x00\x00\x00!\xf9\x04\x01\x00\x00\x00\x00,\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02D\x01\x00;";
