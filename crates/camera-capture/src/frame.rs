//! Video frame types and processing

use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::CaptureError;

/// Axis-aligned rectangle in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Pixel area of the region
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Clip the region to a `width` x `height` frame.
    ///
    /// Returns `None` when nothing of the region lies inside the frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Region> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        if w == 0 || h == 0 {
            return None;
        }
        Some(Region::new(self.x, self.y, w, h))
    }
}

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        timestamp_ns: u64,
        sequence: u32,
    ) -> Result<Self, CaptureError> {
        let expected = width as usize * height as usize * 3;
        if width == 0 || height == 0 || data.len() != expected {
            return Err(CaptureError::InvalidFrame(format!(
                "expected {} RGB bytes for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        })
    }

    /// Wrap an already decoded RGB image
    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
            timestamp_ns: 0,
            sequence: 0,
        }
    }

    /// Convert a packed YUYV (YUY2) buffer, as delivered by most webcams, to RGB
    pub fn from_yuyv(
        data: &[u8],
        width: u32,
        height: u32,
        timestamp_ns: u64,
        sequence: u32,
    ) -> Result<Self, CaptureError> {
        let expected = width as usize * height as usize * 2;
        if width % 2 != 0 || data.len() < expected {
            return Err(CaptureError::InvalidFrame(format!(
                "expected {} YUYV bytes for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }

        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for quad in data[..expected].chunks_exact(4) {
            let (y0, u, y1, v) = (quad[0], quad[1], quad[2], quad[3]);
            rgb.extend_from_slice(&yuv_to_rgb(y0, u, v));
            rgb.extend_from_slice(&yuv_to_rgb(y1, u, v));
        }
        Self::new(rgb, width, height, timestamp_ns, sequence)
    }

    /// Decode an encoded image (any format the `image` crate recognises) to RGB
    pub fn decode(bytes: &[u8]) -> Result<Self, CaptureError> {
        if bytes.is_empty() {
            return Err(CaptureError::Decode("empty input".to_string()));
        }
        let img = image::load_from_memory(bytes)
            .map_err(|e| CaptureError::Decode(e.to_string()))?;
        let frame = Self::from_rgb_image(img.to_rgb8());
        if frame.width == 0 || frame.height == 0 {
            return Err(CaptureError::Decode("zero-sized image".to_string()));
        }
        Ok(frame)
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Convert to single-channel intensity
    pub fn to_grayscale(&self) -> GrayImage {
        let gray = self
            .data
            .chunks_exact(3)
            .map(|pixel| {
                // Luminance formula: 0.299*R + 0.587*G + 0.114*B
                (pixel[0] as f32 * 0.299 + pixel[1] as f32 * 0.587 + pixel[2] as f32 * 0.114)
                    .round()
                    .min(255.0) as u8
            })
            .collect();
        // Length is width * height by construction
        GrayImage::from_raw(self.width, self.height, gray)
            .unwrap_or_else(|| GrayImage::new(self.width, self.height))
    }

    /// Crop a region of the frame
    pub fn crop(&self, region: &Region) -> Option<VideoFrame> {
        let Region { x, y, width: w, height: h } = *region;
        let past = |origin: u32, extent: u32, limit: u32| {
            origin.checked_add(extent).map_or(true, |end| end > limit)
        };
        if w == 0 || h == 0 || past(x, w, self.width) || past(y, h, self.height) {
            return None;
        }

        let mut cropped = Vec::with_capacity((w * h * 3) as usize);
        for row in y..(y + h) {
            let start = ((row * self.width + x) * 3) as usize;
            let end = start + (w * 3) as usize;
            cropped.extend_from_slice(&self.data[start..end]);
        }

        Some(VideoFrame {
            data: cropped,
            width: w,
            height: h,
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        })
    }
}

/// BT.601 limited-range YCbCr to RGB
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = (y as f32 - 16.0) * 1.164;
    let d = u as f32 - 128.0;
    let e = v as f32 - 128.0;
    let clamp = |value: f32| value.round().clamp(0.0, 255.0) as u8;
    [
        clamp(c + 1.596 * e),
        clamp(c - 0.392 * d - 0.813 * e),
        clamp(c + 2.017 * d),
    ]
}
