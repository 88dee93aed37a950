//! Camera Capture Library for the Stress Detector
//!
//! Provides the frame types and live sources consumed by the capture loop:
//! - `VideoFrame`: decoded 8-bit RGB raster
//! - Upload decoding (JPEG, PNG, BMP, ...)
//! - `FrameSource`: blocking live source contract, released on drop
//! - `ImageSequenceSource`: replays a directory of images as a live feed
//! - `V4l2Source`: local webcam (`v4l2` feature)

#[cfg(feature = "v4l2")]
pub mod device;
pub mod frame;
pub mod source;

#[cfg(feature = "v4l2")]
pub use device::V4l2Source;
pub use frame::{Region, VideoFrame};
pub use source::{FrameSource, ImageSequenceSource};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to open source: {0}")]
    Open(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Failed to read frame: {0}")]
    Read(String),

    #[error("Source exhausted")]
    Exhausted,
}

/// Which kind of live source feeds the capture loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Replay image files from a directory
    #[default]
    Directory,
    /// Local webcam device node
    Device,
    /// No live source; only on-demand analysis is served
    None,
}

/// Live source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Source kind
    pub kind: SourceKind,
    /// Directory holding the frames (directory source)
    pub path: PathBuf,
    /// Restart from the first frame once the sequence is exhausted
    pub looping: bool,
    /// Video device node (device source)
    pub device: String,
    /// Requested capture width (device source)
    pub width: u32,
    /// Requested capture height (device source)
    pub height: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Directory,
            path: PathBuf::from("frames"),
            looping: false,
            device: "/dev/video0".to_string(),
            width: 640,
            height: 480,
        }
    }
}

impl SourceConfig {
    /// Whether a live source should be opened at all
    pub fn is_enabled(&self) -> bool {
        self.kind != SourceKind::None
    }

    /// Open the configured live source
    pub fn open(&self) -> Result<Box<dyn FrameSource>, CaptureError> {
        match self.kind {
            SourceKind::Directory => Ok(Box::new(ImageSequenceSource::open(
                &self.path,
                self.looping,
            )?)),
            SourceKind::Device => self.open_device(),
            SourceKind::None => Err(CaptureError::Open("no live source configured".to_string())),
        }
    }

    #[cfg(feature = "v4l2")]
    fn open_device(&self) -> Result<Box<dyn FrameSource>, CaptureError> {
        Ok(Box::new(V4l2Source::open(&self.device, self.width, self.height)?))
    }

    #[cfg(not(feature = "v4l2"))]
    fn open_device(&self) -> Result<Box<dyn FrameSource>, CaptureError> {
        Err(CaptureError::Open(format!(
            "cannot open webcam {}: built without the v4l2 feature",
            self.device
        )))
    }
}
