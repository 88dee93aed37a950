//! Live frame sources

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use image::ImageFormat;
use tracing::{debug, info, warn};

use crate::{CaptureError, VideoFrame};

/// Blocking live frame source.
///
/// A source is acquired by constructing it and released by dropping it,
/// so every exit path of a consumer releases the device exactly once.
pub trait FrameSource: Send {
    /// Read the next frame, blocking until one is available
    fn read_frame(&mut self) -> Result<VideoFrame, CaptureError>;

    /// Human readable source description for logs
    fn describe(&self) -> String;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read_frame(&mut self) -> Result<VideoFrame, CaptureError> {
        (**self).read_frame()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Replays the image files of a directory, in file-name order, as a live feed
pub struct ImageSequenceSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
    looping: bool,
    sequence: u32,
}

impl ImageSequenceSource {
    /// Open a directory of frames
    pub fn open(dir: impl AsRef<Path>, looping: bool) -> Result<Self, CaptureError> {
        let dir = dir.as_ref().to_path_buf();
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| CaptureError::Open(format!("{}: {}", dir.display(), e)))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && ImageFormat::from_path(path).is_ok())
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CaptureError::Open(format!(
                "{}: no image files found",
                dir.display()
            )));
        }

        info!("Opened image sequence {} ({} frames)", dir.display(), files.len());

        Ok(Self {
            dir,
            files,
            next: 0,
            looping,
            sequence: 0,
        })
    }

    /// Number of frames in one pass of the sequence
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn read_frame(&mut self) -> Result<VideoFrame, CaptureError> {
        if self.next >= self.files.len() {
            if !self.looping {
                return Err(CaptureError::Exhausted);
            }
            debug!("Image sequence wrapped around");
            self.next = 0;
        }

        let path = &self.files[self.next];
        self.next += 1;

        let img = image::open(path).map_err(|e| {
            warn!("Unreadable frame {}: {}", path.display(), e);
            CaptureError::Read(format!("{}: {}", path.display(), e))
        })?;

        let mut frame = VideoFrame::from_rgb_image(img.to_rgb8());
        frame.sequence = self.sequence;
        frame.timestamp_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        self.sequence = self.sequence.wrapping_add(1);

        Ok(frame)
    }

    fn describe(&self) -> String {
        format!("image sequence {}", self.dir.display())
    }
}

impl Drop for ImageSequenceSource {
    fn drop(&mut self) {
        info!("Released image sequence {}", self.dir.display());
    }
}
