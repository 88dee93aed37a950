//! Face location

use std::path::Path;
use std::sync::Arc;

use camera_capture::{Region, VideoFrame};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::{MonitorConfig, MonitorError};

/// Face detection capability operating on intensity images.
///
/// Returns every candidate region in the detector's own order. The order
/// carries no ranking guarantee.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, gray: &GrayImage) -> Vec<Region>;
}

/// Policy used to pick one face when the detector reports several
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaceSelection {
    /// First region in detector order
    #[default]
    First,
    /// Largest region by area, earliest on ties
    Largest,
}

impl FaceSelection {
    /// Pick one region out of the candidates
    pub fn select(&self, regions: &[Region]) -> Option<Region> {
        match self {
            FaceSelection::First => regions.first().copied(),
            FaceSelection::Largest => regions.iter().copied().fold(None, |best, r| match best {
                Some(b) if r.area() <= b.area() => Some(b),
                _ => Some(r),
            }),
        }
    }
}

/// Locates at most one face in a color frame
#[derive(Clone)]
pub struct FaceLocator {
    detector: Arc<dyn FaceDetector>,
    selection: FaceSelection,
}

impl FaceLocator {
    pub fn new(detector: Arc<dyn FaceDetector>, selection: FaceSelection) -> Self {
        Self {
            detector,
            selection,
        }
    }

    /// Locate a face. `None` means no face is visible, which is not an error.
    pub fn locate(&self, frame: &VideoFrame) -> Option<Region> {
        let gray = frame.to_grayscale();

        let regions: Vec<Region> = self
            .detector
            .detect(&gray)
            .into_iter()
            .filter_map(|r| r.clamp_to(frame.width, frame.height))
            .collect();

        debug!("Detector reported {} face(s)", regions.len());
        self.selection.select(&regions)
    }
}

/// Frontal face detector backed by the `rustface` crate (SeetaFace engine)
pub struct RustfaceDetector {
    model: rustface::Model,
    min_face_size: u32,
    score_threshold: f64,
}

impl RustfaceDetector {
    /// Load the SeetaFace model from disk
    pub fn load(model_path: impl AsRef<Path>, config: &MonitorConfig) -> Result<Self, MonitorError> {
        let model_path = model_path.as_ref();
        info!("Loading face detection model from {}", model_path.display());

        let file = std::fs::File::open(model_path).map_err(|e| {
            error!("Failed to open face model: {}", e);
            MonitorError::ModelLoad(format!("{}: {}", model_path.display(), e))
        })?;
        let model = rustface::read_model(std::io::BufReader::new(file)).map_err(|e| {
            error!("Failed to parse face model: {}", e);
            MonitorError::ModelLoad(format!("{}: {}", model_path.display(), e))
        })?;

        Ok(Self {
            model,
            min_face_size: config.min_face_size,
            score_threshold: config.score_threshold,
        })
    }
}

impl FaceDetector for RustfaceDetector {
    fn detect(&self, gray: &GrayImage) -> Vec<Region> {
        // rustface detectors are stateful, build one per call
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(self.min_face_size);
        detector.set_score_thresh(self.score_threshold);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        let (width, height) = gray.dimensions();
        let faces = detector.detect(&rustface::ImageData::new(gray.as_raw(), width, height));

        faces
            .iter()
            .filter_map(|face| {
                let bbox = face.bbox();
                to_region(bbox.x(), bbox.y(), bbox.width(), bbox.height())
            })
            .collect()
    }
}

/// Convert a possibly negative-origin box to a frame region
fn to_region(x: i32, y: i32, width: u32, height: u32) -> Option<Region> {
    let clip = |origin: i32, extent: u32| -> Option<(u32, u32)> {
        if origin >= 0 {
            Some((origin as u32, extent))
        } else {
            extent
                .checked_sub(origin.unsigned_abs())
                .filter(|e| *e > 0)
                .map(|e| (0, e))
        }
    };
    let (x, width) = clip(x, width)?;
    let (y, height) = clip(y, height)?;
    Some(Region::new(x, y, width, height))
}
