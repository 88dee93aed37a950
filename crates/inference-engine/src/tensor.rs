//! Classifier input tensor

use image::GrayImage;
use ndarray::Array4;

use crate::InferenceError;

/// Side length of the square face crop fed to the classifier
pub const FACE_INPUT_SIZE: u32 = 48;

/// A single-sample batch of one 48x48 intensity face, shape [1, 48, 48, 1],
/// with values in [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFace {
    tensor: Array4<f32>,
}

impl NormalizedFace {
    /// Tensor shape expected by the classifier (NHWC)
    pub const SHAPE: [usize; 4] = [1, FACE_INPUT_SIZE as usize, FACE_INPUT_SIZE as usize, 1];

    /// Scale an already resized 48x48 intensity image to [0, 1]
    pub fn from_gray(image: &GrayImage) -> Result<Self, InferenceError> {
        if image.dimensions() != (FACE_INPUT_SIZE, FACE_INPUT_SIZE) {
            return Err(InferenceError::InvalidInputShape {
                expected: format!("{}x{}", FACE_INPUT_SIZE, FACE_INPUT_SIZE),
                actual: format!("{}x{}", image.width(), image.height()),
            });
        }

        let tensor = Array4::from_shape_fn(Self::SHAPE, |(_, y, x, _)| {
            image.get_pixel(x as u32, y as u32)[0] as f32 / 255.0
        });
        Ok(Self { tensor })
    }

    pub fn as_array(&self) -> &Array4<f32> {
        &self.tensor
    }

    /// Row-major copy of the tensor values
    pub fn to_vec(&self) -> Vec<f32> {
        self.tensor.iter().copied().collect()
    }
}
