use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// One imaging field of view.
///
/// # Description
///
/// Value object describing a single session: its FOV image and dimensions
/// plus the number of ROIs segmented in it. Immutable after construction;
/// sessions carry no reference back to the dataset that owns them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub fov_image: DMatrix<f32>,
    pub fov_height: usize,
    pub fov_width: usize,
    pub n_roi: usize,
}

impl Session {
    /// Creates a new `Session`, taking the FOV dimensions from the image.
    pub fn new(fov_image: DMatrix<f32>, n_roi: usize) -> Self {
        let fov_height = fov_image.nrows();
        let fov_width = fov_image.ncols();
        Session {
            fov_image,
            fov_height,
            fov_width,
            n_roi,
        }
    }
}

/// Normalizes a file-sourced FOV image: subtract the image minimum, then
/// divide by the mean of the shifted image. Externally supplied images are
/// expected to bypass this step.
pub fn normalize_fov_image(image: &DMatrix<f32>) -> DMatrix<f32> {
    let min = image.min();
    let shifted = image.map(|v| v - min);
    let mean = shifted.mean();
    shifted.map(|v| v / mean)
}
