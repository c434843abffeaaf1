use nalgebra::DMatrix;
use thiserror::Error;

use crate::algorithm::centroid::Centroid;
use crate::data::footprint::SpatialFootprints;

#[derive(Debug, Error, PartialEq)]
pub enum CenteringError {
    #[error("expected {expected} centroids for {expected} rois, got {got}")]
    CentroidCountMismatch { expected: usize, got: usize },
    #[error("roi {roi}: malformed sparse footprint structure, roi contributes no entries (an roi is possibly all zeros)")]
    MalformedStructure { roi: usize },
}

/// Crops and recenters every ROI mask into a fixed-size dense patch.
///
/// # Description
///
/// The footprint matrix is read as a grouped coordinate list
/// `(roi, row, col, weight)`. Each ROI's coordinates are translated by
/// `(-centroid_row + ceil(out_height / 2), -centroid_col + ceil(out_width / 2))`
/// and entries falling outside `[0, out_height) x [0, out_width)` are
/// discarded, not wrapped or padded. The result is densified, so every
/// output patch is exactly `out_height` x `out_width` by construction,
/// regardless of the ROI's extent or position near the FOV edges.
///
/// The grouped structure is verified first: an ROI contributing no entries
/// means the sparse layout is malformed (typically an all-zero mask) and is
/// a hard error, not a silently skipped ROI.
pub fn center_rois(
    footprints: &SpatialFootprints,
    centroids: &[Centroid],
    out_height: usize,
    out_width: usize,
) -> Result<Vec<DMatrix<f32>>, CenteringError> {
    if centroids.len() != footprints.n_rois() {
        return Err(CenteringError::CentroidCountMismatch {
            expected: footprints.n_rois(),
            got: centroids.len(),
        });
    }
    for roi in 0..footprints.n_rois() {
        if footprints.indptr[roi + 1] == footprints.indptr[roi] {
            return Err(CenteringError::MalformedStructure { roi });
        }
    }

    let half_height = (out_height as f64 / 2.0).ceil() as i64;
    let half_width = (out_width as f64 / 2.0).ceil() as i64;

    let mut images = Vec::with_capacity(footprints.n_rois());
    for (roi, centroid) in centroids.iter().enumerate() {
        let mut image = DMatrix::<f32>::zeros(out_height, out_width);
        for (row, col, weight) in footprints.iter_row(roi) {
            let row = row as i64 - centroid.row + half_height;
            let col = col as i64 - centroid.col + half_width;
            if row < 0 || row >= out_height as i64 || col < 0 || col >= out_width as i64 {
                continue;
            }
            image[(row as usize, col as usize)] += weight;
        }
        images.push(image);
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::centroid::{compute_centroids, CentroidMethod};

    #[test]
    fn test_output_patches_have_the_requested_shape() {
        let mut sf = SpatialFootprints::new(50, 60);
        sf.push_row(&[10, 11], &[20, 20], &[0.5, 0.5]).unwrap();
        sf.push_row(&[0], &[0], &[1.0]).unwrap();
        sf.push_row(&[49], &[59], &[1.0]).unwrap();
        let centroids = compute_centroids(&sf, CentroidMethod::Centroid).unwrap();
        let images = center_rois(&sf, &centroids, 36, 36).unwrap();
        assert_eq!(images.len(), 3);
        for image in &images {
            assert_eq!((image.nrows(), image.ncols()), (36, 36));
        }
    }

    #[test]
    fn test_single_pixel_lands_at_the_patch_center() {
        let mut sf = SpatialFootprints::new(50, 50);
        sf.push_row(&[7], &[31], &[1.0]).unwrap();
        let centroids = compute_centroids(&sf, CentroidMethod::Centroid).unwrap();
        let images = center_rois(&sf, &centroids, 36, 36).unwrap();
        assert_eq!(images[0][(18, 18)], 1.0);
        assert_eq!(images[0].sum(), 1.0);
    }

    #[test]
    fn test_translation_is_relative_to_the_centroid() {
        // two pixels straddling the centroid row
        let mut sf = SpatialFootprints::new(40, 40);
        sf.push_row(&[10, 12], &[5, 5], &[0.5, 0.5]).unwrap();
        let centroids = compute_centroids(&sf, CentroidMethod::Centroid).unwrap();
        assert_eq!(centroids[0], Centroid { row: 11, col: 5 });
        let images = center_rois(&sf, &centroids, 20, 20).unwrap();
        assert_eq!(images[0][(9, 10)], 0.5);
        assert_eq!(images[0][(11, 10)], 0.5);
    }

    #[test]
    fn test_entries_outside_the_window_are_discarded() {
        // wide roi: mass far from the centroid falls off the 8x8 patch
        let mut sf = SpatialFootprints::new(64, 64);
        sf.push_row(&[30, 30, 30], &[2, 30, 58], &[0.1, 0.8, 0.1]).unwrap();
        let centroids = vec![Centroid { row: 30, col: 30 }];
        let images = center_rois(&sf, &centroids, 8, 8).unwrap();
        assert_eq!((images[0].nrows(), images[0].ncols()), (8, 8));
        assert_eq!(images[0][(4, 4)], 0.8);
        assert_eq!(images[0].sum(), 0.8);
    }

    #[test]
    fn test_malformed_structure_is_a_hard_error() {
        // hand-assembled matrix whose middle roi holds no entries
        let sf = SpatialFootprints {
            fov_height: 4,
            fov_width: 4,
            indptr: vec![0, 1, 1, 2],
            indices: vec![0, 15],
            data: vec![1.0, 1.0],
        };
        let centroids = vec![
            Centroid { row: 0, col: 0 },
            Centroid { row: 0, col: 0 },
            Centroid { row: 3, col: 3 },
        ];
        assert_eq!(
            center_rois(&sf, &centroids, 4, 4).unwrap_err(),
            CenteringError::MalformedStructure { roi: 1 }
        );
    }

    #[test]
    fn test_centroid_count_mismatch_is_rejected() {
        let mut sf = SpatialFootprints::new(4, 4);
        sf.push_row(&[1], &[1], &[1.0]).unwrap();
        assert_eq!(
            center_rois(&sf, &[], 4, 4).unwrap_err(),
            CenteringError::CentroidCountMismatch { expected: 1, got: 0 }
        );
    }
}
