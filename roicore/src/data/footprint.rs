use bincode::{Decode, Encode};
use itertools::izip;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while normalizing ROI weights or building footprint rows.
#[derive(Debug, Error, PartialEq)]
pub enum FootprintError {
    #[error("roi {roi}: pixel and weight sequences have mismatched lengths ({rows}, {cols}, {weights})")]
    LengthMismatch {
        roi: usize,
        rows: usize,
        cols: usize,
        weights: usize,
    },
    #[error("roi {roi}: empty pixel list")]
    EmptyRoi { roi: usize },
    #[error("roi {roi}: weight vector sums to zero")]
    ZeroWeightSum { roi: usize },
    #[error("roi {roi}: pixel ({row}, {col}) lies outside the {fov_height}x{fov_width} field of view")]
    PixelOutOfBounds {
        roi: usize,
        row: i64,
        col: i64,
        fov_height: usize,
        fov_width: usize,
    },
}

/// Storage dtype requested for footprint weights.
///
/// # Description
///
/// `F32` normalizes each ROI's weight vector to unit sum. The unsigned
/// variants rescale the normalized weights to the dtype's maximum value and
/// truncate to whole numbers; storage stays `f32`, which represents both
/// integer ranges exactly.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum WeightDtype {
    F32,
    U8,
    U16,
}

impl Default for WeightDtype {
    fn default() -> Self {
        WeightDtype::F32
    }
}

impl WeightDtype {
    fn max_value(&self) -> Option<f32> {
        match self {
            WeightDtype::F32 => None,
            WeightDtype::U8 => Some(u8::MAX as f32),
            WeightDtype::U16 => Some(u16::MAX as f32),
        }
    }

    /// Normalizes one ROI's weight vector for storage.
    ///
    /// # Arguments
    ///
    /// * `weights` - raw per-pixel weights of a single ROI.
    /// * `roi` - index of the ROI, used for error context.
    ///
    /// An empty weight vector or a vector summing to zero is rejected
    /// instead of propagating non-finite values.
    pub fn normalize(&self, weights: &[f32], roi: usize) -> Result<Vec<f32>, FootprintError> {
        if weights.is_empty() {
            return Err(FootprintError::EmptyRoi { roi });
        }
        let sum: f32 = weights.iter().sum();
        if sum == 0.0 {
            return Err(FootprintError::ZeroWeightSum { roi });
        }
        match self.max_value() {
            None => Ok(weights.iter().map(|w| w / sum).collect()),
            Some(max) => Ok(weights.iter().map(|w| (w / sum * max).trunc()).collect()),
        }
    }
}

/// Sparse spatial footprint masks of one session's ROIs.
///
/// # Description
///
/// CSR matrix of shape `(n_roi, fov_height * fov_width)` with row-major
/// pixel flattening: the mask weight of ROI `r` at pixel `(row, col)` is
/// stored under column index `row * fov_width + col`. Column indices within
/// a row are kept in ascending order. Every row holds at least one entry;
/// the row builders reject empty ROIs.
#[derive(Clone, Debug, Serialize, Deserialize, Encode, Decode)]
pub struct SpatialFootprints {
    pub fov_height: usize,
    pub fov_width: usize,
    pub indptr: Vec<usize>,
    pub indices: Vec<usize>,
    pub data: Vec<f32>,
}

impl SpatialFootprints {
    /// Creates an empty footprint matrix over a `fov_height` x `fov_width` grid.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use roicore::data::footprint::SpatialFootprints;
    /// let mut sf = SpatialFootprints::new(4, 4);
    /// sf.push_row(&[1], &[2], &[1.0]).unwrap();
    /// assert_eq!(sf.n_rois(), 1);
    /// assert_eq!(sf.row(0), (&[6usize][..], &[1.0f32][..]));
    /// ```
    pub fn new(fov_height: usize, fov_width: usize) -> Self {
        SpatialFootprints {
            fov_height,
            fov_width,
            indptr: vec![0],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn n_rois(&self) -> usize {
        self.indptr.len() - 1
    }

    pub fn n_pixels(&self) -> usize {
        self.fov_height * self.fov_width
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Appends one ROI given parallel row/col pixel coordinates and weights.
    ///
    /// Coordinates are bounds-checked against the FOV grid and the row is
    /// sorted into canonical column order before storage.
    pub fn push_row(
        &mut self,
        rows: &[i64],
        cols: &[i64],
        weights: &[f32],
    ) -> Result<(), FootprintError> {
        let roi = self.n_rois();
        if rows.len() != cols.len() || rows.len() != weights.len() {
            return Err(FootprintError::LengthMismatch {
                roi,
                rows: rows.len(),
                cols: cols.len(),
                weights: weights.len(),
            });
        }
        let mut entries: Vec<(usize, f32)> = Vec::with_capacity(rows.len());
        for (&row, &col, &weight) in izip!(rows, cols, weights) {
            if row < 0 || row >= self.fov_height as i64 || col < 0 || col >= self.fov_width as i64
            {
                return Err(FootprintError::PixelOutOfBounds {
                    roi,
                    row,
                    col,
                    fov_height: self.fov_height,
                    fov_width: self.fov_width,
                });
            }
            entries.push((row as usize * self.fov_width + col as usize, weight));
        }
        self.push_row_flat(entries)
    }

    /// Appends one ROI given `(flattened pixel index, weight)` entries.
    pub fn push_row_flat(&mut self, mut entries: Vec<(usize, f32)>) -> Result<(), FootprintError> {
        let roi = self.n_rois();
        if entries.is_empty() {
            return Err(FootprintError::EmptyRoi { roi });
        }
        for &(index, _) in &entries {
            if index >= self.n_pixels() {
                return Err(FootprintError::PixelOutOfBounds {
                    roi,
                    row: (index / self.fov_width) as i64,
                    col: (index % self.fov_width) as i64,
                    fov_height: self.fov_height,
                    fov_width: self.fov_width,
                });
            }
        }
        entries.sort_by_key(|&(index, _)| index);
        for (index, weight) in entries {
            self.indices.push(index);
            self.data.push(weight);
        }
        self.indptr.push(self.indices.len());
        Ok(())
    }

    /// Column indices and weights of one ROI's row.
    pub fn row(&self, roi: usize) -> (&[usize], &[f32]) {
        let start = self.indptr[roi];
        let end = self.indptr[roi + 1];
        (&self.indices[start..end], &self.data[start..end])
    }

    /// Iterates one ROI's entries as decoded `(row, col, weight)` triples.
    pub fn iter_row(&self, roi: usize) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        let (indices, data) = self.row(roi);
        let width = self.fov_width;
        indices
            .iter()
            .zip(data)
            .map(move |(&index, &weight)| (index / width, index % width, weight))
    }

    /// Axis-wise marginal weight sums of one ROI.
    ///
    /// # Returns
    ///
    /// `(row_profile, col_profile)` where `row_profile[i]` is the summed
    /// mask weight in FOV row `i` (length `fov_height`) and `col_profile[j]`
    /// the summed weight in FOV column `j` (length `fov_width`).
    pub fn row_profiles(&self, roi: usize) -> (Vec<f64>, Vec<f64>) {
        let mut row_profile = vec![0.0f64; self.fov_height];
        let mut col_profile = vec![0.0f64; self.fov_width];
        for (row, col, weight) in self.iter_row(roi) {
            row_profile[row] += weight as f64;
            col_profile[col] += weight as f64;
        }
        (row_profile, col_profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_row_flattens_row_major_and_sorts() {
        let mut sf = SpatialFootprints::new(3, 4);
        sf.push_row(&[2, 0, 1], &[3, 1, 0], &[0.5, 0.25, 0.25]).unwrap();
        let (indices, data) = sf.row(0);
        assert_eq!(indices, &[1, 4, 11]);
        assert_eq!(data, &[0.25, 0.25, 0.5]);
        assert_eq!(sf.n_rois(), 1);
        assert_eq!(sf.nnz(), 3);
    }

    #[test]
    fn test_push_row_rejects_out_of_bounds_pixels() {
        let mut sf = SpatialFootprints::new(3, 4);
        let err = sf.push_row(&[3], &[0], &[1.0]).unwrap_err();
        assert_eq!(
            err,
            FootprintError::PixelOutOfBounds {
                roi: 0,
                row: 3,
                col: 0,
                fov_height: 3,
                fov_width: 4
            }
        );
        let err = sf.push_row(&[0], &[-1], &[1.0]).unwrap_err();
        assert!(matches!(err, FootprintError::PixelOutOfBounds { col: -1, .. }));
    }

    #[test]
    fn test_push_row_rejects_empty_and_mismatched_rois() {
        let mut sf = SpatialFootprints::new(3, 4);
        assert_eq!(
            sf.push_row(&[], &[], &[]).unwrap_err(),
            FootprintError::EmptyRoi { roi: 0 }
        );
        assert!(matches!(
            sf.push_row(&[0, 1], &[0], &[1.0, 1.0]).unwrap_err(),
            FootprintError::LengthMismatch { .. }
        ));
    }

    #[test]
    fn test_normalize_unit_sum() {
        let weights = WeightDtype::F32.normalize(&[1.0, 3.0], 0).unwrap();
        assert_eq!(weights, vec![0.25, 0.75]);
    }

    #[test]
    fn test_normalize_rescales_to_uint_max() {
        let weights = WeightDtype::U8.normalize(&[1.0, 1.0], 0).unwrap();
        assert_eq!(weights, vec![127.0, 127.0]);
        let weights = WeightDtype::U16.normalize(&[2.0, 2.0], 0).unwrap();
        assert_eq!(weights, vec![32767.0, 32767.0]);
        assert!(weights.iter().all(|w| w.fract() == 0.0));
    }

    #[test]
    fn test_normalize_rejects_zero_sum_and_empty() {
        assert_eq!(
            WeightDtype::F32.normalize(&[0.0, 0.0], 7).unwrap_err(),
            FootprintError::ZeroWeightSum { roi: 7 }
        );
        assert_eq!(
            WeightDtype::F32.normalize(&[], 7).unwrap_err(),
            FootprintError::EmptyRoi { roi: 7 }
        );
    }

    #[test]
    fn test_row_profiles_are_marginal_sums() {
        let mut sf = SpatialFootprints::new(3, 3);
        sf.push_row(&[0, 0, 1], &[0, 2, 1], &[0.25, 0.25, 0.5]).unwrap();
        let (row_profile, col_profile) = sf.row_profiles(0);
        assert_eq!(row_profile, vec![0.5, 0.5, 0.0]);
        assert_eq!(col_profile, vec![0.25, 0.5, 0.25]);
    }
}
