use std::str::FromStr;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median};
use thiserror::Error;

use crate::data::footprint::SpatialFootprints;

#[derive(Debug, Error, PartialEq)]
pub enum CentroidError {
    #[error("only valid methods are \"centroid\" or \"median\", got \"{0}\"")]
    UnknownMethod(String),
    #[error("roi {roi}: footprint has zero total mass")]
    ZeroMass { roi: usize },
}

/// Selects how an ROI's representative position is computed.
///
/// # Description
///
/// `Centroid` computes the weighted mean location of the mask. `Median`
/// takes the median of the row and column indices the mask occupies.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum CentroidMethod {
    Centroid,
    Median,
}

impl Default for CentroidMethod {
    fn default() -> Self {
        CentroidMethod::Centroid
    }
}

impl FromStr for CentroidMethod {
    type Err = CentroidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "centroid" => Ok(CentroidMethod::Centroid),
            "median" => Ok(CentroidMethod::Median),
            other => Err(CentroidError::UnknownMethod(other.to_string())),
        }
    }
}

/// Integer `(row, col)` position of one ROI within the FOV grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct Centroid {
    pub row: i64,
    pub col: i64,
}

/// Computes per-ROI centroids from a session's footprint matrix.
///
/// # Arguments
///
/// * `footprints` - the session's sparse footprint matrix.
/// * `method` - weighted mean or occupied-index median.
///
/// # Returns
///
/// One `Centroid` per ROI, rounded to the nearest integer. Centroids lie
/// within `[0, fov_height) x [0, fov_width)` for any mask with non-negative
/// weights.
///
/// # Example
///
/// ```rust
/// # use roicore::data::footprint::SpatialFootprints;
/// # use roicore::algorithm::centroid::{compute_centroids, CentroidMethod};
/// let mut sf = SpatialFootprints::new(8, 8);
/// sf.push_row(&[2, 2, 2], &[1, 2, 3], &[1.0, 1.0, 1.0]).unwrap();
/// let centroids = compute_centroids(&sf, CentroidMethod::Centroid).unwrap();
/// assert_eq!((centroids[0].row, centroids[0].col), (2, 2));
/// ```
pub fn compute_centroids(
    footprints: &SpatialFootprints,
    method: CentroidMethod,
) -> Result<Vec<Centroid>, CentroidError> {
    let mut centroids = Vec::with_capacity(footprints.n_rois());
    for roi in 0..footprints.n_rois() {
        let (row_profile, col_profile) = footprints.row_profiles(roi);
        let (row, col) = match method {
            CentroidMethod::Centroid => (
                weighted_mean_index(&row_profile),
                weighted_mean_index(&col_profile),
            ),
            CentroidMethod::Median => (median_index(&row_profile), median_index(&col_profile)),
        };
        match (row, col) {
            (Some(row), Some(col)) => centroids.push(Centroid { row, col }),
            _ => return Err(CentroidError::ZeroMass { roi }),
        }
    }
    Ok(centroids)
}

/// Weight-marginal mean index, `sum(i * w_i) / sum(w_i)`, rounded.
fn weighted_mean_index(profile: &[f64]) -> Option<i64> {
    let mass: f64 = profile.iter().sum();
    if mass == 0.0 {
        return None;
    }
    let weighted: f64 = profile
        .iter()
        .enumerate()
        .map(|(index, weight)| index as f64 * weight)
        .sum();
    Some((weighted / mass).round() as i64)
}

/// Median of the indices whose marginal is non-zero. Zero entries are
/// treated as missing, not as index value 0.
fn median_index(profile: &[f64]) -> Option<i64> {
    let occupied: Vec<f64> = profile
        .iter()
        .enumerate()
        .filter(|(_, &weight)| weight != 0.0)
        .map(|(index, _)| index as f64)
        .collect();
    if occupied.is_empty() {
        return None;
    }
    Some(Data::new(occupied).median().round() as i64)
}
