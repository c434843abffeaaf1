use std::str::FromStr;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use roicore::data::footprint::{SpatialFootprints, WeightDtype};

use crate::data::records::{Suite2pOps, Suite2pSession};
use crate::error::ImportError;

/// Which suite2p pixel-indexing convention the stat files use.
///
/// `Old` is the legacy matlab convention: 1-indexed coordinates relative to
/// the registered subregion, requiring a per-session shift back onto the
/// 0-indexed full FOV. `New` stat files are already full-FOV 0-indexed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum IndexingConvention {
    New,
    Old,
}

impl Default for IndexingConvention {
    fn default() -> Self {
        IndexingConvention::New
    }
}

impl FromStr for IndexingConvention {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(IndexingConvention::New),
            "old" => Ok(IndexingConvention::Old),
            other => Err(ImportError::UnknownConvention(other.to_string())),
        }
    }
}

/// Which ops mean image is used as the session FOV image.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum MeanImageKind {
    Enhanced,
    Plain,
}

impl Default for MeanImageKind {
    fn default() -> Self {
        MeanImageKind::Enhanced
    }
}

impl FromStr for MeanImageKind {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ops-file key names
        match s {
            "meanImgE" => Ok(MeanImageKind::Enhanced),
            "meanImg" => Ok(MeanImageKind::Plain),
            other => Err(ImportError::UnknownMeanImage(other.to_string())),
        }
    }
}

/// Per-session `(row, col)` offset re-basing legacy coordinates onto the
/// 0-indexed full FOV. Zero under the `New` convention; under `Old` it is
/// `(min(yrange) - 1, min(xrange) - 1)` and the ops record must be present.
pub fn session_shift(
    session: usize,
    ops: Option<&Suite2pOps>,
    convention: IndexingConvention,
) -> Result<(i64, i64), ImportError> {
    match convention {
        IndexingConvention::New => Ok((0, 0)),
        IndexingConvention::Old => {
            let ops = ops.ok_or(ImportError::MissingOps { session })?;
            Ok((ops.yrange.0 - 1, ops.xrange.0 - 1))
        }
    }
}

/// Builds one session's footprint matrix from its decoded stat records.
///
/// Each ROI's weights are normalized per `dtype`, its pixel coordinates are
/// shift-corrected, and one sparse row per ROI is stacked in record order.
/// Shifted coordinates falling outside the FOV are a fatal bounds error.
pub fn build_footprints(
    session: usize,
    record: &Suite2pSession,
    fov_height: usize,
    fov_width: usize,
    dtype: WeightDtype,
    convention: IndexingConvention,
) -> Result<SpatialFootprints, ImportError> {
    let shift = session_shift(session, record.ops.as_ref(), convention)?;
    let mut footprints = SpatialFootprints::new(fov_height, fov_width);
    for roi in &record.rois {
        let weights = dtype.normalize(&roi.lam, footprints.n_rois())?;
        let rows: Vec<i64> = roi.ypix.iter().map(|&y| y + shift.0).collect();
        let cols: Vec<i64> = roi.xpix.iter().map(|&x| x + shift.1).collect();
        footprints.push_row(&rows, &cols, &weights)?;
    }
    Ok(footprints)
}

/// Selects the session FOV image from the ops record.
pub fn fov_image(
    session: usize,
    record: &Suite2pSession,
    kind: MeanImageKind,
) -> Result<DMatrix<f32>, ImportError> {
    let ops = record
        .ops
        .as_ref()
        .ok_or(ImportError::MissingFovImage { session })?;
    let plane = match kind {
        MeanImageKind::Enhanced => ops.mean_img_enhanced.as_ref(),
        MeanImageKind::Plain => ops.mean_img.as_ref(),
    };
    plane
        .ok_or(ImportError::MissingFovImage { session })?
        .to_matrix()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::records::{ImagePlane, Suite2pRoi};

    fn ops(yrange: (i64, i64), xrange: (i64, i64)) -> Suite2pOps {
        Suite2pOps {
            yrange,
            xrange,
            mean_img: None,
            mean_img_enhanced: None,
        }
    }

    #[test]
    fn test_legacy_shift_rebases_onto_the_full_fov() {
        let record = Suite2pSession {
            rois: vec![Suite2pRoi {
                ypix: vec![0],
                xpix: vec![0],
                lam: vec![1.0],
            }],
            ops: Some(ops((5, 10), (3, 8))),
        };
        let footprints =
            build_footprints(0, &record, 20, 20, WeightDtype::F32, IndexingConvention::Old)
                .unwrap();
        let pixels: Vec<(usize, usize, f32)> = footprints.iter_row(0).collect();
        assert_eq!(pixels, vec![(4, 2, 1.0)]);
    }

    #[test]
    fn test_new_convention_applies_no_shift() {
        let record = Suite2pSession {
            rois: vec![Suite2pRoi {
                ypix: vec![7],
                xpix: vec![9],
                lam: vec![2.0],
            }],
            ops: None,
        };
        let footprints =
            build_footprints(0, &record, 20, 20, WeightDtype::F32, IndexingConvention::New)
                .unwrap();
        let pixels: Vec<(usize, usize, f32)> = footprints.iter_row(0).collect();
        assert_eq!(pixels, vec![(7, 9, 1.0)]);
    }

    #[test]
    fn test_legacy_convention_requires_ops() {
        let record = Suite2pSession {
            rois: Vec::new(),
            ops: None,
        };
        let err = build_footprints(2, &record, 20, 20, WeightDtype::F32, IndexingConvention::Old)
            .unwrap_err();
        assert!(matches!(err, ImportError::MissingOps { session: 2 }));
    }

    #[test]
    fn test_convention_parsing() {
        assert!(matches!("new".parse(), Ok(IndexingConvention::New)));
        assert!(matches!("old".parse(), Ok(IndexingConvention::Old)));
        assert!(matches!(
            "matlab".parse::<IndexingConvention>().unwrap_err(),
            ImportError::UnknownConvention(_)
        ));
    }

    #[test]
    fn test_shifted_pixels_outside_the_fov_are_fatal() {
        let record = Suite2pSession {
            rois: vec![Suite2pRoi {
                ypix: vec![19],
                xpix: vec![0],
                lam: vec![1.0],
            }],
            ops: Some(ops((3, 10), (1, 8))),
        };
        let err = build_footprints(0, &record, 20, 20, WeightDtype::F32, IndexingConvention::Old)
            .unwrap_err();
        assert!(matches!(
            err,
            ImportError::Footprint(roicore::data::footprint::FootprintError::PixelOutOfBounds {
                row: 21,
                ..
            })
        ));
    }

    #[test]
    fn test_weights_are_normalized_per_roi() {
        let record = Suite2pSession {
            rois: vec![Suite2pRoi {
                ypix: vec![1, 1],
                xpix: vec![2, 3],
                lam: vec![3.0, 1.0],
            }],
            ops: None,
        };
        let footprints =
            build_footprints(0, &record, 4, 4, WeightDtype::F32, IndexingConvention::New).unwrap();
        let (_, weights) = footprints.row(0);
        assert_eq!(weights, &[0.75, 0.25]);
    }

    #[test]
    fn test_fov_image_selection() {
        let plane = ImagePlane {
            height: 2,
            width: 2,
            data: vec![1.0, 2.0, 3.0, 4.0],
        };
        let record = Suite2pSession {
            rois: Vec::new(),
            ops: Some(Suite2pOps {
                yrange: (0, 2),
                xrange: (0, 2),
                mean_img: Some(plane.clone()),
                mean_img_enhanced: None,
            }),
        };
        assert!(fov_image(0, &record, MeanImageKind::Plain).is_ok());
        assert!(matches!(
            fov_image(0, &record, MeanImageKind::Enhanced).unwrap_err(),
            ImportError::MissingFovImage { session: 0 }
        ));
        assert!(matches!("meanImgE".parse(), Ok(MeanImageKind::Enhanced)));
        assert!("meanImgX".parse::<MeanImageKind>().is_err());
    }
}
