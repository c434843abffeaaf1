use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use roicore::data::footprint::SpatialFootprints;

use crate::data::records::{CaimanSession, CscMatrix};
use crate::error::ImportError;

/// Per-component bookkeeping carried alongside a CaImAn session's
/// footprints: whether each component was accepted by CaImAn and its CNN
/// quality prediction, concatenated included-then-discarded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaimanMeta {
    pub accepted: Vec<bool>,
    pub cnn_preds: Vec<f32>,
}

/// Builds one session's footprint matrix from its CaImAn results record.
///
/// The spatial component matrix is stored column-compressed over
/// Fortran-flattened pixels, so each column is reinterpreted: Fortran index
/// `p` decodes to `(row, col) = (p % fov_height, p / fov_height)` and is
/// re-encoded row-major as `row * fov_width + col`. This is the
/// reshape-transpose-reflatten step that reconciles the two toolchains'
/// flatten orders; skipping it silently yields transposed masks. Discarded
/// components, when requested and present, are appended after the included
/// ones.
pub fn build_footprints(
    session: usize,
    record: &CaimanSession,
    include_discarded: bool,
) -> Result<(SpatialFootprints, CaimanMeta), ImportError> {
    let (fov_height, fov_width) = record.dims;
    let mut footprints = SpatialFootprints::new(fov_height, fov_width);

    append_components(session, &mut footprints, &record.spatial)?;
    let mut accepted = vec![true; record.spatial.cols];
    let mut cnn_preds = record.cnn_preds.clone();

    if include_discarded {
        if let Some(discarded) = &record.discarded {
            append_components(session, &mut footprints, discarded)?;
            accepted.extend(std::iter::repeat(false).take(discarded.cols));
            if let Some(preds) = &record.discarded_cnn_preds {
                cnn_preds.extend_from_slice(preds);
            }
        }
    }

    if cnn_preds.len() != footprints.n_rois() {
        return Err(ImportError::ComponentCountMismatch {
            session,
            expected: footprints.n_rois(),
            got: cnn_preds.len(),
        });
    }
    Ok((footprints, CaimanMeta { accepted, cnn_preds }))
}

fn append_components(
    session: usize,
    footprints: &mut SpatialFootprints,
    matrix: &CscMatrix,
) -> Result<(), ImportError> {
    let fov_height = footprints.fov_height;
    let fov_width = footprints.fov_width;
    if matrix.rows != fov_height * fov_width {
        return Err(ImportError::MalformedCsc {
            session,
            reason: format!(
                "{} pixel rows for a {}x{} fov",
                matrix.rows, fov_height, fov_width
            ),
        });
    }
    matrix.validate(session)?;
    for component in 0..matrix.cols {
        let (pixels, values) = matrix.column(component);
        let entries: Vec<(usize, f32)> = pixels
            .iter()
            .zip(values)
            .map(|(&pixel, &value)| {
                let row = pixel % fov_height;
                let col = pixel / fov_height;
                (row * fov_width + col, value)
            })
            .collect();
        footprints.push_row_flat(entries)?;
    }
    Ok(())
}

/// Session FOV image from the record's background component: Fortran pixel
/// order maps directly onto a column-major matrix fill.
pub fn fov_image(session: usize, record: &CaimanSession) -> Result<DMatrix<f32>, ImportError> {
    let (fov_height, fov_width) = record.dims;
    let background = record
        .background
        .as_ref()
        .ok_or(ImportError::MissingFovImage { session })?;
    if background.len() != fov_height * fov_width {
        return Err(ImportError::ImageShapeMismatch {
            height: fov_height,
            width: fov_width,
            len: background.len(),
        });
    }
    Ok(DMatrix::from_vec(fov_height, fov_width, background.clone()))
}
