use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use nalgebra::DMatrix;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::data::utility::{check_paths_exist, fix_paths};
use crate::error::ImportError;

/// Dense row-major image plane as delivered by a source-record reader.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImagePlane {
    pub height: usize,
    pub width: usize,
    pub data: Vec<f32>,
}

impl ImagePlane {
    pub fn to_matrix(&self) -> Result<DMatrix<f32>, ImportError> {
        if self.data.len() != self.height * self.width {
            return Err(ImportError::ImageShapeMismatch {
                height: self.height,
                width: self.width,
                len: self.data.len(),
            });
        }
        Ok(DMatrix::from_row_slice(self.height, self.width, &self.data))
    }
}

/// One suite2p ROI record: parallel row pixel indices (`ypix`), column
/// pixel indices (`xpix`) and weights (`lam`), using the stat-file field
/// names.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Suite2pRoi {
    pub ypix: Vec<i64>,
    pub xpix: Vec<i64>,
    pub lam: Vec<f32>,
}

/// Auxiliary suite2p ops record: valid pixel ranges of the registered
/// subregion plus the session mean images.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Suite2pOps {
    pub yrange: (i64, i64),
    pub xrange: (i64, i64),
    pub mean_img: Option<ImagePlane>,
    pub mean_img_enhanced: Option<ImagePlane>,
}

/// One decoded suite2p session: the ROI records of a stat file plus the
/// optional ops record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Suite2pSession {
    pub rois: Vec<Suite2pRoi>,
    pub ops: Option<Suite2pOps>,
}

impl Suite2pSession {
    pub fn from_json(path: &Path) -> Result<Self, ImportError> {
        read_json(path)
    }
}

/// Column-compressed sparse matrix as stored in CaImAn results: shape
/// `(rows, cols)`, scipy-style `indptr`/`indices`/`data` members. For the
/// spatial component matrix, `rows` is the Fortran-flattened pixel count
/// `fov_height * fov_width` and each column is one component.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CscMatrix {
    pub rows: usize,
    pub cols: usize,
    pub indptr: Vec<usize>,
    pub indices: Vec<usize>,
    pub data: Vec<f32>,
}

impl CscMatrix {
    /// Structural validation; `session` is only used for error context.
    pub fn validate(&self, session: usize) -> Result<(), ImportError> {
        let malformed = |reason: String| ImportError::MalformedCsc { session, reason };
        if self.indptr.len() != self.cols + 1 {
            return Err(malformed(format!(
                "indptr has {} entries for {} columns",
                self.indptr.len(),
                self.cols
            )));
        }
        if self.indptr[0] != 0 || *self.indptr.last().unwrap() != self.data.len() {
            return Err(malformed("indptr does not span the data vector".to_string()));
        }
        if self.indptr.windows(2).any(|w| w[1] < w[0]) {
            return Err(malformed("indptr is not monotone".to_string()));
        }
        if self.indices.len() != self.data.len() {
            return Err(malformed(format!(
                "{} indices for {} data values",
                self.indices.len(),
                self.data.len()
            )));
        }
        if let Some(&index) = self.indices.iter().find(|&&index| index >= self.rows) {
            return Err(malformed(format!(
                "pixel index {} out of range for {} rows",
                index, self.rows
            )));
        }
        Ok(())
    }

    /// Pixel indices and values of one column.
    pub fn column(&self, col: usize) -> (&[usize], &[f32]) {
        let start = self.indptr[col];
        let end = self.indptr[col + 1];
        (&self.indices[start..end], &self.data[start..end])
    }
}

/// One decoded CaImAn session record.
///
/// `spatial` holds the included components, `discarded` the components
/// CaImAn rejected. `cnn_preds` are the per-component quality predictions,
/// parallel to the columns of the respective matrix. `background` is the
/// first background component, `fov_height * fov_width` values in Fortran
/// pixel order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaimanSession {
    pub dims: (usize, usize),
    pub spatial: CscMatrix,
    pub discarded: Option<CscMatrix>,
    pub cnn_preds: Vec<f32>,
    pub discarded_cnn_preds: Option<Vec<f32>>,
    pub background: Option<Vec<f32>>,
}

impl CaimanSession {
    pub fn from_json(path: &Path) -> Result<Self, ImportError> {
        read_json(path)
    }
}

/// Decoded source records of a whole dataset, one variant per toolchain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SessionRecords {
    Suite2p(Vec<Suite2pSession>),
    Caiman(Vec<CaimanSession>),
}

impl SessionRecords {
    pub fn n_sessions(&self) -> usize {
        match self {
            SessionRecords::Suite2p(sessions) => sessions.len(),
            SessionRecords::Caiman(sessions) => sessions.len(),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ImportError> {
    let file = File::open(path).map_err(|source| ImportError::RecordRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| ImportError::RecordParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads decoded suite2p session records from JSON files, validating all
/// paths before reading any of them.
pub fn load_suite2p_sessions<I, P>(paths: I) -> Result<Vec<Suite2pSession>, ImportError>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let paths = fix_paths(paths);
    check_paths_exist(&paths)?;
    paths.iter().map(|path| Suite2pSession::from_json(path)).collect()
}

/// Loads decoded CaImAn session records from JSON files, validating all
/// paths before reading any of them.
pub fn load_caiman_sessions<I, P>(paths: I) -> Result<Vec<CaimanSession>, ImportError>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let paths = fix_paths(paths);
    check_paths_exist(&paths)?;
    paths.iter().map(|path| CaimanSession::from_json(path)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_plane_round_trip() {
        let plane = ImagePlane {
            height: 2,
            width: 3,
            data: vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
        };
        let matrix = plane.to_matrix().unwrap();
        assert_eq!(matrix[(0, 2)], 2.0);
        assert_eq!(matrix[(1, 0)], 3.0);
    }

    #[test]
    fn test_image_plane_shape_mismatch() {
        let plane = ImagePlane {
            height: 2,
            width: 3,
            data: vec![0.0; 5],
        };
        assert!(matches!(
            plane.to_matrix().unwrap_err(),
            ImportError::ImageShapeMismatch { len: 5, .. }
        ));
    }

    #[test]
    fn test_csc_validation_catches_bad_shapes() {
        let matrix = CscMatrix {
            rows: 4,
            cols: 2,
            indptr: vec![0, 1],
            indices: vec![0],
            data: vec![1.0],
        };
        assert!(matches!(
            matrix.validate(0).unwrap_err(),
            ImportError::MalformedCsc { session: 0, .. }
        ));

        let matrix = CscMatrix {
            rows: 4,
            cols: 1,
            indptr: vec![0, 1],
            indices: vec![9],
            data: vec![1.0],
        };
        assert!(matches!(
            matrix.validate(3).unwrap_err(),
            ImportError::MalformedCsc { session: 3, .. }
        ));
    }

    #[test]
    fn test_csc_column_access() {
        let matrix = CscMatrix {
            rows: 6,
            cols: 2,
            indptr: vec![0, 2, 3],
            indices: vec![1, 4, 5],
            data: vec![0.5, 0.5, 1.0],
        };
        matrix.validate(0).unwrap();
        assert_eq!(matrix.column(0), (&[1usize, 4][..], &[0.5f32, 0.5][..]));
        assert_eq!(matrix.column(1), (&[5usize][..], &[1.0f32][..]));
    }

    #[test]
    fn test_missing_record_path_is_fatal_before_reading() {
        let err = load_suite2p_sessions(["/nonexistent/stat.json"]).unwrap_err();
        assert!(matches!(err, ImportError::MissingPath(_)));
    }
}
