use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use roicore::algorithm::centering::center_rois;
use roicore::algorithm::centroid::{compute_centroids, Centroid, CentroidMethod};
use roicore::data::footprint::{SpatialFootprints, WeightDtype};
use roicore::data::session::{normalize_fov_image, Session};

use crate::data::caiman;
use crate::data::caiman::CaimanMeta;
use crate::data::records::{ImagePlane, SessionRecords};
use crate::data::suite2p;
use crate::data::suite2p::{IndexingConvention, MeanImageKind};
use crate::data::utility::{parallel_map, Workers};
use crate::error::ImportError;
use crate::reporter::{LogReporter, Reporter};

/// Import parameters. Defaults match the upstream toolchain conventions:
/// 36x36 output patches, weighted-mean centroids, float weights, all
/// available workers.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ImportConfig {
    pub out_height_width: (usize, usize),
    pub centroid_method: CentroidMethod,
    pub workers: Workers,
    pub dtype: WeightDtype,
    pub um_per_pixel: f64,
    pub mean_image: MeanImageKind,
    pub convention: IndexingConvention,
    pub include_discarded: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            out_height_width: (36, 36),
            centroid_method: CentroidMethod::Centroid,
            workers: Workers::All,
            dtype: WeightDtype::F32,
            um_per_pixel: 1.0,
            mean_image: MeanImageKind::Enhanced,
            convention: IndexingConvention::New,
            include_discarded: true,
        }
    }
}

/// The complete normalized in-memory dataset: one entry per session in
/// input order, plus the concatenated ROI bookkeeping.
///
/// Owns every derived array exclusively; sessions are value objects with no
/// back-reference. Invariant: `n_roi` sums to `n_roi_total`, which equals
/// the number of rows of `session_membership`.
#[derive(Clone, Debug)]
pub struct RoiDataset {
    pub sessions: Vec<Session>,
    pub footprints: Vec<SpatialFootprints>,
    pub centroids: Vec<Vec<Centroid>>,
    pub roi_images: Vec<Vec<DMatrix<f32>>>,
    pub session_membership: DMatrix<bool>,
    pub n_roi: Vec<usize>,
    pub n_roi_total: usize,
    pub um_per_pixel: f64,
    pub labels: Option<Vec<i64>>,
    pub caiman_meta: Option<Vec<CaimanMeta>>,
}

impl RoiDataset {
    /// Imports decoded session records into the canonical representation.
    ///
    /// # Arguments
    ///
    /// * `records` - decoded source records, one variant per toolchain.
    /// * `fov_images` - externally supplied FOV images; when present they
    ///   bypass record-based FOV extraction and are used unnormalized.
    /// * `labels` - optional per-session integer label sequences,
    ///   concatenated and squeezed onto a dense zero-based space.
    /// * `config` - import parameters.
    /// * `reporter` - progress observer.
    ///
    /// Footprint construction runs one task per session through the worker
    /// pool; centroids and centered images are derived sequentially
    /// afterwards. Output order always matches input session order.
    pub fn import(
        records: &SessionRecords,
        fov_images: Option<&[ImagePlane]>,
        labels: Option<&[Vec<i64>]>,
        config: &ImportConfig,
        reporter: &dyn Reporter,
    ) -> Result<RoiDataset, ImportError> {
        if records.n_sessions() == 0 {
            return Err(ImportError::NoSessions);
        }
        let fov = resolve_fov_images(records, fov_images, config)?;
        let fov_height = fov[0].nrows();
        let fov_width = fov[0].ncols();

        reporter.event(&format!(
            "importing spatial footprints from {} sessions",
            records.n_sessions()
        ));
        let (footprints, caiman_meta) = match records {
            SessionRecords::Suite2p(sessions) => {
                let footprints = parallel_map(sessions, config.workers, reporter, |index, record| {
                    suite2p::build_footprints(
                        index,
                        record,
                        fov_height,
                        fov_width,
                        config.dtype,
                        config.convention,
                    )
                })?;
                (footprints, None)
            }
            SessionRecords::Caiman(sessions) => {
                let decoded = parallel_map(sessions, config.workers, reporter, |index, record| {
                    caiman::build_footprints(index, record, config.include_discarded)
                })?;
                let (footprints, meta): (Vec<_>, Vec<_>) = decoded.into_iter().unzip();
                (footprints, Some(meta))
            }
        };

        Self::assemble(footprints, fov, caiman_meta, labels, config, reporter)
    }

    /// Assembles a dataset from externally built footprints and FOV images,
    /// running the same derivation stages and invariant checks as a full
    /// import. Escape hatch for custom segmentation sources.
    pub fn from_parts(
        footprints: Vec<SpatialFootprints>,
        fov_images: Vec<DMatrix<f32>>,
        config: &ImportConfig,
        reporter: &dyn Reporter,
    ) -> Result<RoiDataset, ImportError> {
        Self::assemble(footprints, fov_images, None, None, config, reporter)
    }

    fn assemble(
        footprints: Vec<SpatialFootprints>,
        fov: Vec<DMatrix<f32>>,
        caiman_meta: Option<Vec<CaimanMeta>>,
        labels: Option<&[Vec<i64>]>,
        config: &ImportConfig,
        reporter: &dyn Reporter,
    ) -> Result<RoiDataset, ImportError> {
        if footprints.is_empty() {
            return Err(ImportError::NoSessions);
        }
        if footprints.len() != fov.len() {
            return Err(ImportError::ImageCountMismatch {
                expected: footprints.len(),
                got: fov.len(),
            });
        }
        // one shared fov grid across the dataset
        let fov_height = fov[0].nrows();
        let fov_width = fov[0].ncols();
        for (session, (sf, image)) in footprints.iter().zip(&fov).enumerate() {
            if image.nrows() != fov_height || image.ncols() != fov_width {
                return Err(ImportError::FovMismatch {
                    session,
                    height: image.nrows(),
                    width: image.ncols(),
                    expected_height: fov_height,
                    expected_width: fov_width,
                });
            }
            if sf.fov_height != fov_height || sf.fov_width != fov_width {
                return Err(ImportError::FovMismatch {
                    session,
                    height: sf.fov_height,
                    width: sf.fov_width,
                    expected_height: fov_height,
                    expected_width: fov_width,
                });
            }
        }

        let n_roi: Vec<usize> = footprints.iter().map(|sf| sf.n_rois()).collect();
        let n_roi_total: usize = n_roi.iter().sum();
        reporter.event(&format!(
            "imported {} rois across {} sessions ({:?} per session)",
            n_roi_total,
            footprints.len(),
            n_roi
        ));

        reporter.event("computing centroids from spatial footprints");
        let centroids: Vec<Vec<Centroid>> = footprints
            .iter()
            .map(|sf| compute_centroids(sf, config.centroid_method))
            .collect::<Result<_, _>>()?;

        reporter.event("computing roi centered images from spatial footprints");
        let (out_height, out_width) = config.out_height_width;
        let roi_images: Vec<Vec<DMatrix<f32>>> = footprints
            .iter()
            .zip(&centroids)
            .map(|(sf, centroids)| center_rois(sf, centroids, out_height, out_width))
            .collect::<Result<_, _>>()?;

        let session_membership = build_session_membership(&n_roi);

        let labels = match labels {
            Some(per_session) => {
                let concatenated: Vec<i64> = per_session.iter().flatten().copied().collect();
                if concatenated.len() != n_roi_total {
                    return Err(ImportError::LabelCountMismatch {
                        expected: n_roi_total,
                        got: concatenated.len(),
                    });
                }
                Some(crate::data::utility::squeeze_labels(&concatenated))
            }
            None => None,
        };

        let sessions: Vec<Session> = fov
            .into_iter()
            .zip(&n_roi)
            .map(|(image, &count)| Session::new(image, count))
            .collect();

        Ok(RoiDataset {
            sessions,
            footprints,
            centroids,
            roi_images,
            session_membership,
            n_roi,
            n_roi_total,
            um_per_pixel: config.um_per_pixel,
            labels,
            caiman_meta,
        })
    }

    /// Height of the shared FOV grid.
    pub fn fov_height(&self) -> usize {
        self.sessions[0].fov_height
    }

    /// Width of the shared FOV grid.
    pub fn fov_width(&self) -> usize {
        self.sessions[0].fov_width
    }

    /// Imports with the default log-backed reporter.
    pub fn import_logged(
        records: &SessionRecords,
        fov_images: Option<&[ImagePlane]>,
        labels: Option<&[Vec<i64>]>,
        config: &ImportConfig,
    ) -> Result<RoiDataset, ImportError> {
        Self::import(records, fov_images, labels, config, &LogReporter)
    }
}

/// ROI to session membership: for each session `i`, `n_rois[i]` repeated
/// one-hot rows at column `i`, concatenated in session order.
pub fn build_session_membership(n_rois: &[usize]) -> DMatrix<bool> {
    let total: usize = n_rois.iter().sum();
    let mut membership = DMatrix::from_element(total, n_rois.len(), false);
    let mut row = 0;
    for (session, &count) in n_rois.iter().enumerate() {
        for _ in 0..count {
            membership[(row, session)] = true;
            row += 1;
        }
    }
    membership
}

fn resolve_fov_images(
    records: &SessionRecords,
    fov_images: Option<&[ImagePlane]>,
    config: &ImportConfig,
) -> Result<Vec<DMatrix<f32>>, ImportError> {
    let n_sessions = records.n_sessions();
    if let Some(planes) = fov_images {
        if planes.len() != n_sessions {
            return Err(ImportError::ImageCountMismatch {
                expected: n_sessions,
                got: planes.len(),
            });
        }
        // supplied images bypass record extraction and normalization
        return planes.iter().map(|plane| plane.to_matrix()).collect();
    }
    match records {
        SessionRecords::Suite2p(sessions) => sessions
            .iter()
            .enumerate()
            .map(|(index, record)| {
                suite2p::fov_image(index, record, config.mean_image)
                    .map(|image| normalize_fov_image(&image))
            })
            .collect(),
        SessionRecords::Caiman(sessions) => sessions
            .iter()
            .enumerate()
            .map(|(index, record)| {
                caiman::fov_image(index, record).map(|image| normalize_fov_image(&image))
            })
            .collect(),
    }
}
