use std::path::PathBuf;

use thiserror::Error;

use roicore::algorithm::centering::CenteringError;
use roicore::algorithm::centroid::CentroidError;
use roicore::data::footprint::FootprintError;

/// Errors raised during dataset import. All of them are fatal for the
/// affected import call; there is no per-ROI skip-and-continue.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("path does not exist: {0}")]
    MissingPath(PathBuf),
    #[error("failed to read record file {path}: {source}")]
    RecordRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse record file {path}: {source}")]
    RecordParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no sessions to import")]
    NoSessions,
    #[error("only valid conventions are \"new\" or \"old\", got \"{0}\"")]
    UnknownConvention(String),
    #[error("only valid mean image keys are \"meanImgE\" or \"meanImg\", got \"{0}\"")]
    UnknownMeanImage(String),
    #[error("session {session}: legacy suite2p indexing requires an ops record")]
    MissingOps { session: usize },
    #[error("session {session}: no fov image source, provide images or records carrying one")]
    MissingFovImage { session: usize },
    #[error("session {session}: fov is {height}x{width}, expected {expected_height}x{expected_width}")]
    FovMismatch {
        session: usize,
        height: usize,
        width: usize,
        expected_height: usize,
        expected_width: usize,
    },
    #[error("{got} fov images provided for {expected} sessions")]
    ImageCountMismatch { expected: usize, got: usize },
    #[error("image plane of {height}x{width} does not match its {len} data values")]
    ImageShapeMismatch {
        height: usize,
        width: usize,
        len: usize,
    },
    #[error("{got} labels provided for {expected} rois")]
    LabelCountMismatch { expected: usize, got: usize },
    #[error("session {session}: malformed csc component matrix: {reason}")]
    MalformedCsc { session: usize, reason: String },
    #[error("session {session}: {got} component quality scores for {expected} components")]
    ComponentCountMismatch {
        session: usize,
        expected: usize,
        got: usize,
    },
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
    #[error(transparent)]
    Footprint(#[from] FootprintError),
    #[error(transparent)]
    Centroid(#[from] CentroidError),
    #[error(transparent)]
    Centering(#[from] CenteringError),
}
