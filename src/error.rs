use std::path::PathBuf;

use thiserror::Error;

/// Pipeline stage that produced a recoverable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Matte,
    Refine,
    Unmix,
    Composite,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Matte => write!(f, "matte"),
            Self::Refine => write!(f, "refine"),
            Self::Unmix => write!(f, "unmix"),
            Self::Composite => write!(f, "composite"),
        }
    }
}

/// Error type for chroma-key operations
///
/// Variants fall into three groups: input errors (`Io`, `Decode`,
/// `EmptyImage`) which abort a run, recoverable errors (`Backend`, `Stage`,
/// `DimensionMismatch`) which route the run to the fallback path, and
/// caller errors (`InvalidParameter`, `Encode`).
#[derive(Debug, Error)]
pub enum ChromaKeyError {
    /// The input file could not be read or the output could not be written
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input bytes are not a decodable raster
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// The output raster could not be encoded
    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    /// The input has a zero width or height
    #[error("Image dimensions must be non-zero, got {width}x{height}")]
    EmptyImage { width: u32, height: u32 },

    /// Image and matte dimensions do not match
    #[error("Image and matte dimensions do not match: expected {expected:?}, actual {actual:?}")]
    DimensionMismatch {
        /// Expected dimensions (width, height)
        expected: (u32, u32),
        /// Actual dimensions (width, height)
        actual: (u32, u32),
    },

    /// Invalid parameter provided to the operation
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The raster backend failed while a stage was delegating to it
    #[error("Raster backend failed during {stage}: {source}")]
    Backend {
        stage: Stage,
        #[source]
        source: BackendError,
    },

    /// A stage produced an unusable result
    #[error("Stage {stage} failed: {reason}")]
    Stage { stage: Stage, reason: String },
}

impl ChromaKeyError {
    /// Returns `true` for errors where there is nothing to process.
    ///
    /// Only these abort a run; every other error downgrades it to the
    /// fallback path.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Decode(_) | Self::EmptyImage { .. }
        )
    }

    pub(crate) fn backend(stage: Stage) -> impl Fn(BackendError) -> Self + Copy {
        move |source| Self::Backend { stage, source }
    }
}

/// Error type for raster backends
///
/// `Unavailable` and `Rejected` are kept apart so callers can tell a
/// missing tool from a tool that refused the input.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend program could not be started at all
    #[error("Raster tool `{program}` is not installed or not on PATH")]
    Unavailable { program: String },

    /// The backend ran but exited unsuccessfully
    #[error("Raster tool `{program}` rejected the input (exit status {status:?}): {stderr}")]
    Rejected {
        program: String,
        status: Option<i32>,
        stderr: String,
    },

    /// Temporary file handling failed
    #[error("Backend I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend produced a raster that could not be read back
    #[error("Backend produced an unreadable raster: {0}")]
    Image(#[from] image::ImageError),

    /// A parameter the backend cannot honour
    #[error("Invalid backend parameter: {0}")]
    InvalidParameter(String),
}

/// Error type for key color parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyColorError {
    /// The string is not a `#RRGGBB` / `RRGGBB` hex triple
    #[error("Invalid key color `{0}`: expected a hex triple such as #00FF00")]
    InvalidHex(String),
}
