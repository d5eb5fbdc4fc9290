use std::ops::Range;
use std::path::PathBuf;

use thiserror::Error;

/// Pipeline stage that dispatched work to the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scan,
    Refine,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Scan => write!(f, "zchi2 scan"),
            Stage::Refine => write!(f, "minima refinement"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ZfindError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unknown redshift range to use for template type '{0}'")]
    UnknownSpectralType(String),

    #[error("Invalid template file '{}': {message}", path.display())]
    InvalidTemplate { path: PathBuf, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("{stage} failed for template {template} (targets {}..{}): {source}", targets.start, targets.end)]
    WorkerFailure {
        stage: Stage,
        template: String,
        targets: Range<usize>,
        #[source]
        source: Box<ZfindError>,
    },

    #[error("Storage error at '{path}': {message}")]
    Storage { path: String, message: String },

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ZfindError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ZfindError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn storage(path: impl Into<String>, message: impl Into<String>) -> Self {
        ZfindError::Storage {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid_template(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ZfindError::InvalidTemplate {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Process exit code used by the `rrz` binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            ZfindError::InvalidArgument(_) => 2,
            ZfindError::NotFound(_)
            | ZfindError::UnknownSpectralType(_)
            | ZfindError::InvalidTemplate { .. } => 3,
            ZfindError::Engine(_) | ZfindError::WorkerFailure { .. } => 4,
            ZfindError::Storage { .. } | ZfindError::Io { .. } => 5,
        }
    }
}
