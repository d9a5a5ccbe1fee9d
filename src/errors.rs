use hyper::StatusCode;
use thiserror::Error;

use crate::{sys_access::core::PatternError, sys_fsx::core::FsError};

#[derive(Debug, Error)]
pub enum StartupError {
    /// A hide, deny, or index pattern failed to compile
    #[error(transparent)]
    InvalidPattern(#[from] PatternError),

    /// The serve root is missing or unreadable
    #[error("Invalid root directory {path:?}: {source}")]
    InvalidRoot {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid listen address {0:?}")]
    InvalidAddr(String),

    /// Any other IO error, with a description of what was attempted
    #[error("{0}\ncaused by: {1}")]
    IoError(String, std::io::Error),

    #[error("Server error: {0}")]
    Server(#[from] hyper::Error),
}

/// Request-level failure, translated once into a status and an HTML error page.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ServeError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn io(op: &str, path: &str, err: std::io::Error) -> Self {
        Self::Internal(format!("{op} {path}: {err}"))
    }
}

impl From<FsError> for ServeError {
    fn from(err: FsError) -> Self {
        let msg = err.to_string();
        match err {
            FsError::NotExist { .. } => Self::NotFound(msg),
            FsError::PermissionDenied { .. } => Self::Forbidden(msg),
            FsError::Invalid { .. } | FsError::Unsupported { .. } => Self::BadRequest(msg),
            FsError::Exists { .. } | FsError::Internal { .. } => Self::Internal(msg),
        }
    }
}
