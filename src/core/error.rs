use std::path::{Path, PathBuf};
use thiserror::Error;

/// Central error type for the bootstrapper.
/// Every module returns `Result<T, BootstrapError>`.
#[derive(Debug, Error)]
pub enum BootstrapError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Not enough disk space at {path:?}")]
    DiskFull { path: PathBuf },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request to {url} failed: HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Deployment removed: {url} no longer exists")]
    NotFound { url: String },

    #[error("Malformed response: {0}")]
    Protocol(String),

    // ── Integrity ───────────────────────────────────────
    #[error("Checksum mismatch for {package}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        package: String,
        expected: String,
        actual: String,
    },

    #[error("Archive {package} has an entry escaping its destination: {entry}")]
    PathTraversal { package: String, entry: String },

    // ── State ───────────────────────────────────────────
    #[error("Install state at {path:?} is unreadable, delete it to recover: {source}")]
    CorruptState {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid settings: {0}")]
    Config(String),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type BootstrapResult<T> = Result<T, BootstrapError>;

impl BootstrapError {
    /// Wraps an I/O failure on `path`, promoting "storage full" to `DiskFull`.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        if source.kind() == std::io::ErrorKind::StorageFull {
            return BootstrapError::DiskFull { path };
        }
        BootstrapError::Io { path, source }
    }

    /// Transient failures the caller may retry as a whole.
    pub fn is_retryable(&self) -> bool {
        match self {
            BootstrapError::Http(_) => true,
            BootstrapError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<std::io::Error> for BootstrapError {
    fn from(source: std::io::Error) -> Self {
        BootstrapError::io(PathBuf::new(), source)
    }
}
