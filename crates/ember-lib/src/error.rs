use std::path::PathBuf;
use thiserror::Error;

/// Failure kinds callers can distinguish by downcasting the `anyhow` chain.
///
/// Transient transport errors stay as plain `reqwest`/`io` errors inside the
/// chain; these variants mark the decisions the pipeline makes about them.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("java executable unusable: {0}")]
    JavaUnavailable(String),

    #[error("version {0} not found locally or in the remote manifest")]
    VersionUnresolvable(String),

    #[error("download failed after retries: {url}")]
    FetchFailed { url: String },

    #[error("sha1 mismatch for {path:?}: expected {expected}, got {actual}")]
    HashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("installer exited with status {0}")]
    InstallerFailed(i32),

    #[error("invalid maven coordinate: {0}")]
    InvalidCoordinate(String),
}
