use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Raised when a tick leaves the session in a state that must never exist.
/// The owning task halts the session instead of continuing.
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("invariant violated: {0}")]
    Invariant(String),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Error, PartialEq)]
pub enum SnapshotError {
    #[error("snapshot version {found} does not match {expected}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("delta is based on tick {delta_base}, snapshot is at tick {snapshot_tick}")]
    BaseTickMismatch { delta_base: u64, snapshot_tick: u64 },
}
