//! Error types for logfortress.

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in logfortress.
///
/// Failures that happen while a log stream is already flowing are not
/// represented here; they reach the consumer as a terminal
/// [`StreamLine::Notice`](crate::StreamLine::Notice).
#[derive(Debug, Error)]
pub enum Error {
    /// The persisted registry could not be read or decoded.
    #[error("failed to read custom log sources: {0}")]
    PersistenceRead(String),

    /// The registry could not be written.
    #[error("failed to save custom log sources: {0}")]
    PersistenceWrite(String),

    /// No container matches the given name or ID.
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// The container runtime cannot be reached at all.
    #[error("docker daemon is not running or cannot be reached: {0}")]
    ControlPlaneUnreachable(String),

    /// The container runtime answered with an error.
    #[error("docker error: {0}")]
    ControlPlane(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),
}
