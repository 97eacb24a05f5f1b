//! Unified infrastructure error type.

use thiserror::Error;

/// The error type returned by tollgate's fallible startup and serving operations.
///
/// Request-level problems (401, 400, 404, etc.) are [`Failure`](crate::Failure)
/// values that the pipeline turns into error responses. This type surfaces
/// infrastructure failures: bad configuration, binding to a port, accepting
/// a connection.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(String),
}
