use crate::model::ModelError;
use thiserror::Error;

/// Errors that end a request abnormally.
///
/// Tool failures are not here: they are recorded in history for the model
/// to handle.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The language model call itself could not be completed.
    #[error("model gateway failed: {0}")]
    Gateway(#[from] ModelError),

    /// The caller aborted the request.
    #[error("request cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
