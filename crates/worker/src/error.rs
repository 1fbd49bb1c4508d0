use ninja_core::types::DbId;

use crate::clients::ClientError;

/// Failure talking to the job or lead store.
///
/// Always an infrastructure problem from the dispatcher's point of view.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The referenced row does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    /// The store could not be reached or refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Error escaping a handler's `run`.
///
/// The dispatcher converts any of these into a failed job whose `error`
/// column carries the `Display` text.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Missing credential, missing campaign, malformed config.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The job or lead store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An external service call failed.
    #[error(transparent)]
    External(#[from] ClientError),

    /// Anything else, with a human-readable message.
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for handler return values.
pub type HandlerResult<T> = Result<T, HandlerError>;
