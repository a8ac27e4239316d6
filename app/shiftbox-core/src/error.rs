//! Error types for the core layer.

use shiftbox_error::CommonError;
use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Common errors (I/O, config, not found, etc.).
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Machine driver error.
    #[error("machine error: {0}")]
    Machine(String),

    /// A mutating lifecycle operation was requested while a start is in
    /// flight.
    #[error("cluster is busy")]
    Busy,

    /// A mutating lifecycle operation was requested while a stop or delete
    /// is in flight.
    #[error("cluster is stopping or deleting")]
    StoppingOrDeleting,

    /// An in-flight start did not unwind within the cancellation grace
    /// period.
    #[error("cannot abort startup sequence quickly enough")]
    CancelTimeout,

    /// The start operation was canceled before the cluster came up.
    #[error("cluster start canceled")]
    Canceled,
}

impl CoreError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Common(CommonError::config(msg))
    }

    /// Creates a new not found error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::Common(CommonError::not_found(resource))
    }

    /// Creates a new machine driver error.
    #[must_use]
    pub fn machine(msg: impl Into<String>) -> Self {
        Self::Machine(msg.into())
    }

    /// Returns true if this error rejects a conflicting lifecycle request
    /// without having changed any state.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::Busy | Self::StoppingOrDeleting | Self::CancelTimeout
        )
    }
}

// Allow automatic conversion from std::io::Error to CoreError via CommonError.
impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Common(CommonError::from(err))
    }
}
