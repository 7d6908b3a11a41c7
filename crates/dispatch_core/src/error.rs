//! Crate-wide error taxonomy.

use thiserror::Error;

use crate::domain::RideStatus;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// No caller identity at all.
    #[error("caller identity is missing")]
    Unauthenticated,

    /// Caller is known but not a participant, or the wrong role for the
    /// action.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// The lifecycle table does not allow this move.
    #[error("invalid transition: '{from}' -> '{to}'")]
    InvalidTransition { from: RideStatus, to: RideStatus },

    /// Input or entity state fails an operation-specific precondition
    /// (non-searching ride handed to the matcher, OTP mismatch, ...).
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("storage failure: {0}")]
    Store(#[from] StoreError),

    /// A conditional update did not apply because the row changed under us.
    /// The matching path treats this as "did not win", not as a failure.
    #[error("concurrent update changed the row first")]
    RaceLost,
}

pub type DispatchResult<T> = Result<T, DispatchError>;
