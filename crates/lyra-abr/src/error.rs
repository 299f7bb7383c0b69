use thiserror::Error;

use crate::RequestId;

/// Inconsistencies in the request lifecycle reported to a chooser.
///
/// None of them is fatal: the chooser keeps its state untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AbrError {
    #[error("request {0} is already pending")]
    DuplicateRequest(RequestId),

    #[error("request {0} is not pending")]
    UnknownRequest(RequestId),
}

pub type AbrResult<T> = Result<T, AbrError>;
