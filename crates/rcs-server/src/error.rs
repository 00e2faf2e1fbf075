//! Error types for resource objects.

use rcs_protocol::CodecError;
use thiserror::Error;

use crate::platform::PlatformError;

/// Errors raised by resource objects, their builders and the dispatcher.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// An argument violates a resource invariant.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Attributes were accessed without holding the resource lock.
    #[error("Attributes accessed without holding the resource lock")]
    NoLock,

    /// Attributes were accessed again from inside `with_attributes`.
    #[error("Attributes accessed from inside an attribute closure")]
    ReentrantAccess,

    /// The request cannot be served in its current state.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The platform reported a failure.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// A payload could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl ResourceError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ResourceError::InvalidParameter(msg.into())
    }

    pub(crate) fn bad_request(msg: impl Into<String>) -> Self {
        ResourceError::BadRequest(msg.into())
    }
}
