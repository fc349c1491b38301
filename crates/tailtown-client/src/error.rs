use tailtown_store::StoreError;
use thiserror::Error;

/// Errors surfaced by client operations.
///
/// Nothing here is retried automatically; the caller decides whether to let
/// the user try again.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Malformed or missing caller input, detected before any I/O.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The referenced document does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The store's authorization rules rejected the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The operation needs a signed-in user.
    #[error("Not signed in")]
    NotSignedIn,

    /// Any other store failure.
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Runtime failure around a store call (poisoned lock, cancelled task).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ClientError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ClientError::NotFound("record not found".to_string()),
            StoreError::PermissionDenied(reason) => ClientError::PermissionDenied(reason),
            StoreError::InvalidCredentials => {
                ClientError::PermissionDenied("Invalid email or password".to_string())
            }
            StoreError::Conflict(reason) => ClientError::InvalidArgument(reason),
            other => ClientError::Store(other),
        }
    }
}

impl ClientError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ClientError::InvalidArgument(msg.into())
    }

    /// Replace the generic message of a `NotFound` with a specific one.
    pub(crate) fn with_not_found(self, msg: impl Into<String>) -> Self {
        match self {
            ClientError::NotFound(_) => ClientError::NotFound(msg.into()),
            other => other,
        }
    }
}
