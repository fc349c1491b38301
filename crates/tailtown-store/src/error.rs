use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one document but found none.
    #[error("Record not found")]
    NotFound,

    /// An authorization rule rejected the write.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Email/password pair does not match any account.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// A uniqueness constraint on a natural key was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// JSON column could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Password hashing failed.
    #[error("Password hash error: {0}")]
    PasswordHash(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Map "no rows" to [`StoreError::NotFound`] and everything else to
/// [`StoreError::Sqlite`].
pub(crate) fn not_found(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}

/// Turn `Err(NotFound)` into `Ok(None)`.
pub(crate) trait OptionalNotFound<T> {
    fn optional_not_found(self) -> Result<Option<T>>;
}

impl<T> OptionalNotFound<T> for Result<T> {
    fn optional_not_found(self) -> Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
