use thiserror::Error;

/// Parse failures for the closed string enums in [`crate::types`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown role: {0}")]
    Role(String),

    #[error("Unknown pet type: {0}")]
    PetType(String),

    #[error("Unknown listing status: {0}")]
    ListingStatus(String),
}
