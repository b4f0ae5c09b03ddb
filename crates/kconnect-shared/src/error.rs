use thiserror::Error;

/// Errors raised when turning loosely-typed profile data into domain enums.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Unknown gender: {0}")]
    UnknownGender(String),

    #[error("Unknown presence status: {0}")]
    UnknownStatus(String),
}
