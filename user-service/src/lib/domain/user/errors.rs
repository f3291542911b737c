use thiserror::Error;

/// Error for UserId parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UserIdError {
    #[error("User ID is empty")]
    Empty,

    #[error("User ID too long: maximum {max} characters, got {actual}")]
    TooLong { max: usize, actual: usize },

    #[error("User ID contains whitespace or '/'")]
    InvalidCharacters,
}

/// Error for EmailAddress validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("Invalid email format: {0}")]
    InvalidFormat(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoleError {
    #[error("Unknown role: {0}")]
    Unknown(String),
}

/// Verified token whose claims do not describe a usable principal
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("Invalid subject: {0}")]
    Subject(#[from] UserIdError),

    #[error("Invalid role: {0}")]
    Role(#[from] RoleError),
}

/// Error for cache backend operations.
///
/// Never surfaced to callers of the user service.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Cache connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Cache command failed: {0}")]
    CommandFailed(String),

    #[error("Cache entry could not be encoded: {0}")]
    Serialization(String),

    #[error("Cache call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Top-level error for all user-related operations
#[derive(Debug, Clone, Error)]
pub enum UserError {
    // Value object validation errors (automatically converted via #[from])
    #[error("Invalid user ID: {0}")]
    InvalidUserId(#[from] UserIdError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    // Domain-level errors
    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Email already exists: {0}")]
    EmailAlreadyExists(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Permission is not granted to modify user {0}")]
    Forbidden(String),

    // Infrastructure errors
    #[error("Store operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
