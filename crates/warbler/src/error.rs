//! Error types for account store operations.

use std::fmt;

use thiserror::Error;

/// Result type for account store operations.
pub type WarblerResult<T> = Result<T, WarblerError>;

/// A unique key that a write collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateField {
    Username,
    Email,
    /// The follow edge already exists.
    Follow,
    /// The like already exists.
    Like,
}

impl fmt::Display for DuplicateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateField::Username => write!(f, "username"),
            DuplicateField::Email => write!(f, "email"),
            DuplicateField::Follow => write!(f, "follow"),
            DuplicateField::Like => write!(f, "like"),
        }
    }
}

/// Errors that can occur in the account store.
#[derive(Debug, Error)]
pub enum WarblerError {
    /// A uniqueness constraint rejected the write.
    #[error("integrity error: duplicate {0}")]
    Conflict(DuplicateField),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("message not found: {0}")]
    MessageNotFound(i64),

    /// Input rejected before touching storage.
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("users cannot follow themselves")]
    SelfFollow,

    /// Credentials were required as a precondition and did not match.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("password hashing failed: {0}")]
    Password(#[from] bcrypt::BcryptError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl WarblerError {
    /// Map an insert failure to `Conflict` when it is a unique violation.
    ///
    /// `classify` picks the field from the database message; it is only
    /// consulted for unique violations.
    pub(crate) fn from_insert(
        err: sqlx::Error,
        classify: impl FnOnce(&str) -> DuplicateField,
    ) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let message = db_err.message();
            if db_err.is_unique_violation() || message.contains("UNIQUE constraint failed") {
                return WarblerError::Conflict(classify(message));
            }
        }
        WarblerError::Database(err)
    }

    /// Map a write failure to `not_found` when a referenced row is missing.
    pub(crate) fn from_reference(err: sqlx::Error, not_found: impl FnOnce() -> Self) -> Self {
        if is_foreign_key_violation(&err) {
            return not_found();
        }
        WarblerError::Database(err)
    }

    /// True for the storage-layer integrity failure class.
    pub fn is_conflict(&self) -> bool {
        matches!(self, WarblerError::Conflict(_))
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_foreign_key_violation()
                || db_err.message().contains("FOREIGN KEY constraint failed")
        }
        _ => false,
    }
}
