//! Credential handling and authentication outcomes.

mod password;

pub use password::PasswordHasher;

use crate::user::User;

/// Result of checking a username/password pair.
///
/// A failed login is an expected outcome, so it is a value here and never a
/// [`WarblerError`](crate::error::WarblerError).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(User),
    /// No user has that username.
    NotFound,
    /// The user exists but the password does not match.
    InvalidCredentials,
}

impl AuthOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthOutcome::Authenticated(_))
    }

    /// The authenticated user, or `None` for either failure.
    pub fn into_user(self) -> Option<User> {
        match self {
            AuthOutcome::Authenticated(user) => Some(user),
            AuthOutcome::NotFound | AuthOutcome::InvalidCredentials => None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            AuthOutcome::Authenticated(user) => Some(user),
            AuthOutcome::NotFound | AuthOutcome::InvalidCredentials => None,
        }
    }
}
