//! Password hashing with bcrypt.

use crate::error::WarblerResult;

/// Hashes and verifies passwords at a fixed bcrypt cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    /// Lowest cost bcrypt accepts.
    pub const MIN_COST: u32 = 4;
    /// Highest cost bcrypt accepts.
    pub const MAX_COST: u32 = 31;
    /// bcrypt ignores every byte of a password past this length.
    pub const MAX_PASSWORD_BYTES: usize = 72;

    /// Create a hasher, clamping `cost` into the range bcrypt accepts.
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(Self::MIN_COST, Self::MAX_COST),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a password.
    pub fn hash(&self, password: &str) -> WarblerResult<String> {
        Ok(bcrypt::hash(password, self.cost)?)
    }

    /// Verify a password against a stored hash.
    ///
    /// A malformed stored hash is an error, not a mismatch. Passwords longer
    /// than [`Self::MAX_PASSWORD_BYTES`] never match, since bcrypt would
    /// compare only their prefix.
    pub fn verify(&self, password: &str, hash: &str) -> WarblerResult<bool> {
        if password.len() > Self::MAX_PASSWORD_BYTES {
            return Ok(false);
        }
        Ok(bcrypt::verify(password, hash)?)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        // Use a lower cost factor for development speed
        let cost = if cfg!(debug_assertions) {
            Self::MIN_COST
        } else {
            bcrypt::DEFAULT_COST
        };
        Self::new(cost)
    }
}
