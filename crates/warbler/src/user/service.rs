//! User service for signup, authentication and profile logic.

use sqlx::sqlite::SqliteConnection;
use tracing::{info, instrument, warn};

use super::models::{DEFAULT_IMAGE_URL, NewUser, UpdateProfile, User, UserDetail};
use super::repository::UserRepository;
use crate::auth::{AuthOutcome, PasswordHasher};
use crate::error::{WarblerError, WarblerResult};
use crate::follow::FollowRepository;
use crate::message::MessageRepository;

/// Shortest password accepted at signup.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Longest username accepted at signup.
pub const MAX_USERNAME_LEN: usize = 50;

/// Service for account operations.
#[derive(Debug, Clone, Default)]
pub struct UserService {
    hasher: PasswordHasher,
}

impl UserService {
    /// Create a new user service.
    pub fn new(hasher: PasswordHasher) -> Self {
        Self { hasher }
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// Build a pending user with a hashed password.
    ///
    /// Only the format of the input is checked. Whether the username or
    /// email is already taken is decided by [`UserRepository::insert`].
    #[instrument(skip(self, email, password, image_url))]
    pub fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
        image_url: Option<&str>,
    ) -> WarblerResult<NewUser> {
        let username = username.trim();
        let email = email.trim();

        // Validate username format
        if !is_valid_username(username) {
            return Err(WarblerError::Validation(format!(
                "username must be 1-{MAX_USERNAME_LEN} alphanumeric characters, underscores, or hyphens"
            )));
        }

        // Validate email format
        if !is_valid_email(email) {
            return Err(WarblerError::Validation("invalid email format".to_string()));
        }

        validate_password(password)?;

        let image_url = image_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_IMAGE_URL);

        Ok(NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: self.hasher.hash(password)?,
            image_url: image_url.to_string(),
        })
    }

    /// Sign up and persist in one step.
    #[instrument(skip(self, conn, email, password, image_url))]
    pub async fn register(
        &self,
        conn: &mut SqliteConnection,
        username: &str,
        email: &str,
        password: &str,
        image_url: Option<&str>,
    ) -> WarblerResult<User> {
        let new_user = self.signup(username, email, password, image_url)?;
        let user = UserRepository::insert(conn, &new_user).await?;
        info!(user_id = user.id, username = %user.username, "Created new user");

        Ok(user)
    }

    /// Check a username/password pair.
    ///
    /// An unknown username and a wrong password are both `Ok` outcomes;
    /// only storage and hashing faults are errors.
    #[instrument(skip(self, conn, password))]
    pub async fn authenticate(
        &self,
        conn: &mut SqliteConnection,
        username: &str,
        password: &str,
    ) -> WarblerResult<AuthOutcome> {
        let Some(user) = UserRepository::get_by_username(conn, username.trim()).await? else {
            return Ok(AuthOutcome::NotFound);
        };

        if self.hasher.verify(password, &user.password)? {
            Ok(AuthOutcome::Authenticated(user))
        } else {
            warn!(user_id = user.id, "Password mismatch");
            Ok(AuthOutcome::InvalidCredentials)
        }
    }

    /// Load a user together with messages, follows and likes.
    #[instrument(skip(self, conn))]
    pub async fn detail(&self, conn: &mut SqliteConnection, user_id: i64) -> WarblerResult<UserDetail> {
        let user = UserRepository::require(&mut *conn, user_id).await?;
        let messages = MessageRepository::list_for_user(&mut *conn, user_id).await?;
        let following = FollowRepository::list_following(&mut *conn, user_id).await?;
        let followers = FollowRepository::list_followers(&mut *conn, user_id).await?;
        let likes = MessageRepository::list_liked(conn, user_id).await?;

        Ok(UserDetail {
            user,
            messages,
            following,
            followers,
            likes,
        })
    }

    /// Update profile fields after re-checking the user's password.
    #[instrument(skip(self, conn, password, update))]
    pub async fn update_profile(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        password: &str,
        update: &UpdateProfile,
    ) -> WarblerResult<User> {
        self.verify_owner(&mut *conn, user_id, password).await?;

        // Stored names and emails are trimmed, as at signup.
        let update = UpdateProfile {
            username: update.username.as_deref().map(|s| s.trim().to_string()),
            email: update.email.as_deref().map(|s| s.trim().to_string()),
            ..update.clone()
        };

        if let Some(username) = &update.username {
            if !is_valid_username(username) {
                return Err(WarblerError::Validation("invalid username format".to_string()));
            }
        }

        if let Some(email) = &update.email {
            if !is_valid_email(email) {
                return Err(WarblerError::Validation("invalid email format".to_string()));
            }
        }

        let user = UserRepository::update(conn, user_id, &update).await?;
        info!(user_id, "Updated user");

        Ok(user)
    }

    /// Replace a user's password after checking the current one.
    #[instrument(skip(self, conn, current, new_password))]
    pub async fn change_password(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        current: &str,
        new_password: &str,
    ) -> WarblerResult<()> {
        self.verify_owner(&mut *conn, user_id, current).await?;
        validate_password(new_password)?;

        let hash = self.hasher.hash(new_password)?;
        UserRepository::update_password(conn, user_id, &hash).await?;
        info!(user_id, "Changed password");

        Ok(())
    }

    /// Delete a user and everything they own.
    #[instrument(skip(self, conn))]
    pub async fn delete_user(&self, conn: &mut SqliteConnection, user_id: i64) -> WarblerResult<()> {
        UserRepository::delete(conn, user_id).await?;
        info!(user_id, "Deleted user");

        Ok(())
    }

    async fn verify_owner(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        password: &str,
    ) -> WarblerResult<()> {
        let user = UserRepository::require(conn, user_id).await?;
        if self.hasher.verify(password, &user.password)? {
            Ok(())
        } else {
            Err(WarblerError::InvalidCredentials)
        }
    }
}

/// Reject passwords bcrypt would truncate or that are too short.
fn validate_password(password: &str) -> WarblerResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(WarblerError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if password.len() > PasswordHasher::MAX_PASSWORD_BYTES {
        return Err(WarblerError::Validation(format!(
            "password must be at most {} bytes",
            PasswordHasher::MAX_PASSWORD_BYTES
        )));
    }
    Ok(())
}

/// Validate username format.
fn is_valid_username(username: &str) -> bool {
    let len = username.chars().count();
    if !(1..=MAX_USERNAME_LEN).contains(&len) {
        return false;
    }

    username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Basic email validation.
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::error::DuplicateField;

    fn service() -> UserService {
        UserService::new(PasswordHasher::new(4))
    }

    #[test]
    fn test_is_valid_username() {
        assert!(is_valid_username("u1"));
        assert!(is_valid_username("user_name"));
        assert!(is_valid_username("user-name"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username("user@name")); // invalid char
        assert!(!is_valid_username("user name")); // space
        assert!(!is_valid_username(&"a".repeat(MAX_USERNAME_LEN + 1)));
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("u1@email.com"));
        assert!(is_valid_email("user.name@sub.domain.com"));
        assert!(!is_valid_email("userexample.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email("a@b@c.com"));
    }

    #[test]
    fn test_signup_hashes_password() {
        let new_user = service()
            .signup("u3", "u3@email.com", "password", None)
            .unwrap();

        assert_eq!(new_user.username, "u3");
        assert_eq!(new_user.image_url, DEFAULT_IMAGE_URL);
        assert_ne!(new_user.password_hash, "password");
        assert!(new_user.password_hash.starts_with("$2"));
        assert!(service().hasher().verify("password", &new_user.password_hash).unwrap());
    }

    #[test]
    fn test_signup_keeps_image_url() {
        let new_user = service()
            .signup("u3", "u3@email.com", "password", Some("http://img/x.png"))
            .unwrap();
        assert_eq!(new_user.image_url, "http://img/x.png");

        let blank = service()
            .signup("u4", "u4@email.com", "password", Some("  "))
            .unwrap();
        assert_eq!(blank.image_url, DEFAULT_IMAGE_URL);
    }

    #[test]
    fn test_signup_rejects_bad_input() {
        let svc = service();
        assert!(matches!(
            svc.signup("", "u3@email.com", "password", None),
            Err(WarblerError::Validation(_))
        ));
        assert!(matches!(
            svc.signup("u3", "not-an-email", "password", None),
            Err(WarblerError::Validation(_))
        ));
        assert!(matches!(
            svc.signup("u3", "u3@email.com", "short", None),
            Err(WarblerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let db = Database::in_memory().await.unwrap();
        let mut session = db.begin().await.unwrap();
        let svc = service();

        let u1 = svc
            .register(session.conn(), "u1", "u1@email.com", "password", None)
            .await
            .unwrap();

        let outcome = svc.authenticate(session.conn(), "u1", "password").await.unwrap();
        assert_eq!(outcome.user().map(|u| u.id), Some(u1.id));

        let outcome = svc.authenticate(session.conn(), "u3", "password").await.unwrap();
        assert_eq!(outcome, AuthOutcome::NotFound);
        assert!(outcome.into_user().is_none());

        let outcome = svc.authenticate(session.conn(), "u1", "pass").await.unwrap();
        assert_eq!(outcome, AuthOutcome::InvalidCredentials);
        assert!(!outcome.is_authenticated());
    }

    #[test]
    fn test_signup_rejects_password_bcrypt_would_truncate() {
        let svc = service();
        let at_limit = "a".repeat(PasswordHasher::MAX_PASSWORD_BYTES);
        assert!(svc.signup("u3", "u3@email.com", &at_limit, None).is_ok());

        let secret = format!("{at_limit}SECRET");
        assert!(matches!(
            svc.signup("u3", "u3@email.com", &secret, None),
            Err(WarblerError::Validation(_))
        ));

        // Multi-byte characters count by bytes, not chars.
        let wide = "\u{e9}".repeat(40);
        assert!(matches!(
            svc.signup("u3", "u3@email.com", &wide, None),
            Err(WarblerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_authenticate_trims_username_like_signup() {
        let db = Database::in_memory().await.unwrap();
        let mut session = db.begin().await.unwrap();
        let svc = service();

        let alice = svc
            .register(session.conn(), " alice ", "alice@email.com", "password", None)
            .await
            .unwrap();
        assert_eq!(alice.username, "alice");

        let outcome = svc
            .authenticate(session.conn(), " alice ", "password")
            .await
            .unwrap();
        assert_eq!(outcome.user().map(|u| u.id), Some(alice.id));
    }

    #[tokio::test]
    async fn test_update_profile_trims_username() {
        let db = Database::in_memory().await.unwrap();
        let mut session = db.begin().await.unwrap();
        let svc = service();
        let u1 = svc
            .register(session.conn(), "u1", "u1@email.com", "password", None)
            .await
            .unwrap();

        let update = UpdateProfile {
            username: Some("  renamed ".to_string()),
            email: Some(" renamed@email.com".to_string()),
            ..Default::default()
        };
        let updated = svc
            .update_profile(session.conn(), u1.id, "password", &update)
            .await
            .unwrap();

        assert_eq!(updated.username, "renamed");
        assert_eq!(updated.email, "renamed@email.com");
        assert!(svc
            .authenticate(session.conn(), "renamed", "password")
            .await
            .unwrap()
            .is_authenticated());
    }

    #[tokio::test]
    async fn test_register_duplicate_username() {
        let db = Database::in_memory().await.unwrap();
        let mut session = db.begin().await.unwrap();
        let svc = service();

        svc.register(session.conn(), "u1", "u1@email.com", "password", None)
            .await
            .unwrap();
        let err = svc
            .register(session.conn(), "u1", "u3@email.com", "password", None)
            .await
            .unwrap_err();

        assert!(matches!(err, WarblerError::Conflict(DuplicateField::Username)));
    }

    #[tokio::test]
    async fn test_update_profile_requires_password() {
        let db = Database::in_memory().await.unwrap();
        let mut session = db.begin().await.unwrap();
        let svc = service();
        let u1 = svc
            .register(session.conn(), "u1", "u1@email.com", "password", None)
            .await
            .unwrap();

        let update = UpdateProfile {
            bio: Some("birds".to_string()),
            ..Default::default()
        };

        let err = svc
            .update_profile(session.conn(), u1.id, "wrong-password", &update)
            .await
            .unwrap_err();
        assert!(matches!(err, WarblerError::InvalidCredentials));

        let updated = svc
            .update_profile(session.conn(), u1.id, "password", &update)
            .await
            .unwrap();
        assert_eq!(updated.bio.as_deref(), Some("birds"));
    }

    #[tokio::test]
    async fn test_change_password() {
        let db = Database::in_memory().await.unwrap();
        let mut session = db.begin().await.unwrap();
        let svc = service();
        let u1 = svc
            .register(session.conn(), "u1", "u1@email.com", "password", None)
            .await
            .unwrap();

        svc.change_password(session.conn(), u1.id, "password", "new-password")
            .await
            .unwrap();

        assert!(!svc
            .authenticate(session.conn(), "u1", "password")
            .await
            .unwrap()
            .is_authenticated());
        assert!(svc
            .authenticate(session.conn(), "u1", "new-password")
            .await
            .unwrap()
            .is_authenticated());

        let too_long = "b".repeat(PasswordHasher::MAX_PASSWORD_BYTES + 1);
        let err = svc
            .change_password(session.conn(), u1.id, "new-password", &too_long)
            .await
            .unwrap_err();
        assert!(matches!(err, WarblerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_detail_of_fresh_user_is_empty() {
        let db = Database::in_memory().await.unwrap();
        let mut session = db.begin().await.unwrap();
        let svc = service();
        let u1 = svc
            .register(session.conn(), "u1", "u1@email.com", "password", None)
            .await
            .unwrap();

        let detail = svc.detail(session.conn(), u1.id).await.unwrap();
        assert_eq!(detail.user, u1);
        assert!(detail.messages.is_empty());
        assert!(detail.followers.is_empty());
        assert!(detail.following.is_empty());
        assert!(detail.likes.is_empty());

        let err = svc.detail(session.conn(), 999).await.unwrap_err();
        assert!(matches!(err, WarblerError::UserNotFound(_)));
    }
}
