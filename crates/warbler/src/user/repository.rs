//! User repository for database operations.

use sqlx::sqlite::SqliteConnection;
use tracing::{debug, instrument};

use super::models::{NewUser, UpdateProfile, User};
use crate::error::{DuplicateField, WarblerError, WarblerResult};

/// Repository for user database operations.
///
/// Every call runs on the connection of a caller-owned
/// [`Session`](crate::db::Session).
#[derive(Debug, Clone, Copy, Default)]
pub struct UserRepository;

/// Pick the colliding column out of a unique-violation message.
fn duplicate_user_field(message: &str) -> DuplicateField {
    if message.contains("email") {
        DuplicateField::Email
    } else {
        DuplicateField::Username
    }
}

impl UserRepository {
    /// Persist a signed-up user.
    ///
    /// A username or email already in use fails here with
    /// [`WarblerError::Conflict`].
    #[instrument(skip(conn, user), fields(username = %user.username))]
    pub async fn insert(conn: &mut SqliteConnection, user: &NewUser) -> WarblerResult<User> {
        debug!("Inserting user: {}", user.username);

        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, password, image_url)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.image_url)
        .execute(&mut *conn)
        .await
        .map_err(|err| WarblerError::from_insert(err, duplicate_user_field))?;

        let id = result.last_insert_rowid();

        Self::get(conn, id)
            .await?
            .ok_or_else(|| WarblerError::UserNotFound(id.to_string()))
    }

    /// Get a user by ID.
    #[instrument(skip(conn))]
    pub async fn get(conn: &mut SqliteConnection, id: i64) -> WarblerResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password, image_url, header_image_url,
                   bio, location, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(user)
    }

    /// Get a user by ID, failing when absent.
    pub async fn require(conn: &mut SqliteConnection, id: i64) -> WarblerResult<User> {
        Self::get(conn, id)
            .await?
            .ok_or_else(|| WarblerError::UserNotFound(id.to_string()))
    }

    /// Get a user by username.
    #[instrument(skip(conn))]
    pub async fn get_by_username(
        conn: &mut SqliteConnection,
        username: &str,
    ) -> WarblerResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password, image_url, header_image_url,
                   bio, location, created_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(conn)
        .await?;

        Ok(user)
    }

    /// Get a user by email.
    #[instrument(skip(conn))]
    pub async fn get_by_email(
        conn: &mut SqliteConnection,
        email: &str,
    ) -> WarblerResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password, image_url, header_image_url,
                   bio, location, created_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(conn)
        .await?;

        Ok(user)
    }

    /// Users whose username contains `search`, or all users when empty.
    #[instrument(skip(conn))]
    pub async fn search(
        conn: &mut SqliteConnection,
        search: &str,
        limit: i64,
    ) -> WarblerResult<Vec<User>> {
        let pattern = format!("%{}%", search.trim());

        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password, image_url, header_image_url,
                   bio, location, created_at
            FROM users
            WHERE username LIKE ?
            ORDER BY username
            LIMIT ?
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(conn)
        .await?;

        Ok(users)
    }

    /// Update profile fields.
    #[instrument(skip(conn, update))]
    pub async fn update(
        conn: &mut SqliteConnection,
        id: i64,
        update: &UpdateProfile,
    ) -> WarblerResult<User> {
        let existing = Self::require(&mut *conn, id).await?;

        if update.is_empty() {
            return Ok(existing);
        }

        // Build update query dynamically
        let mut updates = Vec::new();
        let mut values: Vec<&str> = Vec::new();

        if let Some(username) = &update.username {
            updates.push("username = ?");
            values.push(username);
        }

        if let Some(email) = &update.email {
            updates.push("email = ?");
            values.push(email);
        }

        if let Some(image_url) = &update.image_url {
            updates.push("image_url = ?");
            values.push(image_url);
        }

        if let Some(header_image_url) = &update.header_image_url {
            updates.push("header_image_url = ?");
            values.push(header_image_url);
        }

        if let Some(bio) = &update.bio {
            updates.push("bio = ?");
            values.push(bio);
        }

        if let Some(location) = &update.location {
            updates.push("location = ?");
            values.push(location);
        }

        let sql = format!("UPDATE users SET {} WHERE id = ?", updates.join(", "));

        let mut query_builder = sqlx::query(&sql);
        for value in values {
            query_builder = query_builder.bind(value);
        }

        query_builder
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(|err| WarblerError::from_insert(err, duplicate_user_field))?;

        Self::require(conn, id).await
    }

    /// Replace the stored password hash.
    #[instrument(skip(conn, password_hash))]
    pub async fn update_password(
        conn: &mut SqliteConnection,
        id: i64,
        password_hash: &str,
    ) -> WarblerResult<()> {
        let result = sqlx::query("UPDATE users SET password = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(WarblerError::UserNotFound(id.to_string()));
        }

        Ok(())
    }

    /// Delete a user. Messages, follow edges and likes go with it.
    #[instrument(skip(conn))]
    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> WarblerResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(WarblerError::UserNotFound(id.to_string()));
        }

        Ok(())
    }

    /// Count total users.
    #[instrument(skip(conn))]
    pub async fn count(conn: &mut SqliteConnection) -> WarblerResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(conn)
            .await?;

        Ok(count.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::user::models::DEFAULT_IMAGE_URL;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$2b$04$not-a-real-hash".to_string(),
            image_url: DEFAULT_IMAGE_URL.to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_user() {
        let db = Database::in_memory().await.unwrap();
        let mut session = db.begin().await.unwrap();

        let user = UserRepository::insert(session.conn(), &new_user("testuser", "test@example.com"))
            .await
            .unwrap();
        assert_eq!(user.username, "testuser");
        assert_eq!(user.email, "test@example.com");
        assert_eq!(user.image_url, DEFAULT_IMAGE_URL);
        assert!(user.bio.is_none());

        // Fetch by ID
        let fetched = UserRepository::get(session.conn(), user.id).await.unwrap().unwrap();
        assert_eq!(fetched, user);

        // Fetch by username
        let by_username = UserRepository::get_by_username(session.conn(), "testuser")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_username.id, user.id);

        // Fetch by email
        let by_email = UserRepository::get_by_email(session.conn(), "test@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, user.id);

        assert!(UserRepository::get_by_username(session.conn(), "nobody")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_insert_duplicate_username() {
        let db = Database::in_memory().await.unwrap();
        let mut session = db.begin().await.unwrap();

        UserRepository::insert(session.conn(), &new_user("u1", "u1@email.com"))
            .await
            .unwrap();
        let err = UserRepository::insert(session.conn(), &new_user("u1", "u3@email.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, WarblerError::Conflict(DuplicateField::Username)));
    }

    #[tokio::test]
    async fn test_insert_duplicate_email() {
        let db = Database::in_memory().await.unwrap();
        let mut session = db.begin().await.unwrap();

        UserRepository::insert(session.conn(), &new_user("u1", "u1@email.com"))
            .await
            .unwrap();
        let err = UserRepository::insert(session.conn(), &new_user("u3", "u1@email.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, WarblerError::Conflict(DuplicateField::Email)));
    }

    #[tokio::test]
    async fn test_update_user() {
        let db = Database::in_memory().await.unwrap();
        let mut session = db.begin().await.unwrap();

        let user = UserRepository::insert(session.conn(), &new_user("updateuser", "update@example.com"))
            .await
            .unwrap();

        let update = UpdateProfile {
            bio: Some("Hello there".to_string()),
            location: Some("Lisbon".to_string()),
            ..Default::default()
        };

        let updated = UserRepository::update(session.conn(), user.id, &update).await.unwrap();
        assert_eq!(updated.bio.as_deref(), Some("Hello there"));
        assert_eq!(updated.location.as_deref(), Some("Lisbon"));
        assert_eq!(updated.username, "updateuser");

        let unchanged = UserRepository::update(session.conn(), user.id, &UpdateProfile::default())
            .await
            .unwrap();
        assert_eq!(unchanged, updated);
    }

    #[tokio::test]
    async fn test_update_to_taken_username() {
        let db = Database::in_memory().await.unwrap();
        let mut session = db.begin().await.unwrap();

        UserRepository::insert(session.conn(), &new_user("u1", "u1@email.com"))
            .await
            .unwrap();
        let u2 = UserRepository::insert(session.conn(), &new_user("u2", "u2@email.com"))
            .await
            .unwrap();

        let update = UpdateProfile {
            username: Some("u1".to_string()),
            ..Default::default()
        };
        let err = UserRepository::update(session.conn(), u2.id, &update).await.unwrap_err();
        assert!(matches!(err, WarblerError::Conflict(DuplicateField::Username)));
    }

    #[tokio::test]
    async fn test_delete_user() {
        let db = Database::in_memory().await.unwrap();
        let mut session = db.begin().await.unwrap();

        let user = UserRepository::insert(session.conn(), &new_user("deleteuser", "delete@example.com"))
            .await
            .unwrap();
        UserRepository::delete(session.conn(), user.id).await.unwrap();

        assert!(UserRepository::get(session.conn(), user.id).await.unwrap().is_none());

        let err = UserRepository::delete(session.conn(), user.id).await.unwrap_err();
        assert!(matches!(err, WarblerError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn test_search_users() {
        let db = Database::in_memory().await.unwrap();
        let mut session = db.begin().await.unwrap();

        for i in 0..5 {
            UserRepository::insert(
                session.conn(),
                &new_user(&format!("user{i}"), &format!("user{i}@example.com")),
            )
            .await
            .unwrap();
        }
        UserRepository::insert(session.conn(), &new_user("other", "other@example.com"))
            .await
            .unwrap();

        assert_eq!(UserRepository::count(session.conn()).await.unwrap(), 6);

        let all = UserRepository::search(session.conn(), "", 100).await.unwrap();
        assert_eq!(all.len(), 6);

        let found = UserRepository::search(session.conn(), "user", 100).await.unwrap();
        assert_eq!(found.len(), 5);

        let one = UserRepository::search(session.conn(), "user2", 100).await.unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].username, "user2");

        let limited = UserRepository::search(session.conn(), "user", 2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }
}
