//! Follow edge repository for database operations.

use sqlx::sqlite::SqliteConnection;
use tracing::{debug, instrument};

use crate::error::{DuplicateField, WarblerError, WarblerResult};
use crate::user::User;

/// Repository for the directed follow graph.
///
/// An edge `(follower, followed)` means "follower follows followed".
#[derive(Debug, Clone, Copy, Default)]
pub struct FollowRepository;

impl FollowRepository {
    /// Make `follower_id` follow `followed_id`.
    ///
    /// Self-follows are rejected. An existing edge fails with
    /// `Conflict(DuplicateField::Follow)`.
    #[instrument(skip(conn))]
    pub async fn follow(
        conn: &mut SqliteConnection,
        follower_id: i64,
        followed_id: i64,
    ) -> WarblerResult<()> {
        if follower_id == followed_id {
            return Err(WarblerError::SelfFollow);
        }

        for id in [follower_id, followed_id] {
            let exists: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE id = ?")
                .bind(id)
                .fetch_one(&mut *conn)
                .await?;
            if exists.0 == 0 {
                return Err(WarblerError::UserNotFound(id.to_string()));
            }
        }

        Self::insert_edge(conn, follower_id, followed_id).await?;

        debug!("user {} now follows {}", follower_id, followed_id);
        Ok(())
    }

    /// Insert the edge row. A user removed since it was looked up surfaces as
    /// `UserNotFound`.
    async fn insert_edge(
        conn: &mut SqliteConnection,
        follower_id: i64,
        followed_id: i64,
    ) -> WarblerResult<()> {
        sqlx::query(
            "INSERT INTO follows (user_being_followed_id, user_following_id) VALUES (?, ?)",
        )
        .bind(followed_id)
        .bind(follower_id)
        .execute(conn)
        .await
        .map_err(|err| {
            match WarblerError::from_reference(err, || {
                WarblerError::UserNotFound(format!("{follower_id} or {followed_id}"))
            }) {
                WarblerError::Database(err) => {
                    WarblerError::from_insert(err, |_| DuplicateField::Follow)
                }
                other => other,
            }
        })?;

        Ok(())
    }

    /// Remove the edge. Returns whether one existed.
    #[instrument(skip(conn))]
    pub async fn unfollow(
        conn: &mut SqliteConnection,
        follower_id: i64,
        followed_id: i64,
    ) -> WarblerResult<bool> {
        let result = sqlx::query(
            "DELETE FROM follows WHERE user_being_followed_id = ? AND user_following_id = ?",
        )
        .bind(followed_id)
        .bind(follower_id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Does `user_id` follow `other_id`?
    #[instrument(skip(conn))]
    pub async fn is_following(
        conn: &mut SqliteConnection,
        user_id: i64,
        other_id: i64,
    ) -> WarblerResult<bool> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM follows
            WHERE user_being_followed_id = ? AND user_following_id = ?
            "#,
        )
        .bind(other_id)
        .bind(user_id)
        .fetch_one(conn)
        .await?;

        Ok(count.0 > 0)
    }

    /// Is `user_id` followed by `other_id`?
    pub async fn is_followed_by(
        conn: &mut SqliteConnection,
        user_id: i64,
        other_id: i64,
    ) -> WarblerResult<bool> {
        Self::is_following(conn, other_id, user_id).await
    }

    /// Users that `user_id` follows, by username.
    #[instrument(skip(conn))]
    pub async fn list_following(
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> WarblerResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.email, u.password, u.image_url, u.header_image_url,
                   u.bio, u.location, u.created_at
            FROM users u
            JOIN follows f ON f.user_being_followed_id = u.id
            WHERE f.user_following_id = ?
            ORDER BY u.username
            "#,
        )
        .bind(user_id)
        .fetch_all(conn)
        .await?;

        Ok(users)
    }

    /// Users following `user_id`, by username.
    #[instrument(skip(conn))]
    pub async fn list_followers(
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> WarblerResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.email, u.password, u.image_url, u.header_image_url,
                   u.bio, u.location, u.created_at
            FROM users u
            JOIN follows f ON f.user_following_id = u.id
            WHERE f.user_being_followed_id = ?
            ORDER BY u.username
            "#,
        )
        .bind(user_id)
        .fetch_all(conn)
        .await?;

        Ok(users)
    }

    #[instrument(skip(conn))]
    pub async fn count_following(conn: &mut SqliteConnection, user_id: i64) -> WarblerResult<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM follows WHERE user_following_id = ?")
                .bind(user_id)
                .fetch_one(conn)
                .await?;

        Ok(count.0)
    }

    #[instrument(skip(conn))]
    pub async fn count_followers(conn: &mut SqliteConnection, user_id: i64) -> WarblerResult<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM follows WHERE user_being_followed_id = ?")
                .bind(user_id)
                .fetch_one(conn)
                .await?;

        Ok(count.0)
    }
}
