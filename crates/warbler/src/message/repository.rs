//! Message and like repository for database operations.

use sqlx::sqlite::SqliteConnection;
use tracing::{debug, instrument};

use super::models::{MAX_MESSAGE_LEN, Message, TimelineEntry};
use crate::error::{DuplicateField, WarblerError, WarblerResult};

/// Repository for message database operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageRepository;

impl MessageRepository {
    /// Create a message authored by `user_id`.
    #[instrument(skip(conn, text))]
    pub async fn create(
        conn: &mut SqliteConnection,
        user_id: i64,
        text: &str,
    ) -> WarblerResult<Message> {
        let text = text.trim();
        let len = text.chars().count();
        if len == 0 || len > MAX_MESSAGE_LEN {
            return Err(WarblerError::Validation(format!(
                "message text must be 1-{MAX_MESSAGE_LEN} characters"
            )));
        }

        let result = sqlx::query("INSERT INTO messages (text, user_id) VALUES (?, ?)")
            .bind(text)
            .bind(user_id)
            .execute(&mut *conn)
            .await
            .map_err(|err| {
                WarblerError::from_reference(err, || {
                    WarblerError::UserNotFound(user_id.to_string())
                })
            })?;

        let id = result.last_insert_rowid();
        debug!(message_id = id, "created message");

        Self::get(conn, id)
            .await?
            .ok_or(WarblerError::MessageNotFound(id))
    }

    /// Get a message by ID.
    #[instrument(skip(conn))]
    pub async fn get(conn: &mut SqliteConnection, id: i64) -> WarblerResult<Option<Message>> {
        let message = sqlx::query_as::<_, Message>(
            "SELECT id, text, timestamp, user_id FROM messages WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(message)
    }

    /// Messages authored by a user, newest first.
    #[instrument(skip(conn))]
    pub async fn list_for_user(
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> WarblerResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, text, timestamp, user_id
            FROM messages
            WHERE user_id = ?
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(conn)
        .await?;

        Ok(messages)
    }

    #[instrument(skip(conn))]
    pub async fn count_for_user(conn: &mut SqliteConnection, user_id: i64) -> WarblerResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(conn)
            .await?;

        Ok(count.0)
    }

    /// The user's own messages and those of users they follow, newest first.
    #[instrument(skip(conn))]
    pub async fn timeline(
        conn: &mut SqliteConnection,
        user_id: i64,
        limit: i64,
    ) -> WarblerResult<Vec<TimelineEntry>> {
        let entries = sqlx::query_as::<_, TimelineEntry>(
            r#"
            SELECT m.id, m.text, m.timestamp, m.user_id, u.username, u.image_url
            FROM messages m
            JOIN users u ON u.id = m.user_id
            WHERE m.user_id = ?
               OR m.user_id IN (
                   SELECT user_being_followed_id FROM follows WHERE user_following_id = ?
               )
            ORDER BY m.timestamp DESC, m.id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(limit)
        .fetch_all(conn)
        .await?;

        Ok(entries)
    }

    /// Delete a message. Only its author may delete it.
    #[instrument(skip(conn))]
    pub async fn delete(
        conn: &mut SqliteConnection,
        id: i64,
        author_id: i64,
    ) -> WarblerResult<()> {
        let message = Self::get(&mut *conn, id)
            .await?
            .ok_or(WarblerError::MessageNotFound(id))?;

        if message.user_id != author_id {
            return Err(WarblerError::Forbidden(
                "only the author may delete a message".to_string(),
            ));
        }

        sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Like a message. Users cannot like their own messages.
    #[instrument(skip(conn))]
    pub async fn like(
        conn: &mut SqliteConnection,
        user_id: i64,
        message_id: i64,
    ) -> WarblerResult<()> {
        let message = Self::get(&mut *conn, message_id)
            .await?
            .ok_or(WarblerError::MessageNotFound(message_id))?;

        if message.user_id == user_id {
            return Err(WarblerError::Forbidden(
                "users cannot like their own messages".to_string(),
            ));
        }

        sqlx::query("INSERT INTO likes (user_id, message_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(message_id)
            .execute(conn)
            .await
            .map_err(|err| match WarblerError::from_insert(err, |_| DuplicateField::Like) {
                WarblerError::Database(err) => WarblerError::from_reference(err, || {
                    WarblerError::UserNotFound(user_id.to_string())
                }),
                other => other,
            })?;

        Ok(())
    }

    /// Remove a like. Returns whether one existed.
    #[instrument(skip(conn))]
    pub async fn unlike(
        conn: &mut SqliteConnection,
        user_id: i64,
        message_id: i64,
    ) -> WarblerResult<bool> {
        let result = sqlx::query("DELETE FROM likes WHERE user_id = ? AND message_id = ?")
            .bind(user_id)
            .bind(message_id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Like the message if not yet liked, otherwise remove the like.
    /// Returns whether the message is liked afterwards.
    #[instrument(skip(conn))]
    pub async fn toggle_like(
        conn: &mut SqliteConnection,
        user_id: i64,
        message_id: i64,
    ) -> WarblerResult<bool> {
        if Self::unlike(&mut *conn, user_id, message_id).await? {
            return Ok(false);
        }

        Self::like(conn, user_id, message_id).await?;
        Ok(true)
    }

    /// Messages a user has liked, newest first.
    #[instrument(skip(conn))]
    pub async fn list_liked(
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> WarblerResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT m.id, m.text, m.timestamp, m.user_id
            FROM messages m
            JOIN likes l ON l.message_id = m.id
            WHERE l.user_id = ?
            ORDER BY m.timestamp DESC, m.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(conn)
        .await?;

        Ok(messages)
    }
}
