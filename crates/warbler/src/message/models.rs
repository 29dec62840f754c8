//! Message data models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Longest message text accepted, in characters.
pub const MAX_MESSAGE_LEN: usize = 140;

/// Message entity from database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: i64,
    pub text: String,
    pub timestamp: String,
    pub user_id: i64,
}

/// A message joined with its author, as shown on a timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TimelineEntry {
    pub id: i64,
    pub text: String,
    pub timestamp: String,
    pub user_id: i64,
    pub username: String,
    pub image_url: String,
}
