//! User data models.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::message::Message;

/// Profile image used when signup supplies none.
pub const DEFAULT_IMAGE_URL: &str = "/static/images/default-pic.png";

/// Header image every new profile starts with.
pub const DEFAULT_HEADER_IMAGE_URL: &str = "/static/images/warbler-hero.jpg";

/// User entity from database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// bcrypt hash; the plaintext is never stored.
    #[serde(skip_serializing)]
    pub password: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub created_at: String,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<User #{}: {}, {}>", self.id, self.username, self.email)
    }
}

/// A signed-up user that has not been persisted yet.
///
/// Built by [`UserService::signup`](super::UserService::signup); uniqueness
/// of username and email is only checked when it is inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub image_url: String,
}

/// Profile fields a user may change. `None` leaves the field as is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfile {
    pub username: Option<String>,
    pub email: Option<String>,
    pub image_url: Option<String>,
    pub header_image_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
}

impl UpdateProfile {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.image_url.is_none()
            && self.header_image_url.is_none()
            && self.bio.is_none()
            && self.location.is_none()
    }
}

/// A user with its relationship collections loaded.
///
/// The collections are plain vectors: the predicates below never touch
/// storage, and edits made to the vectors are visible to them immediately.
#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    pub user: User,
    /// Newest first.
    pub messages: Vec<Message>,
    /// Users this user follows.
    pub following: Vec<User>,
    /// Users following this user.
    pub followers: Vec<User>,
    /// Messages this user has liked.
    pub likes: Vec<Message>,
}

impl UserDetail {
    /// Does this user follow `other`?
    pub fn is_following(&self, other: &User) -> bool {
        self.following.iter().any(|u| u.id == other.id)
    }

    /// Is this user followed by `other`?
    pub fn is_followed_by(&self, other: &User) -> bool {
        self.followers.iter().any(|u| u.id == other.id)
    }

    pub fn has_liked(&self, message: &Message) -> bool {
        self.likes.iter().any(|m| m.id == message.id)
    }
}
