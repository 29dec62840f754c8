//! User accounts.
//!
//! Provides signup, authentication, profile updates and the materialized
//! [`UserDetail`] view with its follow-graph predicates.

mod models;
mod repository;
mod service;

pub use models::{
    DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL, NewUser, UpdateProfile, User, UserDetail,
};
pub use repository::UserRepository;
pub use service::{MAX_USERNAME_LEN, MIN_PASSWORD_LEN, UserService};
