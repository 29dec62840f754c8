//! Warbler account store
//!
//! Users, credentials, the follow graph and messages for a Warbler-style
//! microblog, persisted in SQLite. Every operation runs on an explicitly
//! opened [`db::Session`].

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod follow;
pub mod logging;
pub mod message;
pub mod user;

pub use error::{DuplicateField, WarblerError, WarblerResult};
