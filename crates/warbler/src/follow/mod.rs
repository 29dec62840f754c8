//! Follow graph between users.

mod repository;

pub use repository::FollowRepository;
