//! Messages and likes.

mod models;
mod repository;

pub use models::{MAX_MESSAGE_LEN, Message, TimelineEntry};
pub use repository::MessageRepository;
