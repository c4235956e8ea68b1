pub mod chat;
pub mod events;
pub mod replies;
pub mod transcript;
