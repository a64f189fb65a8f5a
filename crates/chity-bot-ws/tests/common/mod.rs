//! Test utilities

pub mod chat_server;
pub use chat_server::ChatServer;
