//! Data models for chat entities
//!
//! Everything here is stored as whole JSON arrays in the shared store, so
//! the serde shape is the on-disk format. Field names are camelCase and
//! timestamps are unix milliseconds.

mod chat;
mod friend;
mod message;
mod user;

pub use chat::*;
pub use friend::*;
pub use message::*;
pub use user::*;
