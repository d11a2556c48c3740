//! Core data model types: senders, parsed messages, users, posts, votes.

pub mod address;
pub mod forum;
pub mod message;
pub mod post;
pub mod user;
