//! `mboxforum`: import mailing-list archives into a Q&A forum store.
//!
//! The library parses MBOX archives into threaded posts and users, keeps
//! them in a [`store::Repository`], and offers the small set of forum
//! actions (votes, subscriptions, rank bumps) that operate on the result.

pub mod config;
pub mod error;
pub mod forum;
pub mod import;
pub mod model;
pub mod parser;
pub mod remote;
pub mod store;
