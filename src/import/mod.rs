//! Mailbox import pipeline: unpack, link, resolve users, persist.
//!
//! [`driver::Importer`] is the entry point; the other modules are its
//! building blocks and are usable on their own.

pub mod deobfuscate;
pub mod driver;
pub mod finalize;
pub mod linker;
pub mod state;
pub mod users;

pub use driver::{ImportOptions, Importer};
pub use linker::OrphanPolicy;
pub use state::ImportStats;
