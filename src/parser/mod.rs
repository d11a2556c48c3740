//! Mailbox parsing: MBOX record splitting, header decoding, message
//! unpacking, and body formatting.

pub mod format;
pub mod header;
pub mod mbox;
pub mod unpack;
