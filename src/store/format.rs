//! Store snapshot file format.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ HEADER (128 bytes, fixed)            │
//! │  magic: [u8; 8] = b"MBOXFRM\0"      │
//! │  version: u32                        │
//! │  flags: u32                          │
//! │  user_count: u64                     │
//! │  post_count: u64                     │
//! │  payload_len: u64                    │
//! │  sha256_payload: [u8; 32]           │
//! │  (padding to 128 bytes)              │
//! ├──────────────────────────────────────┤
//! │ PAYLOAD (variable)                   │
//! │  bincode-serialized MemoryRepository │
//! └──────────────────────────────────────┘
//! ```

use sha2::{Digest, Sha256};

/// Magic bytes identifying a forum store snapshot.
pub const MAGIC: &[u8; 8] = b"MBOXFRM\0";

/// Current snapshot format version.
pub const VERSION: u32 = 1;

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 128;

/// Serializable snapshot header.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct SnapshotHeader {
    pub magic: [u8; 8],
    pub version: u32,
    /// Reserved.
    pub flags: u32,
    pub user_count: u64,
    pub post_count: u64,
    /// Length of the payload following the header.
    pub payload_len: u64,
    pub sha256_payload: [u8; 32],
}

impl SnapshotHeader {
    /// Header describing `payload`.
    pub fn for_payload(payload: &[u8], user_count: u64, post_count: u64) -> Self {
        Self {
            magic: *MAGIC,
            version: VERSION,
            flags: 0,
            user_count,
            post_count,
            payload_len: payload.len() as u64,
            sha256_payload: sha256(payload),
        }
    }

    /// Check magic and version.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.magic != *MAGIC {
            return Err("Invalid magic bytes".into());
        }
        if self.version != VERSION {
            return Err(format!(
                "Incompatible version: expected {VERSION}, found {}",
                self.version
            ));
        }
        Ok(())
    }

    /// Check that `payload` is exactly what this header was written for.
    pub fn verify_payload(&self, payload: &[u8]) -> std::result::Result<(), String> {
        if payload.len() as u64 != self.payload_len {
            return Err(format!(
                "Payload length mismatch: expected {}, found {}",
                self.payload_len,
                payload.len()
            ));
        }
        if sha256(payload) != self.sha256_payload {
            return Err("Payload checksum mismatch".into());
        }
        Ok(())
    }
}

pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}
