//! Normalized mailbox messages and the reasons a raw record can be rejected.

use chrono::{DateTime, Utc};

use super::address::Sender;

/// One mailbox record after unpacking.
///
/// Produced by [`crate::parser::unpack::Unpacker`] and consumed once by the
/// import driver; never persisted on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage {
    /// The `Message-ID` header value, angle brackets included (may be empty).
    pub id: String,
    /// The `In-Reply-To` header value, if present.
    pub reply_to: Option<String>,
    /// Subject with the mailing-list tags removed.
    pub subject: String,
    /// Sender, email lower-cased.
    pub sender: Sender,
    /// `Date:` header normalized to UTC.
    pub date: DateTime<Utc>,
    /// Message text. Decoded text after unpacking; formatted markup once the
    /// driver has run the body pipeline.
    pub body: String,
}

/// Why a record did not become a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The raw bytes are not a recognizable message.
    Unparseable,
    /// No `Date:` header, or one that cannot be parsed.
    MissingDate,
    /// No `Subject:` header.
    MissingSubject,
    /// No `text/plain` body part.
    NoTextBody,
    /// The body could not be decoded under its declared or detected charset.
    UndecodableBody,
    /// The sender has no usable address.
    MissingEmail,
    /// The subject was nothing but list tags.
    EmptySubject,
    /// The formatted body exceeds the configured size limit.
    TooLarge,
    /// A reply whose parent was never seen, under the `drop` orphan policy.
    MissingParent,
}

impl SkipReason {
    /// All reasons, in reporting order.
    pub const ALL: [SkipReason; 9] = [
        SkipReason::Unparseable,
        SkipReason::MissingDate,
        SkipReason::MissingSubject,
        SkipReason::NoTextBody,
        SkipReason::UndecodableBody,
        SkipReason::MissingEmail,
        SkipReason::EmptySubject,
        SkipReason::TooLarge,
        SkipReason::MissingParent,
    ];

    /// Short human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            SkipReason::Unparseable => "unparseable",
            SkipReason::MissingDate => "missing date",
            SkipReason::MissingSubject => "missing subject",
            SkipReason::NoTextBody => "no text body",
            SkipReason::UndecodableBody => "undecodable body",
            SkipReason::MissingEmail => "missing email",
            SkipReason::EmptySubject => "empty subject",
            SkipReason::TooLarge => "size",
            SkipReason::MissingParent => "missing parent",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
