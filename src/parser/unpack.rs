//! Turns one raw mailbox record into a [`ParsedMessage`].
//!
//! Pure transform: no I/O, no logging above `debug`. Bodies without a
//! declared charset are read as UTF-8, falling back to Windows-1252.

use mail_parser::decoders::base64::base64_decode;
use mail_parser::decoders::quoted_printable::quoted_printable_decode;
use mail_parser::{Encoding, MessageParser, MimeHeaders, PartType};
use tracing::debug;

use crate::model::address::Sender;
use crate::model::message::{ParsedMessage, SkipReason};

use super::header::{extract_angle_bracket, parse_date, HeaderBlock};
use super::mbox::skip_separator;

/// Mailing-list tags removed from subjects by default (exact, case-sensitive).
pub const LIST_TAGS: [&str; 4] = ["[Galaxy-user]", "[Galaxy-User]", "[galaxy-user]", "[BioC]"];

/// Message unpacker.
#[derive(Debug, Clone)]
pub struct Unpacker {
    strip_prefixes: Vec<String>,
}

impl Default for Unpacker {
    fn default() -> Self {
        Self {
            strip_prefixes: LIST_TAGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Unpacker {
    /// An unpacker removing the given literal tags from subjects.
    pub fn new(strip_prefixes: &[String]) -> Self {
        Self {
            strip_prefixes: strip_prefixes.to_vec(),
        }
    }

    /// Unpack one raw record (with or without its `From ` separator line).
    ///
    /// The returned body is the decoded `text/plain` part, not yet formatted.
    pub fn unpack(&self, raw: &[u8]) -> Result<ParsedMessage, SkipReason> {
        let bytes = skip_separator(raw);
        let headers = HeaderBlock::parse(bytes);
        if headers.is_empty() {
            return Err(SkipReason::Unparseable);
        }

        let sender = headers
            .get_decoded("from")
            .map(|f| Sender::parse(&f))
            .unwrap_or_default();

        let raw_date = headers.get("date").ok_or(SkipReason::MissingDate)?;
        let subject = headers
            .get_decoded("subject")
            .ok_or(SkipReason::MissingSubject)?;
        let date = parse_date(raw_date).ok_or(SkipReason::MissingDate)?;

        let id = headers
            .get("message-id")
            .map(extract_angle_bracket)
            .unwrap_or_default();
        let reply_to = headers
            .get("in-reply-to")
            .map(extract_angle_bracket)
            .filter(|s| !s.is_empty());

        let body = text_body(bytes)?;

        Ok(ParsedMessage {
            id,
            reply_to,
            subject: self.strip_tags(&subject),
            sender,
            date,
            body,
        })
    }

    /// Remove every configured tag; nothing else in the subject changes.
    pub fn strip_tags(&self, subject: &str) -> String {
        let mut out = subject.to_string();
        for tag in &self.strip_prefixes {
            if !tag.is_empty() {
                out = out.replace(tag.as_str(), "");
            }
        }
        out
    }
}

/// Decoded first `text/plain` body part.
fn text_body(bytes: &[u8]) -> Result<String, SkipReason> {
    let msg = MessageParser::default()
        .parse(bytes)
        .ok_or(SkipReason::Unparseable)?;

    // mail-parser falls back to the HTML part when there is no plain-text
    // alternative; that is not a text body.
    let text_part = msg.text_part(0).ok_or(SkipReason::NoTextBody)?;
    let PartType::Text(text) = &text_part.body else {
        return Err(SkipReason::NoTextBody);
    };

    // Invalid sequences come back as U+FFFD.
    if !text.contains('\u{FFFD}') {
        return Ok(text.to_string());
    }

    let declared = text_part
        .content_type()
        .and_then(|ct| ct.attribute("charset"))
        .is_some();
    if declared {
        debug!("Body does not decode under its declared charset");
        return Err(SkipReason::UndecodableBody);
    }

    let raw = msg
        .raw_message
        .get(text_part.raw_body_offset()..text_part.raw_end_offset())
        .ok_or(SkipReason::UndecodableBody)?;
    let content = match text_part.encoding {
        Encoding::None => raw.to_vec(),
        Encoding::QuotedPrintable => {
            quoted_printable_decode(raw).ok_or(SkipReason::UndecodableBody)?
        }
        Encoding::Base64 => base64_decode(raw).ok_or(SkipReason::UndecodableBody)?,
    };
    Ok(decode_undeclared(content))
}

/// Bytes with no declared charset: UTF-8 when valid, else Windows-1252.
///
/// Windows-1252 maps every byte, so legacy 8-bit bodies always decode.
fn decode_undeclared(content: Vec<u8>) -> String {
    match String::from_utf8(content) {
        Ok(text) => text,
        Err(e) => {
            debug!("Undeclared 8-bit body, decoding as windows-1252");
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(e.as_bytes());
            decoded.into_owned()
        }
    }
}
