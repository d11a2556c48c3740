//! RFC 5322 header access: unfolding, encoded-word decoding, and date parsing.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use mail_parser::MessageParser;
use tracing::debug;

/// The unfolded header section of one message.
///
/// Names are lower-cased; values are raw (still RFC 2047 encoded).
#[derive(Debug, Default)]
pub struct HeaderBlock {
    fields: Vec<(String, String)>,
}

impl HeaderBlock {
    /// Parse the header section of a raw message (everything up to the first blank line).
    pub fn parse(message: &[u8]) -> Self {
        let text = decode_header_bytes(header_section(message));
        let mut fields: Vec<(String, String)> = Vec::new();

        for line in text.lines() {
            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some(last) = fields.last_mut() {
                    last.1.push(' ');
                    last.1.push_str(line.trim());
                }
            } else if let Some(colon) = line.find(':') {
                let name = line[..colon].trim().to_lowercase();
                let value = line[colon + 1..].trim().to_string();
                fields.push((name, value));
            }
        }

        Self { fields }
    }

    /// First value of a header (case-insensitive), `None` if absent or blank.
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.fields
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    /// First value with RFC 2047 encoded-words resolved.
    pub fn get_decoded(&self, name: &str) -> Option<String> {
        self.get(name).map(decode_encoded_words)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Bytes before the first blank line.
fn header_section(message: &[u8]) -> &[u8] {
    let mut start = 0;
    while start < message.len() {
        let end = message[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| start + p + 1)
            .unwrap_or(message.len());
        let line = &message[start..end];
        if line.iter().all(|&b| b == b'\n' || b == b'\r') {
            return &message[..start];
        }
        start = end;
    }
    message
}

/// Decode raw header bytes to a string: UTF-8, else Windows-1252 (accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Resolve RFC 2047 encoded-words in a header value.
///
/// Example: `"Re: =?UTF-8?B?SG9sYQ==?= there"` → `"Re: Hola there"`.
/// Values without encoded-words are returned unchanged.
pub fn decode_encoded_words(input: &str) -> String {
    if !input.contains("=?") {
        return input.to_string();
    }
    // Wrap in a minimal message so mail-parser applies its charset tables.
    let fake_msg = format!("Subject: {input}\r\n\r\n");
    MessageParser::default()
        .parse(fake_msg.as_bytes())
        .and_then(|m| m.subject().map(str::to_string))
        .unwrap_or_else(|| input.to_string())
}

/// Extract the `<...>` token of a Message-ID / In-Reply-To value.
///
/// Values without brackets are returned trimmed.
pub fn extract_angle_bracket(s: &str) -> String {
    let trimmed = s.trim();
    if let Some(start) = trimmed.find('<') {
        if let Some(end) = trimmed[start..].find('>') {
            return trimmed[start..start + end + 1].to_string();
        }
    }
    trimmed.to_string()
}

/// Parse an RFC 2822 style date and normalize it to UTC.
///
/// Accepts the strict form plus the usual archive damage: missing
/// day-of-week, named zones (`EST`, `GMT`), a trailing `(PDT)` comment,
/// and no zone at all (taken as UTC).
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = strip_zone_comment(date_str.trim());
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let candidate = numeric_zone(strip_day_of_week(trimmed));

    const FORMATS: [&str; 4] = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M %z",
        "%b %d %H:%M:%S %Y %z",
        "%b %d %H:%M:%S %Y",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&candidate, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%d %b %Y %H:%M:%S", "%d %b %Y %H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&candidate, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    debug!(date = trimmed, "Could not parse date");
    None
}

/// Last resort: let `mail-parser` try its lenient date grammar.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    let fake_msg = format!("Date: {input}\r\n\r\n");
    let parsed = MessageParser::default().parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&dt)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// `"Tue, 3 Mar 2009 10:00:00 -0800 (PST)"` → without the `(PST)` comment.
fn strip_zone_comment(s: &str) -> &str {
    match s.rfind('(') {
        Some(pos) if s.ends_with(')') => s[..pos].trim_end(),
        _ => s,
    }
}

fn strip_day_of_week(s: &str) -> &str {
    let first = s.split_whitespace().next().unwrap_or("");
    let day = first.trim_end_matches(',');
    let is_day = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
        .iter()
        .any(|d| d.eq_ignore_ascii_case(day));
    if is_day {
        s[first.len()..].trim_start()
    } else {
        s
    }
}

/// Replace a trailing zone abbreviation with its numeric offset.
fn numeric_zone(s: &str) -> String {
    const ZONES: [(&str, &str); 13] = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("UT", "+0000"),
        ("CEST", "+0200"),
        ("CET", "+0100"),
    ];
    if let Some(last) = s.split_whitespace().last() {
        for (name, offset) in ZONES {
            if last.eq_ignore_ascii_case(name) {
                return format!("{}{}", &s[..s.len() - last.len()], offset);
            }
        }
    }
    s.to_string()
}
