//! Sender address parsing (RFC 5322 §3.4).

/// The sender of a mailing-list message.
///
/// # Examples
/// - `"Juan García <Juan@Ejemplo.com>"` → `name = "Juan García"`, `email = "juan@ejemplo.com"`
/// - `"user@example.com (User One)"` → `name = "User One"`, `email = "user@example.com"`
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Sender {
    /// Human-readable display name (may be empty).
    pub name: String,
    /// The bare address, lower-cased so it can be used as an identity key.
    pub email: String,
}

impl Sender {
    /// Parse a `From:` header value.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    /// - `"user@domain.com (Display Name)"` (old pipermail style)
    ///
    /// Anything without an `@` yields an empty email, which the import
    /// driver filters out.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let Some(angle_start) = trimmed.rfind('<') {
            if let Some(angle_end) = trimmed.rfind('>') {
                if angle_end > angle_start {
                    let addr = trimmed[angle_start + 1..angle_end].trim();
                    return Self {
                        name: strip_quotes(&trimmed[..angle_start]),
                        email: normalize_email(addr),
                    };
                }
            }
        }

        // "addr (Name)"
        if let (Some(open), Some(close)) = (trimmed.find('('), trimmed.rfind(')')) {
            if close > open {
                return Self {
                    name: strip_quotes(&trimmed[open + 1..close]),
                    email: normalize_email(trimmed[..open].trim()),
                };
            }
        }

        Self {
            name: String::new(),
            email: normalize_email(trimmed),
        }
    }

    /// Display name, or the local part of the address when no name was given.
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            return &self.name;
        }
        self.email.split('@').next().unwrap_or("")
    }
}

fn normalize_email(addr: &str) -> String {
    if addr.contains('@') && !addr.contains(char::is_whitespace) {
        addr.to_lowercase()
    } else {
        String::new()
    }
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.email)
        } else {
            write!(f, "{} <{}>", self.name, self.email)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_address_is_lowercased() {
        let s = Sender::parse("User@Example.COM");
        assert_eq!(s.email, "user@example.com");
        assert_eq!(s.name, "");
        assert_eq!(s.display_name(), "user");
    }

    #[test]
    fn test_parse_name_and_address() {
        let s = Sender::parse("User One <User1@Example.com>");
        assert_eq!(s.email, "user1@example.com");
        assert_eq!(s.name, "User One");
    }

    #[test]
    fn test_parse_quoted_name() {
        let s = Sender::parse("\"Last, First\" <user@example.com>");
        assert_eq!(s.name, "Last, First");
        assert_eq!(s.email, "user@example.com");
    }

    #[test]
    fn test_parse_pipermail_style() {
        let s = Sender::parse("jdoe@lists.example.org (John Doe)");
        assert_eq!(s.email, "jdoe@lists.example.org");
        assert_eq!(s.name, "John Doe");
    }

    #[test]
    fn test_obfuscated_address_has_no_email() {
        let s = Sender::parse("jdoe at example.org (John Doe)");
        assert_eq!(s.email, "");
    }

    #[test]
    fn test_display() {
        let s = Sender::parse("Alice <alice@example.com>");
        assert_eq!(s.to_string(), "Alice <alice@example.com>");
    }
}
