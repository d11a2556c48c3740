//! Look-aside fetch for archive messages whose text was moved to an attachment URL.
//!
//! Some pipermail archives replace the message text with a pointer such as
//! `URL: <https://stat.ethz.ch/pipermail/bioconductor/attachments/20090105/1a2b3c4d/attachment.pl>`.
//! The fetcher downloads that text once and keeps it in an on-disk cache
//! keyed by the date and hash path segments, so repeated runs never refetch.
//! Failures never abort an import: they degrade to a placeholder body.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

/// Body substring that marks a truncated archive message.
pub const ARCHIVE_MARKER: &str = "URL: <https://stat.ethz.ch/pipermail";

/// Errors from a single remote fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned status {0}")]
    Status(u16),
}

/// Something that can retrieve the raw bytes behind a URL.
pub trait BodySource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTP source with an explicit per-request timeout.
pub struct HttpSource {
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

impl BodySource for HttpSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.bytes()?.to_vec())
    }
}

/// Replaces truncated archive bodies with their full remote text.
pub struct RemoteBodyFetcher {
    source: Box<dyn BodySource>,
    cache_dir: PathBuf,
    marker: String,
}

impl RemoteBodyFetcher {
    pub fn new(
        source: Box<dyn BodySource>,
        cache_dir: impl Into<PathBuf>,
        marker: impl Into<String>,
    ) -> Self {
        Self {
            source,
            cache_dir: cache_dir.into(),
            marker: marker.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Return the full text for `body`, or `body` itself when it carries no
    /// archive pointer.
    pub fn resolve(&self, body: &str) -> String {
        if !body.contains(&self.marker) {
            return body.to_string();
        }
        let Some(url) = archive_url(body) else {
            return body.to_string();
        };
        let Some(key) = cache_key(&url) else {
            debug!(url = %url, "Archive URL too short for a cache key");
            return body.to_string();
        };

        let cache_file = self.cache_dir.join(&key);
        if cache_file.is_file() {
            match std::fs::read_to_string(&cache_file) {
                Ok(text) => return text,
                Err(e) => {
                    warn!(path = %cache_file.display(), error = %e, "Unreadable cached body, refetching");
                }
            }
        }

        info!(url = %url, ">>> fetching");
        let text = match self.source.fetch(&url) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => {
                    warn!(url = %url, error = %e, "Remote body is not valid UTF-8");
                    format!("Error: unable to decode {url}")
                }
            },
            Err(e) => {
                // Not cached: a later run gets another chance.
                warn!(url = %url, error = %e, "Remote fetch failed");
                return format!("Error: unable to fetch {url}");
            }
        };

        if let Err(e) = self.store(&cache_file, &text) {
            warn!(path = %cache_file.display(), error = %e, "Could not cache remote body");
        }
        text
    }

    fn store(&self, path: &Path, text: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.cache_dir)?;
        std::fs::write(path, text)
    }
}

/// The URL of the first `URL:` line, angle brackets removed.
pub fn archive_url(body: &str) -> Option<String> {
    let line = body.lines().find(|l| l.starts_with("URL:"))?;
    let token = line.split_whitespace().nth(1)?;
    let inner = token.strip_prefix('<').unwrap_or(token);
    let inner = inner.strip_suffix('>').unwrap_or(inner);
    if inner.is_empty() {
        None
    } else {
        Some(inner.to_string())
    }
}

/// Cache key: the third- and second-to-last path segments joined.
///
/// `.../attachments/20090105/1a2b3c4d/attachment.pl` → `200901051a2b3c4d`.
pub fn cache_key(url: &str) -> Option<String> {
    let elems: Vec<&str> = url.split('/').collect();
    if elems.len() < 3 {
        return None;
    }
    let key: String = format!("{}{}", elems[elems.len() - 3], elems[elems.len() - 2])
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_' || *c == '.')
        .collect();
    if key.is_empty() || key.chars().all(|c| c == '.') {
        None
    } else {
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    const URL: &str =
        "https://stat.ethz.ch/pipermail/bioconductor/attachments/20090105/1a2b3c4d/attachment.pl";

    struct StubSource {
        reply: Result<Vec<u8>, u16>,
        calls: Rc<Cell<usize>>,
    }

    impl BodySource for StubSource {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.set(self.calls.get() + 1);
            self.reply.clone().map_err(FetchError::Status)
        }
    }

    fn fetcher(reply: Result<Vec<u8>, u16>, dir: &Path) -> (RemoteBodyFetcher, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let source = StubSource {
            reply,
            calls: Rc::clone(&calls),
        };
        (
            RemoteBodyFetcher::new(Box::new(source), dir, ARCHIVE_MARKER),
            calls,
        )
    }

    fn truncated_body() -> String {
        format!("-------------- next part --------------\nURL: <{URL}>\n")
    }

    #[test]
    fn test_archive_url_and_key() {
        let url = archive_url(&truncated_body()).unwrap();
        assert_eq!(url, URL);
        assert_eq!(cache_key(&url).unwrap(), "200901051a2b3c4d");
        assert!(cache_key("a/b").is_none());
    }

    #[test]
    fn test_plain_body_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let (f, calls) = fetcher(Ok(b"x".to_vec()), dir.path());
        assert_eq!(f.resolve("just text"), "just text");
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_fetch_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let (f, calls) = fetcher(Ok(b"full remote text".to_vec()), dir.path());
        assert_eq!(f.resolve(&truncated_body()), "full remote text");
        assert_eq!(f.resolve(&truncated_body()), "full remote text");
        assert_eq!(calls.get(), 1);
        assert!(dir.path().join("200901051a2b3c4d").is_file());
    }

    #[test]
    fn test_undecodable_remote_body_is_placeholder_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let (f, _) = fetcher(Ok(vec![0xff, 0xfe]), dir.path());
        let text = f.resolve(&truncated_body());
        assert_eq!(text, format!("Error: unable to decode {URL}"));
        assert!(dir.path().join("200901051a2b3c4d").is_file());
    }

    #[test]
    fn test_network_failure_is_placeholder_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let (f, calls) = fetcher(Err(503), dir.path());
        assert_eq!(
            f.resolve(&truncated_body()),
            format!("Error: unable to fetch {URL}")
        );
        f.resolve(&truncated_body());
        assert_eq!(calls.get(), 2);
        assert!(!dir.path().join("200901051a2b3c4d").exists());
    }
}
