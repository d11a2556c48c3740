//! Streaming MBOX reader.
//!
//! Reads the archive line by line through a buffered reader and hands each
//! raw record to a callback. Never loads the whole file into memory.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{ImportError, Result};

/// Size of the internal read buffer.
const READ_BUFFER_SIZE: usize = 256 * 1024;

/// Records larger than this are truncated (the tail is dropped).
const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Progress is reported at most once per this many bytes.
const PROGRESS_INTERVAL: u64 = 1024 * 1024;

/// Sequential MBOX record splitter.
///
/// Tolerates mixed `\n` / `\r\n` line endings, a UTF-8 BOM, `From ` lines
/// without a preceding blank line (logged), and a truncated final record.
pub struct MboxReader {
    path: PathBuf,
    file_size: u64,
}

impl MboxReader {
    /// Open a reader for the given file. Does not validate the format.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ImportError::FileNotFound(path.clone())
            } else {
                ImportError::io(&path, e)
            }
        })?;
        Ok(Self {
            path,
            file_size: metadata.len(),
        })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Walk the archive, calling `on_record` with each raw record
    /// (separator line included).
    ///
    /// The callback returns `false` to stop early; records after that point
    /// are never read. Returns the number of records delivered.
    pub fn for_each_record(
        &self,
        on_record: &mut dyn FnMut(&[u8]) -> bool,
        progress: Option<&dyn Fn(u64, u64)>,
    ) -> Result<u64> {
        if self.file_size == 0 {
            return Ok(0);
        }

        let file = File::open(&self.path).map_err(|e| ImportError::io(&self.path, e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let mut delivered: u64 = 0;
        let mut record: Vec<u8> = Vec::with_capacity(64 * 1024);
        let mut line: Vec<u8> = Vec::with_capacity(4096);
        let mut prev_blank = true;
        let mut truncated = false;
        let mut bytes_read: u64 = 0;
        let mut last_progress: u64 = 0;

        loop {
            line.clear();
            let n = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| ImportError::io(&self.path, e))?;
            if n == 0 {
                break;
            }

            if is_mbox_separator(&line) {
                if !prev_blank && !record.is_empty() {
                    warn!(
                        offset = bytes_read,
                        "Found 'From ' separator without preceding blank line"
                    );
                }
                if !record.is_empty() {
                    delivered += 1;
                    if !on_record(&record) {
                        return Ok(delivered);
                    }
                }
                record.clear();
                truncated = false;
                record.extend_from_slice(&line);
            } else if record.len() + line.len() <= MAX_MESSAGE_SIZE {
                record.extend_from_slice(&line);
            } else if !truncated {
                warn!(
                    offset = bytes_read,
                    max_size = MAX_MESSAGE_SIZE,
                    "Record exceeds maximum size, truncating"
                );
                truncated = true;
            }

            prev_blank = is_blank_line(&line);
            bytes_read += n as u64;

            if let Some(cb) = progress {
                if bytes_read - last_progress >= PROGRESS_INTERVAL {
                    cb(bytes_read, self.file_size);
                    last_progress = bytes_read;
                }
            }
        }

        if !record.is_empty() {
            delivered += 1;
            on_record(&record);
        }

        if let Some(cb) = progress {
            cb(self.file_size, self.file_size);
        }

        Ok(delivered)
    }
}

/// Check whether a line is an MBOX separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    strip_bom(line).starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}

pub(crate) fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}

/// Skip the `From ` separator line at the start of a record.
pub(crate) fn skip_separator(data: &[u8]) -> &[u8] {
    let data = strip_bom(data);
    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}
