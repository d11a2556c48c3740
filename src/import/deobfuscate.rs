//! Undo list-archive address obfuscation (`jdoe at example.org`) on
//! `From: ` lines.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{ImportError, Result};

const FROM_PREFIX: &[u8] = b"From: ";
const OBFUSCATED_AT: &[u8] = b" at ";

/// Rewrite one line: `" at "` becomes `"@"` on lines starting with `From: `.
pub fn deobfuscate_line(line: &[u8]) -> Cow<'_, [u8]> {
    if !line.starts_with(FROM_PREFIX) || find(line, OBFUSCATED_AT).is_none() {
        return Cow::Borrowed(line);
    }
    let mut out = Vec::with_capacity(line.len());
    let mut rest = line;
    while let Some(pos) = find(rest, OBFUSCATED_AT) {
        out.extend_from_slice(&rest[..pos]);
        out.push(b'@');
        rest = &rest[pos + OBFUSCATED_AT.len()..];
    }
    out.extend_from_slice(rest);
    Cow::Owned(out)
}

/// Apply [`deobfuscate_line`] to every line of a raw record.
pub fn deobfuscate_record(raw: &[u8]) -> Cow<'_, [u8]> {
    let touched = raw
        .split_inclusive(|&b| b == b'\n')
        .any(|line| matches!(deobfuscate_line(line), Cow::Owned(_)));
    if !touched {
        return Cow::Borrowed(raw);
    }
    let mut out = Vec::with_capacity(raw.len());
    for line in raw.split_inclusive(|&b| b == b'\n') {
        out.extend_from_slice(&deobfuscate_line(line));
    }
    Cow::Owned(out)
}

/// Where the rewritten copy of `source` goes inside `work_dir`.
pub fn deobfuscated_path(work_dir: &Path, source: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mbox".to_string());
    work_dir.join(format!("deobfuscated-{name}"))
}

/// Write a de-obfuscated copy of `source` to `dest`. Returns the number of
/// lines changed.
pub fn write_deobfuscated(source: &Path, dest: &Path) -> Result<u64> {
    info!("*** fixing obfuscated emails: {}", dest.display());
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| ImportError::io(parent, e))?;
        }
    }

    let input = File::open(source).map_err(|e| ImportError::io(source, e))?;
    let mut reader = BufReader::new(input);
    let output = File::create(dest).map_err(|e| ImportError::io(dest, e))?;
    let mut writer = BufWriter::new(output);

    let mut changed = 0u64;
    let mut line = Vec::with_capacity(4096);
    loop {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .map_err(|e| ImportError::io(source, e))?;
        if n == 0 {
            break;
        }
        let fixed = deobfuscate_line(&line);
        if matches!(fixed, Cow::Owned(_)) {
            changed += 1;
        }
        writer
            .write_all(&fixed)
            .map_err(|e| ImportError::io(dest, e))?;
    }
    writer.flush().map_err(|e| ImportError::io(dest, e))?;
    Ok(changed)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
