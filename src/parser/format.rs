//! Message body cleanup: junk-line removal, line wrapping, container markup.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Default wrap column. Kept short so posts read well on small screens.
pub const LINE_WIDTH: usize = 70;

/// Lines starting (after trimming) with one of these are dropped.
const JUNK_PREFIXES: [&str; 3] = [">", "---", "From:"];

/// Lines containing one of these anywhere are dropped.
const JUNK_WORDS: [&str; 4] = ["scrubbed", "attachment.html", "wrote:", "Sent:"];

const CONTAINER_OPEN: &str = "<div class='preformatted'>";
const CONTAINER_CLOSE: &str = "</div>";

/// Deterministic body formatter.
#[derive(Debug, Clone, Copy)]
pub struct BodyFormatter {
    width: usize,
}

impl Default for BodyFormatter {
    fn default() -> Self {
        Self { width: LINE_WIDTH }
    }
}

impl BodyFormatter {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
        }
    }

    /// Drop quoted and boilerplate lines, wrap the rest, wrap it all in the container.
    ///
    /// Surviving lines keep their order.
    pub fn format(&self, text: &str) -> String {
        let body = text
            .lines()
            .filter(|line| !is_junk(line))
            .map(|line| wrap_line(line, self.width))
            .collect::<Vec<_>>()
            .join("\n");
        format!("{CONTAINER_OPEN}{body}{CONTAINER_CLOSE}")
    }
}

/// Quoted replies, signatures separators, forwarded headers, and list footers.
pub fn is_junk(line: &str) -> bool {
    let trimmed = line.trim();
    JUNK_PREFIXES.iter().any(|p| trimmed.starts_with(p))
        || JUNK_WORDS.iter().any(|w| line.contains(w))
}

/// Tab stop used when expanding tabs.
const TAB_SIZE: usize = 8;

/// Greedy word wrap by display width.
///
/// Tabs expand to the next multiple of eight columns. A line that already
/// fits is returned as is, inner spacing included. Longer lines break at
/// whitespace, dropping the whitespace at each break; words wider than
/// `width` are split.
pub fn wrap_line(line: &str, width: usize) -> String {
    let line = expand_tabs(line.trim_end());
    if line.width() <= width {
        return line;
    }

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;

    for chunk in chunks(&line) {
        let chunk_width = chunk.width();

        if chunk.starts_with(' ') {
            if current.is_empty() && !lines.is_empty() {
                continue;
            }
            current.push_str(chunk);
            current_width += chunk_width;
            continue;
        }

        if current_width + chunk_width <= width {
            current.push_str(chunk);
            current_width += chunk_width;
            continue;
        }

        // Indentation alone is not worth a line of its own.
        if !current.trim().is_empty() {
            lines.push(current.trim_end().to_string());
        }
        current.clear();
        current_width = 0;

        if chunk_width <= width {
            current.push_str(chunk);
            current_width = chunk_width;
            continue;
        }

        // Word longer than a whole line: break it by character width.
        for ch in chunk.chars() {
            let w = ch.width().unwrap_or(0);
            if current_width + w > width && current_width > 0 {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
            }
            current.push(ch);
            current_width += w;
        }
    }

    if !current.trim().is_empty() {
        lines.push(current.trim_end().to_string());
    }
    lines.join("\n")
}

/// Expand tabs to spaces and turn other whitespace controls into spaces.
fn expand_tabs(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut column = 0;
    for ch in line.chars() {
        match ch {
            '\t' => {
                let pad = TAB_SIZE - column % TAB_SIZE;
                out.extend(std::iter::repeat_n(' ', pad));
                column += pad;
            }
            '\r' | '\x0b' | '\x0c' => {
                out.push(' ');
                column += 1;
            }
            _ => {
                out.push(ch);
                column += ch.width().unwrap_or(0);
            }
        }
    }
    out
}

/// Split into alternating runs of spaces and non-spaces.
fn chunks(line: &str) -> impl Iterator<Item = &str> {
    let mut rest = line;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let is_space = first == ' ';
        let end = rest
            .find(|c: char| (c == ' ') != is_space)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}
