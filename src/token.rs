use std::sync::LazyLock;

use regex::Regex;

/// Inline code span on a single line, e.g. `` `![[not-a-ref]]` ``
static INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`[^`\n]*`").unwrap());

/// Complete HTML-style comment within one processed unit
static HTML_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<!--.*?-->").unwrap());

/// Heading selector attached to a reference, e.g. `![[api#Usage]]` or
/// `![[api#Setup:Teardown]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadingSelector {
    /// `#Heading` — the named section, ending at the next heading of equal
    /// or higher level.
    Section(String),
    /// `#Start:End` — an explicit range. A missing start means "from
    /// document start", a missing end means "to document end".
    Range {
        start: Option<String>,
        end: Option<String>,
    },
}

/// One transclusion reference found on a line of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceToken {
    /// The full marker text including `![[` and `]]`
    pub original: String,
    /// Referenced path, trimmed, never empty
    pub path: String,
    /// Byte offset of the marker within the source line
    pub start: usize,
    /// Byte offset one past the closing `]]`
    pub end: usize,
    /// Optional heading or heading-range selector
    pub heading: Option<HeadingSelector>,
}

/// Finds all transclusion references on one standalone line, left to right,
/// non-overlapping.
///
/// The opening marker is `![[`; the interior may itself contain balanced
/// `[[`/`]]` pairs, so the closing bracket is located with a depth counter
/// rather than a first-match search. References starting inside an inline
/// code span or an HTML comment are ignored. Malformed markers (unterminated
/// `![[`, empty path) are not recognized and pass through as literal text.
///
/// Never fails, on any input.
pub fn find_references(line: &str) -> Vec<ReferenceToken> {
    find_references_tracked(line, &mut CommentTracker::new())
}

/// Like [`find_references`], but with HTML-comment state carried between
/// calls. Feed every line of a document through the same tracker and
/// references on the interior lines of a multi-line `<!-- ... -->` comment
/// are masked too.
pub fn find_references_tracked(line: &str, comments: &mut CommentTracker) -> Vec<ReferenceToken> {
    let masked = comments.masked_ranges(line);
    let bytes = line.as_bytes();
    let mut tokens = Vec::new();
    let mut cursor = 0;

    while let Some(found) = find_at(bytes, cursor, b"![[") {
        let interior_start = found + 3;
        if is_masked(&masked, found) {
            cursor = interior_start;
            continue;
        }

        let Some(interior_end) = matching_close(bytes, interior_start) else {
            // unterminated marker; a later `![[` may still form a token
            cursor = interior_start;
            continue;
        };
        let token_end = interior_end + 2;
        let interior = &line[interior_start..interior_end];

        if let Some(token) = parse_interior(interior, line, found, token_end) {
            tokens.push(token);
        }
        cursor = token_end;
    }

    tokens
}

/// Scans forward from `from`, counting nested `[[`/`]]` pairs, and returns
/// the byte offset of the `]]` that closes the marker opened before `from`.
fn matching_close(bytes: &[u8], from: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut i = from;
    while i < bytes.len() {
        if bytes[i..].starts_with(b"[[") {
            depth += 1;
            i += 2;
        } else if bytes[i..].starts_with(b"]]") {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
            i += 2;
        } else {
            i += 1;
        }
    }
    None
}

fn find_at(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from > bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Splits a marker interior into path and heading selector. Returns `None`
/// when the trimmed path is empty; such markers are not valid references.
fn parse_interior(interior: &str, line: &str, start: usize, end: usize) -> Option<ReferenceToken> {
    let (path_part, heading_part) = match split_unescaped_hash(interior) {
        Some(at) => (&interior[..at], Some(&interior[at + 1..])),
        None => (interior, None),
    };

    let path = unescape_hash(path_part.trim());
    if path.is_empty() {
        return None;
    }

    let heading = heading_part.and_then(parse_heading_spec);

    Some(ReferenceToken {
        original: line[start..end].to_string(),
        path,
        start,
        end,
        heading,
    })
}

/// Byte offset of the first `#` not preceded by a backslash.
fn split_unescaped_hash(interior: &str) -> Option<usize> {
    let bytes = interior.as_bytes();
    (0..bytes.len()).find(|&i| bytes[i] == b'#' && (i == 0 || bytes[i - 1] != b'\\'))
}

fn unescape_hash(text: &str) -> String {
    text.replace("\\#", "#")
}

fn parse_heading_spec(spec: &str) -> Option<HeadingSelector> {
    let non_empty = |s: &str| {
        let trimmed = unescape_hash(s.trim());
        (!trimmed.is_empty()).then_some(trimmed)
    };

    match spec.find(':') {
        Some(at) => Some(HeadingSelector::Range {
            start: non_empty(&spec[..at]),
            end: non_empty(&spec[at + 1..]),
        }),
        None => non_empty(spec).map(HeadingSelector::Section),
    }
}

/// Tracks HTML-style comments across the lines of one processed unit.
///
/// A `<!--` with no `-->` on the same line leaves the comment open: that
/// line is masked through its end, and every following line is masked up to
/// and including the closing `-->`.
#[derive(Debug, Default)]
pub struct CommentTracker {
    open: bool,
}

impl CommentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte ranges of `line` that must not be scanned for references:
    /// inline code spans, HTML comments (including one carried over from an
    /// earlier line), and the tail after an unterminated `<!--`.
    pub fn masked_ranges(&mut self, line: &str) -> Vec<(usize, usize)> {
        let mut ranges: Vec<(usize, usize)> = Vec::new();
        let mut scan_from = 0;
        if self.open {
            match line.find("-->") {
                Some(close) => {
                    ranges.push((0, close + 3));
                    scan_from = close + 3;
                    self.open = false;
                }
                None => {
                    ranges.push((0, line.len()));
                    return ranges;
                }
            }
        }

        for m in INLINE_CODE.find_iter(line) {
            if m.start() >= scan_from {
                ranges.push((m.start(), m.end()));
            }
        }
        let mut comment_end = scan_from;
        for m in HTML_COMMENT.find_iter(line) {
            if m.start() < scan_from {
                continue;
            }
            ranges.push((m.start(), m.end()));
            comment_end = m.end();
        }
        if let Some(open) = line[comment_end..].find("<!--") {
            ranges.push((comment_end + open, line.len()));
            self.open = true;
        }

        ranges
    }
}

fn is_masked(ranges: &[(usize, usize)], pos: usize) -> bool {
    ranges.iter().any(|&(start, end)| pos >= start && pos < end)
}

/// Tracks multi-line fenced code blocks across a sequence of lines.
///
/// Fences suppress tokenization at the document level: every line from the
/// opening ``` / ~~~ delimiter through the closing delimiter (both included)
/// is passed through without reference scanning.
#[derive(Debug, Default)]
pub struct FenceTracker {
    open: Option<&'static str>,
}

impl FenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the next line; returns `true` when the line is inside (or
    /// delimits) a fenced block and must not be tokenized.
    pub fn observe(&mut self, line: &str) -> bool {
        let trimmed = line.trim_start();
        match self.open {
            Some(marker) => {
                if trimmed.starts_with(marker) {
                    self.open = None;
                }
                true
            }
            None => {
                if trimmed.starts_with("```") {
                    self.open = Some("```");
                    true
                } else if trimmed.starts_with("~~~") {
                    self.open = Some("~~~");
                    true
                } else {
                    false
                }
            }
        }
    }
}
