use std::sync::LazyLock;

use regex::Regex;

/// ATX heading: 1-6 marker characters, whitespace, then the heading text
static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.*)$").unwrap());

/// Parses a line as an ATX heading, returning its level and trimmed text.
fn heading_line(line: &str) -> Option<(usize, &str)> {
    let caps = HEADING.captures(line)?;
    let level = caps.get(1)?.as_str().len();
    let text = caps.get(2)?.as_str().trim();
    Some((level, text))
}

fn matches_heading(line: &str, wanted: &str) -> Option<usize> {
    let (level, text) = heading_line(line)?;
    (text.to_lowercase() == wanted.to_lowercase()).then_some(level)
}

/// Extracts the section introduced by `heading`: the heading line itself and
/// everything up to (excluding) the next heading of equal or higher level.
/// Matching is trimmed and case-insensitive. Trailing blank lines are
/// dropped from the slice.
///
/// An empty `heading` returns the whole document unchanged. Returns `None`
/// when no heading matches.
pub fn extract_single(content: &str, heading: &str) -> Option<String> {
    let wanted = heading.trim();
    if wanted.is_empty() {
        return Some(content.to_string());
    }

    let lines: Vec<&str> = content.lines().collect();
    let (start, level) = lines
        .iter()
        .enumerate()
        .find_map(|(i, line)| matches_heading(line, wanted).map(|level| (i, level)))?;

    let end = lines[start + 1..]
        .iter()
        .position(|line| heading_line(line).is_some_and(|(l, _)| l <= level))
        .map_or(lines.len(), |offset| start + 1 + offset);

    Some(join_trimmed(&lines[start..end]))
}

/// Extracts the slice bounded by two headings. `start = None` begins at the
/// document start; a named start heading that does not exist is a hard
/// not-found. `end = None` extracts to the document end. The end heading is
/// located strictly after the start and is excluded, whatever its level.
///
/// When `end` is named but never found after the start, the remainder of the
/// document is returned rather than an error; ranges stay usable when the
/// target document's later sections are renamed.
pub fn extract_range(content: &str, start: Option<&str>, end: Option<&str>) -> Option<String> {
    let lines: Vec<&str> = content.lines().collect();

    let wanted_start = start.map(str::trim).filter(|s| !s.is_empty());
    let (start_idx, end_search_from) = match wanted_start {
        Some(wanted) => {
            let idx = lines
                .iter()
                .position(|line| matches_heading(line, wanted).is_some())?;
            (idx, idx + 1)
        }
        None => (0, 0),
    };

    let wanted_end = end.map(str::trim).filter(|s| !s.is_empty());
    let end_idx = match wanted_end {
        Some(wanted) => lines[end_search_from..]
            .iter()
            .position(|line| matches_heading(line, wanted).is_some())
            .map_or(lines.len(), |offset| end_search_from + offset),
        None => lines.len(),
    };

    Some(join_trimmed(&lines[start_idx..end_idx]))
}

fn join_trimmed(lines: &[&str]) -> String {
    let trimmed_len = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .map_or(0, |i| i + 1);
    lines[..trimmed_len].join("\n")
}
