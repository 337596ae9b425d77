//! Segment parser for index/timestamp/text subtitle documents.
//!
//! The parser is tolerant: a break in the numbering never fails, it folds the
//! remaining text into the last replica and records a [`Recovery`] describing
//! where the sequence stopped.

use tracing::{debug, warn};

const TIMESTAMP_MARKER: &str = "-->";

/// One subtitle entry, kept as the verbatim source text from its index line
/// up to the next valid index line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replica<'a> {
    /// Index parsed from the entry's first line, if it was numeric
    pub ordinal: Option<u64>,
    pub text: &'a str,
}

/// Where and why the parser stopped splitting before the end of the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recovery {
    /// Index that was searched for and not found; `None` when the current index was unreadable
    /// or has no successor
    pub expected: Option<u64>,
    /// Byte offset of the replica that absorbed the remaining text
    pub offset: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSubtitle<'a> {
    pub replicas: Vec<Replica<'a>>,
    pub recovery: Option<Recovery>,
}

impl<'a> ParsedSubtitle<'a> {
    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }
}

/// Split raw subtitle text into ordered replicas
pub fn parse_replicas(text: &str) -> ParsedSubtitle<'_> {
    let mut parsed = ParsedSubtitle::default();
    let mut pos = 0;

    while let Some(marker) = text[pos..].find(TIMESTAMP_MARKER) {
        let rest = &text[pos..];
        let header_end = index_line_boundary(rest, marker);

        let Some(current) = leading_integer(&rest[..header_end]) else {
            warn!("Unreadable subtitle index at byte {}, keeping remaining text as one replica", pos);
            parsed.recovery = Some(Recovery { expected: None, offset: pos });
            parsed.replicas.push(Replica { ordinal: None, text: rest });
            pos = text.len();
            break;
        };

        let search_from = marker + TIMESTAMP_MARKER.len();
        let expected = current.checked_add(1);
        match expected.and_then(|next| find_index_line(rest, search_from, next)) {
            Some(next_start) => {
                parsed.replicas.push(Replica { ordinal: Some(current), text: &rest[..next_start] });
                pos += next_start;
            }
            None => {
                if rest[search_from..].contains(TIMESTAMP_MARKER) {
                    warn!(
                        "Subtitle numbering breaks after index {} (byte {}), folding remaining text into one replica",
                        current, pos
                    );
                    parsed.recovery = Some(Recovery { expected, offset: pos });
                }
                parsed.replicas.push(Replica { ordinal: Some(current), text: rest });
                pos = text.len();
                break;
            }
        }
    }

    // A trailing index line with no timestamp still belongs to the document
    if pos < text.len() {
        if let Some(last) = parsed.replicas.last_mut() {
            let start = pos - last.text.len();
            last.text = &text[start..];
        }
    }

    debug!("Parsed {} replicas", parsed.replicas.len());
    parsed
}

/// End of the text that precedes the timestamp line
fn index_line_boundary(rest: &str, marker: usize) -> usize {
    let head = &rest[..marker];
    head.rfind('\n')
        .or_else(|| head.rfind('\r'))
        .unwrap_or(marker)
}

fn leading_integer(header: &str) -> Option<u64> {
    let trimmed = header.trim_start_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
    let digits = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .map_or(trimmed, |end| &trimmed[..end]);
    digits.parse().ok()
}

/// Start of a line consisting of exactly `wanted`, searching from `from`
fn find_index_line(rest: &str, from: usize, wanted: u64) -> Option<usize> {
    let needle = wanted.to_string();
    let bytes = rest.as_bytes();

    rest[from..]
        .match_indices(needle.as_str())
        .map(|(offset, _)| from + offset)
        .find(|&at| {
            let line_start = at > 0 && matches!(bytes[at - 1], b'\n' | b'\r');
            let line_end = matches!(bytes.get(at + needle.len()), Some(b'\n' | b'\r'));
            line_start && line_end
        })
}
