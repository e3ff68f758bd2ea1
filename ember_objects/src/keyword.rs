//! Keyword table and scanning helpers for the object definition language.

use crate::event::EVENT_COUNT;

pub const KEYWORD_COUNT: usize = 42;

/// Keyword ids. The first [`EVENT_COUNT`] entries are the event keywords,
/// in the same order as the event table.
pub type KeywordId = usize;

pub const KW_EVENT_CREATE: KeywordId = 0;
pub const KW_EVENT_DESTROY: KeywordId = 1;
pub const KW_EVENT_INITIALIZE: KeywordId = 2;
pub const KW_EVENT_FRAME_START: KeywordId = 3;
pub const KW_EVENT_FRAME_END: KeywordId = 4;
pub const KW_EVENT_UPDATE_CUSTOM: KeywordId = 5;
pub const KW_EVENT_UPDATE_GUI: KeywordId = 6;
pub const KW_EVENT_UPDATE: KeywordId = 7;
pub const KW_EVENT_RENDER_CUSTOM: KeywordId = 8;
pub const KW_EVENT_RENDER_GUI: KeywordId = 9;
pub const KW_EVENT_RENDER: KeywordId = 10;
pub const KW_EVENT_CUSTOM: KeywordId = 11;
pub const KW_EVENT_PREPARE: KeywordId = 12;
pub const KW_EVENT_TEST: KeywordId = 13;
pub const KW_EVENT_SLEEP: KeywordId = 14;
pub const KW_EVENT_WAKE: KeywordId = 15;
pub const KW_EVENT_FLAG: KeywordId = 16;
pub const KW_EVENT_PARTITION: KeywordId = 17;
pub const KW_EVENT_NETWORK_SEND: KeywordId = 18;
pub const KW_EVENT_NETWORK_RECEIVE: KeywordId = 19;
pub const KW_INCLUDES: KeywordId = 20;
pub const KW_HEADER_INCLUDES: KeywordId = 21;
pub const KW_SOURCE_INCLUDES: KeywordId = 22;
pub const KW_OBJECT: KeywordId = 23;
pub const KW_PARENT: KeywordId = 24;
pub const KW_COUNT: KeywordId = 25;
pub const KW_BUCKET_SIZE: KeywordId = 26;
pub const KW_HASH: KeywordId = 27;
pub const KW_CATEGORY: KeywordId = 28;
pub const KW_VERSIONS: KeywordId = 29;
pub const KW_ABSTRACT: KeywordId = 30;
pub const KW_NETWORKED: KeywordId = 31;
pub const KW_CONSTRUCTOR: KeywordId = 32;
pub const KW_WRITE: KeywordId = 33;
pub const KW_READ: KeywordId = 34;
pub const KW_SERIALIZE: KeywordId = 35;
pub const KW_DESERIALIZE: KeywordId = 36;
pub const KW_PRIVATE: KeywordId = 37;
pub const KW_PROTECTED: KeywordId = 38;
pub const KW_PUBLIC: KeywordId = 39;
pub const KW_GLOBAL: KeywordId = 40;
pub const KW_FRIEND: KeywordId = 41;

/// Scan order matters: a keyword that prefixes another (`EVENT_UPDATE` and
/// `EVENT_UPDATE_CUSTOM`) must come after the longer form, or the scanner
/// would try the short form first and fail the word-boundary check.
pub const KEYWORDS: [&str; KEYWORD_COUNT] = [
    "EVENT_CREATE",
    "EVENT_DESTROY",
    "EVENT_INITIALIZE",
    "EVENT_FRAME_START",
    "EVENT_FRAME_END",
    "EVENT_UPDATE_CUSTOM",
    "EVENT_UPDATE_GUI",
    "EVENT_UPDATE",
    "EVENT_RENDER_CUSTOM",
    "EVENT_RENDER_GUI",
    "EVENT_RENDER",
    "EVENT_CUSTOM",
    "EVENT_PREPARE",
    "EVENT_TEST",
    "EVENT_SLEEP",
    "EVENT_WAKE",
    "EVENT_FLAG",
    "EVENT_PARTITION",
    "EVENT_NETWORK_SEND",
    "EVENT_NETWORK_RECEIVE",
    "INCLUDES",
    "HEADER_INCLUDES",
    "SOURCE_INCLUDES",
    "OBJECT",
    "PARENT",
    "COUNT",
    "BUCKET_SIZE",
    "HASH",
    "CATEGORY",
    "VERSIONS",
    "ABSTRACT",
    "NETWORKED",
    "CONSTRUCTOR",
    "WRITE",
    "READ",
    "SERIALIZE",
    "DESERIALIZE",
    "PRIVATE",
    "PROTECTED",
    "PUBLIC",
    "GLOBAL",
    "FRIEND",
];

#[derive(Copy, Clone, Debug)]
pub struct KeywordRequirements {
    pub required: bool,
    /// -1 means unlimited.
    pub max_count: i32,
}

const fn req(required: bool, max_count: i32) -> KeywordRequirements {
    KeywordRequirements {
        required,
        max_count,
    }
}

pub const KEYWORD_REQUIREMENTS: [KeywordRequirements; KEYWORD_COUNT] = [
    // Events: at most one body each.
    req(false, 1), // EVENT_CREATE
    req(false, 1), // EVENT_DESTROY
    req(false, 1), // EVENT_INITIALIZE
    req(false, 1), // EVENT_FRAME_START
    req(false, 1), // EVENT_FRAME_END
    req(false, 1), // EVENT_UPDATE_CUSTOM
    req(false, 1), // EVENT_UPDATE_GUI
    req(false, 1), // EVENT_UPDATE
    req(false, 1), // EVENT_RENDER_CUSTOM
    req(false, 1), // EVENT_RENDER_GUI
    req(false, 1), // EVENT_RENDER
    req(false, 1), // EVENT_CUSTOM
    req(false, 1), // EVENT_PREPARE
    req(false, 1), // EVENT_TEST
    req(false, 1), // EVENT_SLEEP
    req(false, 1), // EVENT_WAKE
    req(false, 1), // EVENT_FLAG
    req(false, 1), // EVENT_PARTITION
    req(false, 1), // EVENT_NETWORK_SEND
    req(false, 1), // EVENT_NETWORK_RECEIVE
    // Keywords
    req(false, -1), // INCLUDES
    req(false, -1), // HEADER_INCLUDES
    req(false, -1), // SOURCE_INCLUDES
    req(true, 1),   // OBJECT
    req(false, 1),  // PARENT
    req(false, 1),  // COUNT
    req(false, 1),  // BUCKET_SIZE
    req(false, 1),  // HASH
    req(false, -1), // CATEGORY
    req(false, 1),  // VERSIONS
    req(false, 1),  // ABSTRACT
    req(false, 1),  // NETWORKED
    req(false, -1), // CONSTRUCTOR
    req(false, 1),  // WRITE
    req(false, 1),  // READ
    req(false, 1),  // SERIALIZE
    req(false, 1),  // DESERIALIZE
    req(false, -1), // PRIVATE
    req(false, -1), // PROTECTED
    req(false, -1), // PUBLIC
    req(false, -1), // GLOBAL
    req(false, -1), // FRIEND
];

pub fn is_event_keyword(id: KeywordId) -> bool {
    id < EVENT_COUNT
}

/// A recognized keyword and its body range. `start` points just past the
/// keyword; `end` is the start of the next keyword (or the buffer end).
#[derive(Copy, Clone, Debug)]
pub struct Keyword {
    pub id: KeywordId,
    pub start: usize,
    pub end: usize,
}

/// Characters that may not directly precede or follow a keyword.
pub fn is_word_delimiter(c: u8) -> bool {
    !(c.is_ascii_alphanumeric() || c == b'_')
}

/// `str::find` constrained to `start..end`. Byte based, so offsets that
/// land inside a multi-byte character (possible in comments) are safe.
pub fn find_in(buffer: &str, needle: &str, start: usize, end: usize) -> Option<usize> {
    let end = end.min(buffer.len());
    if start >= end || needle.is_empty() {
        return None;
    }
    buffer.as_bytes()[start..end]
        .windows(needle.len())
        .position(|window| window == needle.as_bytes())
        .map(|i| i + start)
}

/// Position of the `}` closing the first `{` in `start..end`, tracking
/// nested scopes.
pub fn find_closing_brace(buffer: &str, start: usize, end: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut current = start;
    loop {
        let next_open = find_in(buffer, "{", current, end);
        let next_close = find_in(buffer, "}", current, end);

        match (next_open, next_close) {
            (Some(open), Some(close)) if open < close => {
                depth += 1;
                current = open + 1;
            }
            (_, Some(close)) => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
                if depth == 0 {
                    return Some(close);
                }
                current = close + 1;
            }
            _ => return None,
        }
    }
}

/// Finds the keyword's `( ... )` range, requiring non-empty content.
/// Returns the positions of `(` and `)`.
pub fn find_keyword_parentheses(buffer: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let open = find_in(buffer, "(", start, end)?;
    let close = find_in(buffer, ")", start, end)?;
    if open + 1 >= close {
        return None;
    }
    if buffer[open + 1..close].trim().is_empty() {
        return None;
    }
    Some((open, close))
}

/// 1-based line number of `position`.
pub fn line_at(buffer: &str, position: usize) -> usize {
    buffer[..position.min(buffer.len())]
        .bytes()
        .filter(|&b| b == b'\n')
        .count()
        + 1
}

#[cfg(test)]
mod tests {
    use super::{find_closing_brace, find_keyword_parentheses, line_at};

    #[test]
    fn closing_brace_tracks_nesting() {
        let buffer = "EVENT_UPDATE { if( x ) { y(); } }";
        let close = find_closing_brace(buffer, 0, buffer.len()).unwrap();
        assert_eq!(&buffer[close..], "}");
        assert_eq!(close, buffer.len() - 1);
    }

    #[test]
    fn closing_brace_rejects_unbalanced() {
        let buffer = "{ { }";
        assert!(find_closing_brace(buffer, 0, buffer.len()).is_none());
        assert!(find_closing_brace("no braces", 0, 9).is_none());
    }

    #[test]
    fn parentheses_require_content() {
        assert_eq!(find_keyword_parentheses("( player )", 0, 10), Some((0, 9)));
        assert!(find_keyword_parentheses("()", 0, 2).is_none());
        assert!(find_keyword_parentheses("(   )", 0, 5).is_none());
    }

    #[test]
    fn line_numbers() {
        let buffer = "a\nb\nc";
        assert_eq!(line_at(buffer, 0), 1);
        assert_eq!(line_at(buffer, 2), 2);
        assert_eq!(line_at(buffer, 4), 3);
    }
}
