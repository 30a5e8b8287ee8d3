//! Scripture reference parsing.
//!
//! Turns `"John 3:16"`, `"1 Cor 13:4-7"` or `"Romans 8:28–30"` into a
//! [`ParsedReference`]. Parsing never fails: text without a recognizable
//! `chapter:verse` pattern degrades to a single-verse reference with no book,
//! which still goes through the absolute verse cap.
//!
//! Ranges that cross chapters (`"John 3:16-4:2"`) cannot be counted exactly
//! without per-chapter totals. They are counted as an upper bound: every
//! chapter is assumed to be as long as the longest one, capped at the book's
//! total when the book is known.

use super::catalog;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// `Book C:V` with an optional `-V2` or `-C2:V2` (hyphen, en-dash or em-dash).
/// Lowercase letter suffixes (`16b`) are matched and dropped from the numbers.
static REFERENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?P<book>[123]?\s*[A-Za-z][A-Za-z.\s]*?)\s*(?P<chapter>\d+):(?P<start>\d+)[a-z]*(?:\s*[-\x{2013}\x{2014}]\s*(?:(?P<end_chapter>\d+):)?(?P<end>\d+)[a-z]*)?",
    )
    .expect("reference pattern compiles")
});

/// A structured verse range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedReference {
    /// The reference text as given, suffixes included.
    pub text: String,

    /// Canonical book name, or `None` when the text did not parse.
    pub book: Option<String>,

    /// Chapter number (0 when unparsed).
    pub chapter: u32,

    /// Chapter holding the last verse; equals `chapter` unless the range
    /// crosses chapters.
    pub chapter_end: u32,

    /// First verse of the range.
    pub verse_start: u32,

    /// Last verse of the range, numbered within `chapter_end`.
    pub verse_end: u32,

    /// Verses in the range, never less than 1. Exact within one chapter,
    /// an upper bound across chapters.
    pub verse_count: u32,
}

impl ParsedReference {
    fn unresolved(text: &str) -> Self {
        Self {
            text: text.to_string(),
            book: None,
            chapter: 0,
            chapter_end: 0,
            verse_start: 1,
            verse_end: 1,
            verse_count: 1,
        }
    }
}

/// Parse a reference string.
pub fn parse(text: &str) -> ParsedReference {
    let Some(caps) = REFERENCE_RE.captures(text) else {
        return ParsedReference::unresolved(text);
    };

    let book = catalog::canonicalize(&caps["book"]);
    // Overflowing numbers saturate so an absurd range is over-counted, not under.
    let number = |name: &str| -> u32 {
        caps.name(name)
            .map(|m| m.as_str().parse().unwrap_or(u32::MAX))
            .unwrap_or(0)
    };

    let chapter = number("chapter");
    let verse_start = number("start");
    let verse_end = match caps.name("end") {
        Some(_) => number("end"),
        None => verse_start,
    };
    let chapter_end = match caps.name("end_chapter") {
        Some(_) => number("end_chapter"),
        None => chapter,
    };

    let verse_count = if chapter_end > chapter {
        cross_chapter_bound(&book, chapter, chapter_end, verse_start, verse_end)
    } else if chapter_end == chapter {
        verse_end.saturating_sub(verse_start).saturating_add(1)
    } else {
        1
    }
    .max(1);

    ParsedReference {
        text: text.to_string(),
        book: Some(book),
        chapter,
        chapter_end,
        verse_start,
        verse_end,
        verse_count,
    }
}

/// Upper bound on the verses from `chapter:verse_start` to `chapter_end:verse_end`.
fn cross_chapter_bound(
    book: &str,
    chapter: u32,
    chapter_end: u32,
    verse_start: u32,
    verse_end: u32,
) -> u32 {
    let max = catalog::MAX_CHAPTER_VERSES;
    let first = max.saturating_sub(verse_start).saturating_add(1);
    let middle = (chapter_end - chapter - 1).saturating_mul(max);
    let last = verse_end.min(max);
    let bound = first.saturating_add(middle).saturating_add(last);

    match catalog::total_verses(book) {
        Some(total) => bound.min(total),
        None => bound,
    }
}
