//! Canonical book names, verse totals and common abbreviations.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// The 66 canonical books with their total verse counts.
pub const BOOK_VERSES: [(&str, u32); 66] = [
    ("Genesis", 1533),
    ("Exodus", 1213),
    ("Leviticus", 859),
    ("Numbers", 1288),
    ("Deuteronomy", 959),
    ("Joshua", 658),
    ("Judges", 618),
    ("Ruth", 85),
    ("1 Samuel", 810),
    ("2 Samuel", 695),
    ("1 Kings", 816),
    ("2 Kings", 719),
    ("1 Chronicles", 942),
    ("2 Chronicles", 822),
    ("Ezra", 280),
    ("Nehemiah", 406),
    ("Esther", 167),
    ("Job", 1070),
    ("Psalms", 2461),
    ("Proverbs", 915),
    ("Ecclesiastes", 222),
    ("Song of Solomon", 117),
    ("Isaiah", 1292),
    ("Jeremiah", 1364),
    ("Lamentations", 154),
    ("Ezekiel", 1273),
    ("Daniel", 357),
    ("Hosea", 197),
    ("Joel", 73),
    ("Amos", 146),
    ("Obadiah", 21),
    ("Jonah", 48),
    ("Micah", 105),
    ("Nahum", 47),
    ("Habakkuk", 56),
    ("Zephaniah", 53),
    ("Haggai", 38),
    ("Zechariah", 211),
    ("Malachi", 55),
    ("Matthew", 1071),
    ("Mark", 678),
    ("Luke", 1151),
    ("John", 879),
    ("Acts", 1007),
    ("Romans", 433),
    ("1 Corinthians", 437),
    ("2 Corinthians", 257),
    ("Galatians", 149),
    ("Ephesians", 155),
    ("Philippians", 104),
    ("Colossians", 95),
    ("1 Thessalonians", 89),
    ("2 Thessalonians", 47),
    ("1 Timothy", 113),
    ("2 Timothy", 83),
    ("Titus", 46),
    ("Philemon", 25),
    ("Hebrews", 303),
    ("James", 108),
    ("1 Peter", 105),
    ("2 Peter", 61),
    ("1 John", 105),
    ("2 John", 13),
    ("3 John", 14),
    ("Jude", 25),
    ("Revelation", 404),
];

/// Abbreviation → canonical name.
const ALIASES: &[(&str, &str)] = &[
    ("Gen", "Genesis"),
    ("Exod", "Exodus"),
    ("Exo", "Exodus"),
    ("Lev", "Leviticus"),
    ("Num", "Numbers"),
    ("Deut", "Deuteronomy"),
    ("Josh", "Joshua"),
    ("Judg", "Judges"),
    ("1 Sam", "1 Samuel"),
    ("2 Sam", "2 Samuel"),
    ("1 Kgs", "1 Kings"),
    ("2 Kgs", "2 Kings"),
    ("1 Chr", "1 Chronicles"),
    ("2 Chr", "2 Chronicles"),
    ("Neh", "Nehemiah"),
    ("Esth", "Esther"),
    ("Ps", "Psalms"),
    ("Psa", "Psalms"),
    ("Psalm", "Psalms"),
    ("Prov", "Proverbs"),
    ("Eccl", "Ecclesiastes"),
    ("Song", "Song of Solomon"),
    ("Song of Songs", "Song of Solomon"),
    ("Isa", "Isaiah"),
    ("Jer", "Jeremiah"),
    ("Lam", "Lamentations"),
    ("Ezek", "Ezekiel"),
    ("Dan", "Daniel"),
    ("Hos", "Hosea"),
    ("Obad", "Obadiah"),
    ("Jon", "Jonah"),
    ("Mic", "Micah"),
    ("Nah", "Nahum"),
    ("Hab", "Habakkuk"),
    ("Zeph", "Zephaniah"),
    ("Hag", "Haggai"),
    ("Zech", "Zechariah"),
    ("Mal", "Malachi"),
    ("Matt", "Matthew"),
    ("Rom", "Romans"),
    ("1 Cor", "1 Corinthians"),
    ("2 Cor", "2 Corinthians"),
    ("Gal", "Galatians"),
    ("Eph", "Ephesians"),
    ("Phil", "Philippians"),
    ("Col", "Colossians"),
    ("1 Thess", "1 Thessalonians"),
    ("2 Thess", "2 Thessalonians"),
    ("1 Tim", "1 Timothy"),
    ("2 Tim", "2 Timothy"),
    ("Tit", "Titus"),
    ("Phlm", "Philemon"),
    ("Phm", "Philemon"),
    ("Heb", "Hebrews"),
    ("Jas", "James"),
    ("1 Pet", "1 Peter"),
    ("2 Pet", "2 Peter"),
    ("Rev", "Revelation"),
];

static TOTALS: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| BOOK_VERSES.into_iter().collect());

/// Lower-cased name or alias → canonical name.
static LOOKUP: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    let mut lookup: HashMap<String, &'static str> = BOOK_VERSES
        .iter()
        .map(|(name, _)| (name.to_lowercase(), *name))
        .collect();
    for (alias, name) in ALIASES {
        lookup.insert(alias.to_lowercase(), *name);
    }
    lookup
});

/// Verses in the longest chapter of any book (Psalm 119).
pub const MAX_CHAPTER_VERSES: u32 = 176;

/// Total number of verses in a canonical book, or `None` for unknown names.
pub fn total_verses(canonical_book: &str) -> Option<u32> {
    TOTALS.get(canonical_book).copied()
}

/// Resolve a book name or abbreviation to its canonical name.
///
/// Matching ignores case, a trailing `.` and repeated whitespace. Names that
/// match nothing are returned unchanged (trimmed).
pub fn canonicalize(raw_name: &str) -> String {
    let trimmed = raw_name.trim();
    let normalized = trimmed
        .trim_end_matches('.')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    match LOOKUP.get(&normalized) {
        Some(name) => (*name).to_string(),
        None => trimmed.to_string(),
    }
}
