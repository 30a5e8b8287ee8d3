//! Request-size enforcement.
//!
//! Licensing allows at most 500 consecutive verses per query and never more
//! than half of any one book. The effective cap for a known book is
//! `min(500, floor(total / 2))`; books the catalog does not know get only the
//! absolute cap. Validation is pure and safe to call speculatively.

use crate::reference::{catalog, ParsedReference};
use serde::Serialize;
use thiserror::Error;

/// Absolute consecutive-verse cap from the licensing terms.
pub const DEFAULT_MAX_CONSECUTIVE_VERSES: u32 = 500;

/// Which size rule a reference broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// More verses than the absolute consecutive-verse limit.
    ConsecutiveLimit,
    /// More than half of the book.
    BookFraction,
}

/// A rejected request size.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum SizeViolation {
    /// Exceeds the absolute consecutive-verse limit.
    #[error(
        "Requested {requested} consecutive verses. The API allows a maximum of {limit} consecutive verses per query."
    )]
    ConsecutiveLimit {
        /// Verses implied by the reference.
        requested: u32,
        /// The absolute cap.
        limit: u32,
        /// Resolved book, when known.
        book: Option<String>,
    },

    /// Exceeds 50% of the book.
    #[error(
        "Requested {requested} verses from {book}. The API allows a maximum of {limit} verses (50% of {book_total} total verses in book)."
    )]
    BookFraction {
        /// Verses implied by the reference.
        requested: u32,
        /// `floor(book_total / 2)`.
        limit: u32,
        /// Canonical book name.
        book: String,
        /// Total verses in the book.
        book_total: u32,
    },
}

impl SizeViolation {
    /// The rule that was broken.
    pub fn kind(&self) -> ViolationKind {
        match self {
            SizeViolation::ConsecutiveLimit { .. } => ViolationKind::ConsecutiveLimit,
            SizeViolation::BookFraction { .. } => ViolationKind::BookFraction,
        }
    }

    /// Short reason string for logs and status surfaces.
    pub fn reason(&self) -> &'static str {
        match self.kind() {
            ViolationKind::ConsecutiveLimit => "exceeds absolute consecutive-verse limit",
            ViolationKind::BookFraction => "exceeds 50%-of-book limit",
        }
    }

    /// The limit that was exceeded.
    pub fn limit(&self) -> u32 {
        match self {
            SizeViolation::ConsecutiveLimit { limit, .. }
            | SizeViolation::BookFraction { limit, .. } => *limit,
        }
    }

    /// Verses the reference asked for.
    pub fn requested(&self) -> u32 {
        match self {
            SizeViolation::ConsecutiveLimit { requested, .. }
            | SizeViolation::BookFraction { requested, .. } => *requested,
        }
    }
}

/// Enforces the consecutive-verse and half-book rules.
#[derive(Debug, Clone, Copy)]
pub struct SizeValidator {
    max_consecutive: u32,
}

impl Default for SizeValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONSECUTIVE_VERSES)
    }
}

impl SizeValidator {
    /// Create a validator with the given absolute cap.
    pub fn new(max_consecutive: u32) -> Self {
        Self { max_consecutive }
    }

    /// Check a parsed reference against both rules, absolute cap first.
    pub fn validate(&self, reference: &ParsedReference) -> Result<(), SizeViolation> {
        let requested = reference.verse_count;

        if requested > self.max_consecutive {
            return Err(SizeViolation::ConsecutiveLimit {
                requested,
                limit: self.max_consecutive,
                book: reference.book.clone(),
            });
        }

        if let Some(book) = reference.book.as_deref() {
            if let Some(book_total) = catalog::total_verses(book) {
                let half_book = book_total / 2;
                if requested > half_book {
                    return Err(SizeViolation::BookFraction {
                        requested,
                        limit: half_book,
                        book: book.to_string(),
                        book_total,
                    });
                }
            }
        }

        Ok(())
    }

    /// Largest verse count a single query may request from `book`.
    pub fn max_verses(&self, book: &str) -> u32 {
        match catalog::total_verses(book) {
            Some(total) => self.max_consecutive.min(total / 2),
            None => self.max_consecutive,
        }
    }
}
