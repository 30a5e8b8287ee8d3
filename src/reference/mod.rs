//! Scripture references: book catalog and range parsing.

pub mod catalog;
pub mod parser;

pub use parser::{parse, ParsedReference};
