//! Licensing policy checks.

pub mod size;
