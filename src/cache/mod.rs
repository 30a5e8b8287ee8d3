//! Result cache layer.

pub mod store;
