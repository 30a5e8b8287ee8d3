//! Payload and outcome types shared with the host application.

pub mod models;
