//! Download cache and archive extraction.

pub mod download;
pub mod extract;
