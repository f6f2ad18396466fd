//! Core data models for the content store.
//!
//! Content URLs are the logical addresses handed out to the host platform;
//! object metadata and records describe what a bucket holds under a key.

pub mod content_url;
pub mod metadata;
pub mod object;
