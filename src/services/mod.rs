//! Content store services.
//!
//! The store resolves content URLs to object keys and hands out readers and
//! writers; writers buffer locally and commit through the commit listener.

pub(crate) mod commit_listener;
pub mod content_reader;
pub mod content_store;
pub mod content_writer;
pub mod id_generator;
