//! The remote object store as seen by the content store.
//!
//! A bucket only offers whole-object operations: get, metadata projection,
//! put, delete and list. Readers and writers bridge those to incremental
//! channels.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::{io, pin::Pin};

use crate::errors::BucketResult;
use crate::models::{
    metadata::{MetadataField, ObjectMetadata},
    object::ObjectInfo,
};

pub mod local;
pub mod memory;

pub use local::LocalBucket;
pub use memory::MemoryBucket;

/// Object payload as a stream of chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Content type used for every committed content object.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Whole-object operations against one storage container.
///
/// A bucket handle is shared read-only by every reader and writer built from
/// one content store, so implementations must be safe for concurrent use.
#[async_trait]
pub trait Bucket: Send + Sync {
    /// Name of the container.
    fn name(&self) -> &str;

    /// Stream an object's bytes.
    ///
    /// Returns `BucketError::ObjectNotFound` if the key has no object.
    async fn get_object(&self, key: &str) -> BucketResult<ByteStream>;

    /// Fetch selected metadata fields without transferring content.
    ///
    /// Returns `Ok(None)` if the key has no object.
    async fn get_object_metadata(
        &self,
        key: &str,
        fields: &[MetadataField],
    ) -> BucketResult<Option<ObjectMetadata>>;

    /// Replace the object under `key` with the streamed body.
    async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        body: ByteStream,
    ) -> BucketResult<ObjectInfo>;

    /// Remove an object. Returns whether anything was removed; a missing
    /// object is not an error.
    async fn delete_object(&self, key: &str) -> BucketResult<bool>;

    /// List objects whose key starts with `prefix`, ordered by key.
    async fn list_objects(&self, prefix: &str) -> BucketResult<Vec<ObjectInfo>>;
}
