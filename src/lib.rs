//! Bucket-backed content store.
//!
//! Content is addressed by URLs of the form `protocol://relative/path`. The
//! relative path, prefixed with an optional root directory, is the object key
//! inside a single bucket. Reads stream straight from the bucket; writes are
//! buffered in a local temp file and uploaded in one piece when the write
//! channel is closed.
//!
//! ```no_run
//! use std::sync::Arc;
//! use bucket_content_store::{BucketContentStore, ContentReader, MemoryBucket, StoreConfig};
//!
//! # async fn demo() -> Result<(), bucket_content_store::ContentError> {
//! let store = BucketContentStore::new(
//!     Arc::new(MemoryBucket::new("content")),
//!     StoreConfig::new("content"),
//! );
//! let mut writer = store.get_writer(None, None)?;
//! writer.put_content(b"hello").await?;
//!
//! let reader = store.get_reader(writer.content_url().as_str())?;
//! assert_eq!(reader.read_all().await?, b"hello");
//! # Ok(())
//! # }
//! ```

pub mod bucket;
pub mod config;
pub mod errors;
pub mod models;
pub mod services;

pub use bucket::{Bucket, ByteStream, LocalBucket, MemoryBucket};
pub use config::StoreConfig;
pub use errors::{BucketError, BucketResult, ContentError, ContentResult, Operation};
pub use models::content_url::ContentUrl;
pub use services::content_reader::{
    BucketContentReader, ContentReader, FileContentReader, ReadChannel,
};
pub use services::content_store::BucketContentStore;
pub use services::content_writer::{BucketContentWriter, WriteChannel, WriterState};
pub use services::id_generator::{IdGenerator, UuidGenerator};
