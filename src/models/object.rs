//! Represents an object (blob) stored in a bucket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Summary of a stored object, returned by uploads and listings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Object key (path-like identifier within the bucket).
    pub key: String,

    /// Size in bytes.
    pub size: i64,

    /// Timestamp when object was last modified.
    pub updated: DateTime<Utc>,

    /// MD5 checksum in hex, when the backend computes one.
    pub etag: Option<String>,
}

/// Metadata row persisted by [`LocalBucket`](crate::bucket::local::LocalBucket).
///
/// The row describes the payload on disk; it never holds content bytes.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ObjectRecord {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Name of the bucket owning the object.
    pub bucket: String,

    /// Object key within the bucket.
    pub key: String,

    /// Content type (MIME type).
    pub content_type: Option<String>,

    /// Size in bytes.
    pub size_bytes: i64,

    /// MD5 checksum for integrity verification.
    pub etag: Option<String>,

    /// Timestamp when object was last modified.
    pub last_modified: DateTime<Utc>,
}

impl From<ObjectRecord> for ObjectInfo {
    fn from(record: ObjectRecord) -> Self {
        ObjectInfo {
            key: record.key,
            size: record.size_bytes,
            updated: record.last_modified,
            etag: record.etag,
        }
    }
}
