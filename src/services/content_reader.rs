//! Content readers: existence, size and timestamp queries plus a direct
//! read channel onto the content bytes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{fmt, io::ErrorKind, path::PathBuf, sync::Arc};
use tokio::{
    fs::{self, File},
    io::{AsyncRead, AsyncReadExt},
    sync::OnceCell,
};
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::bucket::Bucket;
use crate::errors::{BucketError, ContentError, ContentResult, Operation};
use crate::models::{
    content_url::ContentUrl,
    metadata::{ContentMetadata, MetadataField},
};

/// Incremental reader over one content object's bytes.
pub type ReadChannel = Box<dyn AsyncRead + Send + Unpin>;

/// Fields fetched for a reader's metadata; content is never transferred.
const METADATA_FIELDS: &[MetadataField] = &[MetadataField::Updated, MetadataField::Size];

/// Read access to one content object.
///
/// Queries on an absent object report `false`/zero rather than failing; only
/// [`open_read_channel`](ContentReader::open_read_channel) treats absence as
/// an error.
#[async_trait]
pub trait ContentReader: Send + Sync + fmt::Debug {
    fn content_url(&self) -> &ContentUrl;

    /// Where the bytes live: the object key, or the local path for a file
    /// reader.
    fn key(&self) -> &str;

    async fn exists(&self) -> ContentResult<bool>;

    /// Size in bytes, zero if the content does not exist.
    async fn size(&self) -> ContentResult<i64>;

    /// Last modification as epoch milliseconds, zero if the content does not
    /// exist.
    async fn last_modified(&self) -> ContentResult<i64>;

    /// Open a channel onto the content bytes.
    ///
    /// Fails with [`ContentError::NotFound`] without attempting any transfer
    /// when the content does not exist.
    async fn open_read_channel(&self) -> ContentResult<ReadChannel>;

    /// Read the whole content into memory.
    async fn read_all(&self) -> ContentResult<Vec<u8>> {
        let mut channel = self.open_read_channel().await?;
        let mut buf = Vec::new();
        channel.read_to_end(&mut buf).await.map_err(|err| {
            ContentError::transport(Operation::Read, self.key(), BucketError::Io(err))
        })?;
        Ok(buf)
    }
}

/// Reader over an object in the remote bucket.
///
/// Metadata is fetched on first use and kept for the reader's lifetime; a
/// reader is a per-request view, never refreshed.
pub struct BucketContentReader {
    key: String,
    url: ContentUrl,
    bucket: Arc<dyn Bucket>,
    metadata: OnceCell<ContentMetadata>,
}

impl BucketContentReader {
    pub(crate) fn new(key: String, url: ContentUrl, bucket: Arc<dyn Bucket>) -> Self {
        Self {
            key,
            url,
            bucket,
            metadata: OnceCell::new(),
        }
    }

    async fn metadata(&self) -> ContentResult<ContentMetadata> {
        let meta = self
            .metadata
            .get_or_try_init(|| async {
                let fetched = self
                    .bucket
                    .get_object_metadata(&self.key, METADATA_FIELDS)
                    .await
                    .map_err(|err| {
                        ContentError::transport(Operation::MetadataFetch, &self.key, err)
                    })?;
                let meta = ContentMetadata::from(fetched);
                debug!(
                    "fetched metadata for {} (exists: {}, size: {})",
                    self.key, meta.exists, meta.size
                );
                Ok::<_, ContentError>(meta)
            })
            .await?;
        Ok(*meta)
    }
}

impl fmt::Debug for BucketContentReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketContentReader")
            .field("key", &self.key)
            .field("url", &self.url)
            .field("bucket", &self.bucket.name())
            .field("metadata", &self.metadata.get())
            .finish()
    }
}

#[async_trait]
impl ContentReader for BucketContentReader {
    fn content_url(&self) -> &ContentUrl {
        &self.url
    }

    fn key(&self) -> &str {
        &self.key
    }

    async fn exists(&self) -> ContentResult<bool> {
        Ok(self.metadata().await?.exists)
    }

    async fn size(&self) -> ContentResult<i64> {
        Ok(self.metadata().await?.size)
    }

    async fn last_modified(&self) -> ContentResult<i64> {
        Ok(self.metadata().await?.last_modified)
    }

    async fn open_read_channel(&self) -> ContentResult<ReadChannel> {
        if !self.exists().await? {
            return Err(ContentError::NotFound {
                url: self.url.to_string(),
                key: self.key.clone(),
            });
        }

        let stream = self.bucket.get_object(&self.key).await.map_err(|err| match err {
            BucketError::ObjectNotFound { .. } => ContentError::NotFound {
                url: self.url.to_string(),
                key: self.key.clone(),
            },
            other => ContentError::transport(Operation::Read, &self.key, other),
        })?;
        debug!("opened read channel on {}", self.key);
        Ok(Box::new(StreamReader::new(stream)))
    }
}

/// Reader over a local file, such as a writer's buffer after commit.
#[derive(Debug, Clone)]
pub struct FileContentReader {
    path: PathBuf,
    /// Display form of `path`.
    key: String,
    url: ContentUrl,
}

impl FileContentReader {
    pub fn new(path: impl Into<PathBuf>, url: ContentUrl) -> Self {
        let path = path.into();
        Self {
            key: path.display().to_string(),
            path,
            url,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    async fn metadata(&self) -> ContentResult<ContentMetadata> {
        match fs::metadata(&self.path).await {
            Ok(meta) => {
                let last_modified = meta
                    .modified()
                    .map(|t| DateTime::<Utc>::from(t).timestamp_millis())
                    .unwrap_or(0);
                Ok(ContentMetadata {
                    exists: true,
                    size: meta.len() as i64,
                    last_modified,
                })
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(ContentMetadata::ABSENT),
            Err(err) => Err(ContentError::setup(
                format!("could not stat {}", self.path.display()),
                err,
            )),
        }
    }
}

#[async_trait]
impl ContentReader for FileContentReader {
    fn content_url(&self) -> &ContentUrl {
        &self.url
    }

    fn key(&self) -> &str {
        &self.key
    }

    async fn exists(&self) -> ContentResult<bool> {
        Ok(self.metadata().await?.exists)
    }

    async fn size(&self) -> ContentResult<i64> {
        Ok(self.metadata().await?.size)
    }

    async fn last_modified(&self) -> ContentResult<i64> {
        Ok(self.metadata().await?.last_modified)
    }

    async fn open_read_channel(&self) -> ContentResult<ReadChannel> {
        match File::open(&self.path).await {
            Ok(file) => Ok(Box::new(file)),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(ContentError::NotFound {
                url: self.url.to_string(),
                key: self.key.clone(),
            }),
            Err(err) => Err(ContentError::setup(
                format!("could not open {}", self.path.display()),
                err,
            )),
        }
    }
}
