//! The content store: maps content URLs onto bucket object keys and hands out
//! readers and writers bound to those keys.

use chrono::Local;
use std::{fmt, sync::Arc};
use tracing::debug;

use super::content_reader::{BucketContentReader, ContentReader};
use super::content_writer::BucketContentWriter;
use super::id_generator::{IdGenerator, UuidGenerator};
use crate::bucket::Bucket;
use crate::config::StoreConfig;
use crate::errors::{ContentError, ContentResult, Operation};
use crate::models::content_url::ContentUrl;

/// Content store backed by a single bucket.
///
/// Cloning is cheap; clones share the bucket handle and id generator.
#[derive(Clone)]
pub struct BucketContentStore {
    bucket: Arc<dyn Bucket>,
    config: StoreConfig,
    ids: Arc<dyn IdGenerator>,
}

impl BucketContentStore {
    pub fn new(bucket: Arc<dyn Bucket>, config: StoreConfig) -> Self {
        Self {
            bucket,
            config,
            ids: Arc::new(UuidGenerator),
        }
    }

    /// Replace the id generator used for new URLs and write buffers.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn bucket(&self) -> &Arc<dyn Bucket> {
        &self.bucket
    }

    pub fn is_write_supported(&self) -> bool {
        true
    }

    /// `<bucket>/<root_dir>`, or just the bucket name without a root dir.
    pub fn root_location(&self) -> String {
        if self.config.root_dir.trim().is_empty() {
            self.bucket.name().to_string()
        } else {
            format!("{}/{}", self.bucket.name(), self.config.root_dir)
        }
    }

    /// A fresh URL partitioned by the current local time.
    pub fn new_content_url(&self) -> ContentResult<ContentUrl> {
        ContentUrl::generate(&self.config.protocol, &Local::now(), &self.ids.generate())
    }

    /// Resolve a content URL to its object key. The URL's protocol plays no
    /// part in the key.
    pub fn object_key(&self, url: &str) -> ContentResult<String> {
        let url = ContentUrl::parse(url)?;
        let key = url.object_key(&self.config.root_dir);
        debug!("resolved {} to key {}", url, key);
        Ok(key)
    }

    fn resolve(&self, url: &str) -> ContentResult<(ContentUrl, String)> {
        let url = ContentUrl::parse(url)?;
        let key = url.object_key(&self.config.root_dir);
        Ok((url, key))
    }

    /// A reader for `url`. Nothing is fetched until the reader is queried.
    pub fn get_reader(&self, url: &str) -> ContentResult<BucketContentReader> {
        let (url, key) = self.resolve(url)?;
        Ok(BucketContentReader::new(key, url, self.bucket.clone()))
    }

    /// A writer for `new_url`, or for a freshly generated URL when none (or a
    /// blank one) is given.
    ///
    /// `existing` is the reader of the content being replaced, if any. No
    /// remote I/O happens here; the temp file is created when the write
    /// channel is opened.
    pub fn get_writer(
        &self,
        existing: Option<&dyn ContentReader>,
        new_url: Option<&str>,
    ) -> ContentResult<BucketContentWriter> {
        let url = match new_url.filter(|url| !url.trim().is_empty()) {
            Some(url) => ContentUrl::parse(url)?,
            None => self.new_content_url().map_err(|err| {
                ContentError::WriterSetup(format!("could not generate content URL: {}", err))
            })?,
        };
        let key = url.object_key(&self.config.root_dir);
        debug!("writer for {} targets key {}", url, key);

        Ok(BucketContentWriter::new(
            key,
            url,
            existing.map(|reader| reader.content_url().clone()),
            self.bucket.clone(),
            self.ids.generate(),
            self.config.temp_dir.clone(),
        ))
    }

    /// Whether content exists under `url`.
    pub async fn exists(&self, url: &str) -> ContentResult<bool> {
        self.get_reader(url)?.exists().await
    }

    /// Delete the content under `url`.
    ///
    /// Returns `true` whether or not the object existed; only a transport
    /// failure is an error.
    pub async fn delete(&self, url: &str) -> ContentResult<bool> {
        let (url, key) = self.resolve(url)?;
        let removed = self
            .bucket
            .delete_object(&key)
            .await
            .map_err(|err| ContentError::transport(Operation::Delete, &key, err))?;
        debug!("deleted {} (key {}, removed: {})", url, key, removed);
        Ok(true)
    }
}

impl fmt::Debug for BucketContentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketContentStore")
            .field("bucket", &self.bucket.name())
            .field("config", &self.config)
            .field("ids", &self.ids)
            .finish()
    }
}
