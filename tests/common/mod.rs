#![allow(dead_code)]

use async_trait::async_trait;
use bucket_content_store::{
    Bucket, BucketContentStore, BucketError, BucketResult, ByteStream, IdGenerator,
    MemoryBucket, StoreConfig,
    models::{
        metadata::{MetadataField, ObjectMetadata},
        object::ObjectInfo,
    },
};
use std::{
    io,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn memory_store(temp_dir: &Path, root_dir: &str) -> (Arc<MemoryBucket>, BucketContentStore) {
    let bucket = Arc::new(MemoryBucket::new("content"));
    let config = StoreConfig::new("content")
        .with_root_dir(root_dir)
        .with_temp_dir(temp_dir);
    let store = BucketContentStore::new(bucket.clone(), config);
    (bucket, store)
}

/// Counts calls made to the wrapped bucket.
pub struct CountingBucket {
    inner: Arc<dyn Bucket>,
    pub metadata_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
}

impl CountingBucket {
    pub fn new(inner: Arc<dyn Bucket>) -> Self {
        Self {
            inner,
            metadata_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
        }
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Bucket for CountingBucket {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get_object(&self, key: &str) -> BucketResult<ByteStream> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_object(key).await
    }

    async fn get_object_metadata(
        &self,
        key: &str,
        fields: &[MetadataField],
    ) -> BucketResult<Option<ObjectMetadata>> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_object_metadata(key, fields).await
    }

    async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        body: ByteStream,
    ) -> BucketResult<ObjectInfo> {
        self.inner.put_object(key, content_type, body).await
    }

    async fn delete_object(&self, key: &str) -> BucketResult<bool> {
        self.inner.delete_object(key).await
    }

    async fn list_objects(&self, prefix: &str) -> BucketResult<Vec<ObjectInfo>> {
        self.inner.list_objects(prefix).await
    }
}

/// Bucket whose transport is down: every remote call fails.
pub struct FailingBucket;

fn unreachable_transport() -> BucketError {
    BucketError::Io(io::Error::new(
        io::ErrorKind::ConnectionRefused,
        "bucket unreachable",
    ))
}

#[async_trait]
impl Bucket for FailingBucket {
    fn name(&self) -> &str {
        "offline"
    }

    async fn get_object(&self, _key: &str) -> BucketResult<ByteStream> {
        Err(unreachable_transport())
    }

    async fn get_object_metadata(
        &self,
        _key: &str,
        _fields: &[MetadataField],
    ) -> BucketResult<Option<ObjectMetadata>> {
        Err(unreachable_transport())
    }

    async fn put_object(
        &self,
        _key: &str,
        _content_type: &str,
        _body: ByteStream,
    ) -> BucketResult<ObjectInfo> {
        Err(unreachable_transport())
    }

    async fn delete_object(&self, _key: &str) -> BucketResult<bool> {
        Err(unreachable_transport())
    }

    async fn list_objects(&self, _prefix: &str) -> BucketResult<Vec<ObjectInfo>> {
        Err(unreachable_transport())
    }
}

/// Hands out `id-0`, `id-1`, ... in order.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicUsize,
}

impl IdGenerator for SequentialIds {
    fn generate(&self) -> String {
        format!("id-{}", self.next.fetch_add(1, Ordering::SeqCst))
    }
}

/// Serves reads from the wrapped bucket but rejects every upload.
pub struct ReadOnlyBucket {
    inner: Arc<dyn Bucket>,
}

impl ReadOnlyBucket {
    pub fn new(inner: Arc<dyn Bucket>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Bucket for ReadOnlyBucket {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get_object(&self, key: &str) -> BucketResult<ByteStream> {
        self.inner.get_object(key).await
    }

    async fn get_object_metadata(
        &self,
        key: &str,
        fields: &[MetadataField],
    ) -> BucketResult<Option<ObjectMetadata>> {
        self.inner.get_object_metadata(key, fields).await
    }

    async fn put_object(
        &self,
        _key: &str,
        _content_type: &str,
        _body: ByteStream,
    ) -> BucketResult<ObjectInfo> {
        Err(unreachable_transport())
    }

    async fn delete_object(&self, key: &str) -> BucketResult<bool> {
        self.inner.delete_object(key).await
    }

    async fn list_objects(&self, prefix: &str) -> BucketResult<Vec<ObjectInfo>> {
        self.inner.list_objects(prefix).await
    }
}
