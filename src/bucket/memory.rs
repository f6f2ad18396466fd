//! In-process bucket, for tests and embedding.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Bucket, ByteStream};
use crate::errors::{BucketError, BucketResult};
use crate::models::{
    metadata::{MetadataField, ObjectMetadata},
    object::ObjectInfo,
};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
    updated: DateTime<Utc>,
    etag: String,
}

impl StoredObject {
    fn info(&self, key: &str) -> ObjectInfo {
        ObjectInfo {
            key: key.to_string(),
            size: self.data.len() as i64,
            updated: self.updated,
            etag: Some(self.etag.clone()),
        }
    }
}

/// A bucket whose objects live in memory.
#[derive(Debug)]
pub struct MemoryBucket {
    name: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl MemoryBucket {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Content type recorded for `key`, if present.
    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|obj| obj.content_type.clone())
    }
}

#[async_trait]
impl Bucket for MemoryBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_object(&self, key: &str) -> BucketResult<ByteStream> {
        let objects = self.objects.read().await;
        let obj = objects.get(key).ok_or_else(|| BucketError::ObjectNotFound {
            bucket: self.name.clone(),
            key: key.to_string(),
        })?;
        let data = obj.data.clone();
        Ok(stream::once(async move { Ok::<_, std::io::Error>(data) }).boxed())
    }

    async fn get_object_metadata(
        &self,
        key: &str,
        fields: &[MetadataField],
    ) -> BucketResult<Option<ObjectMetadata>> {
        let objects = self.objects.read().await;
        Ok(objects.get(key).map(|obj| {
            ObjectMetadata::project(
                key,
                fields,
                obj.data.len() as i64,
                obj.updated,
                Some(obj.content_type.clone()),
            )
        }))
    }

    async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        mut body: ByteStream,
    ) -> BucketResult<ObjectInfo> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        let data = buf.freeze();
        let obj = StoredObject {
            etag: format!("{:x}", md5::compute(&data)),
            data,
            content_type: content_type.to_string(),
            updated: Utc::now(),
        };
        let info = obj.info(key);
        self.objects.write().await.insert(key.to_string(), obj);
        debug!("stored {} bytes under {}/{}", info.size, self.name, key);
        Ok(info)
    }

    async fn delete_object(&self, key: &str) -> BucketResult<bool> {
        Ok(self.objects.write().await.remove(key).is_some())
    }

    async fn list_objects(&self, prefix: &str) -> BucketResult<Vec<ObjectInfo>> {
        let objects = self.objects.read().await;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, obj)| obj.info(key))
            .collect())
    }
}
