//! A self-hosted bucket backed by SQLite for metadata and local
//! disk for object payloads, sharded beneath
//! `base_path/{bucket}/{shard}/{shard}/{key}`.

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use md5::Context;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};
use uuid::Uuid;

use super::{Bucket, ByteStream};
use crate::errors::{BucketError, BucketResult};
use crate::models::{
    metadata::{MetadataField, ObjectMetadata},
    object::{ObjectInfo, ObjectRecord},
};

const MAX_OBJECT_KEY_LEN: usize = 1024;

/// File name of the metadata database created by [`LocalBucket::open`].
pub const METADATA_DB: &str = "metadata.db";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS objects (
    id BLOB NOT NULL,
    bucket TEXT NOT NULL,
    key TEXT NOT NULL,
    content_type TEXT,
    size_bytes INTEGER NOT NULL,
    etag TEXT,
    last_modified TEXT NOT NULL,
    PRIMARY KEY (bucket, key)
);
CREATE INDEX IF NOT EXISTS idx_objects_bucket_key ON objects (bucket, key);
"#;

/// A bucket stored on the local filesystem.
///
/// Several buckets may share one pool and base directory; rows and payload
/// directories are partitioned by bucket name.
#[derive(Clone, Debug)]
pub struct LocalBucket {
    name: String,

    /// Shared SQLite connection pool used for metadata operations.
    db: Arc<SqlitePool>,

    /// Base directory on disk where object payloads are stored.
    base_path: PathBuf,
}

impl LocalBucket {
    /// Open (or create) a bucket below `base_path`, keeping metadata in
    /// `base_path/metadata.db`.
    pub async fn open(name: &str, base_path: impl Into<PathBuf>) -> BucketResult<Self> {
        ensure_bucket_name_safe(name)?;
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;

        let options = SqliteConnectOptions::new()
            .filename(base_path.join(METADATA_DB))
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::with_pool(name, Arc::new(pool), base_path).await
    }

    /// Build a bucket on an existing pool. The schema is created if missing.
    pub async fn with_pool(
        name: &str,
        db: Arc<SqlitePool>,
        base_path: impl Into<PathBuf>,
    ) -> BucketResult<Self> {
        ensure_bucket_name_safe(name)?;
        let bucket = Self {
            name: name.to_string(),
            db,
            base_path: base_path.into(),
        };
        fs::create_dir_all(bucket.bucket_root()).await?;
        run_migrations(&bucket.db).await?;
        info!(
            "opened local bucket {} at {}",
            bucket.name,
            bucket.base_path.display()
        );
        Ok(bucket)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Compute the physical base folder path for this bucket.
    fn bucket_root(&self) -> PathBuf {
        self.base_path.join(&self.name)
    }

    /// Generate two-level shard identifiers for an object key.
    ///
    /// Uses MD5(bucket/key) and returns the first two bytes as lowercase
    /// hexadecimal strings (00–ff). Reduces file count per directory.
    fn object_shards(bucket_name: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket_name, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Construct a fully-qualified object payload path.
    ///
    /// Parent directories may not exist yet.
    fn object_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(&self.name, key);
        let mut path = self.bucket_root();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    async fn fetch_record(&self, key: &str) -> BucketResult<Option<ObjectRecord>> {
        let record = sqlx::query_as::<_, ObjectRecord>(
            "SELECT id, bucket, key, content_type, size_bytes, etag, last_modified
             FROM objects
             WHERE bucket = ? AND key = ?",
        )
        .bind(&self.name)
        .bind(key)
        .fetch_optional(&*self.db)
        .await?;
        Ok(record)
    }

    fn not_found(&self, key: &str) -> BucketError {
        BucketError::ObjectNotFound {
            bucket: self.name.clone(),
            key: key.to_string(),
        }
    }

    /// Remove now-empty directories from `start` upwards, stopping below the
    /// bucket root.
    async fn prune_empty_dirs(&self, start: &Path) {
        let root = self.bucket_root();
        let below_root = |dir: &&Path| *dir != root.as_path() && dir.starts_with(&root);
        for dir in start.ancestors().take_while(below_root) {
            if let Err(err) = fs::remove_dir(dir).await {
                if !matches!(err.kind(), ErrorKind::NotFound | ErrorKind::DirectoryNotEmpty) {
                    debug!("leaving directory {}: {}", dir.display(), err);
                }
                break;
            }
        }
    }
}

#[async_trait]
impl Bucket for LocalBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_object(&self, key: &str) -> BucketResult<ByteStream> {
        ensure_key_safe(key)?;
        if self.fetch_record(key).await?.is_none() {
            return Err(self.not_found(key));
        }

        let file = File::open(self.object_path(key)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                self.not_found(key)
            } else {
                BucketError::Io(err)
            }
        })?;
        Ok(ReaderStream::new(file).boxed())
    }

    async fn get_object_metadata(
        &self,
        key: &str,
        fields: &[MetadataField],
    ) -> BucketResult<Option<ObjectMetadata>> {
        ensure_key_safe(key)?;
        Ok(self.fetch_record(key).await?.map(|record| {
            ObjectMetadata::project(
                record.key,
                fields,
                record.size_bytes,
                record.last_modified,
                record.content_type,
            )
        }))
    }

    /// Store the body under `key`, replacing any previous object.
    ///
    /// The payload is staged next to its final path and renamed into place
    /// once synced; the metadata row is written last.
    async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        body: ByteStream,
    ) -> BucketResult<ObjectInfo> {
        ensure_key_safe(key)?;

        let file_path = self.object_path(key);
        let Some(parent) = file_path.parent() else {
            return Err(BucketError::InvalidObjectKey(key.to_string()));
        };
        fs::create_dir_all(parent).await?;
        let staged = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let written = match stage_payload(&staged, body).await {
            Ok(written) => fs::rename(&staged, &file_path).await.map(|()| written),
            Err(err) => Err(err),
        };
        let (size_bytes, etag) = match written {
            Ok(written) => written,
            Err(err) => {
                let _ = fs::remove_file(&staged).await;
                return Err(err.into());
            }
        };

        let record = sqlx::query_as::<_, ObjectRecord>(
            r#"
            INSERT INTO objects (
                id, bucket, key, content_type, size_bytes, etag, last_modified
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(bucket, key) DO UPDATE SET
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                last_modified = excluded.last_modified
            RETURNING id, bucket, key, content_type, size_bytes, etag, last_modified
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&self.name)
        .bind(key)
        .bind(content_type)
        .bind(size_bytes)
        .bind(&etag)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;

        debug!(
            "stored {} bytes under {}/{} ({})",
            size_bytes,
            self.name,
            key,
            file_path.display()
        );
        Ok(record.into())
    }

    /// Remove the metadata row and the payload, then prune empty shard
    /// directories. Missing objects are not an error.
    async fn delete_object(&self, key: &str) -> BucketResult<bool> {
        ensure_key_safe(key)?;
        let result = sqlx::query("DELETE FROM objects WHERE bucket = ? AND key = ?")
            .bind(&self.name)
            .bind(key)
            .execute(&*self.db)
            .await?;

        let file_path = self.object_path(key);
        let file_removed = match fs::remove_file(&file_path).await {
            Ok(_) => {
                debug!("removed physical file {}", file_path.display());
                true
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
                false
            }
            Err(err) => return Err(BucketError::Io(err)),
        };

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent).await;
        }

        Ok(result.rows_affected() > 0 || file_removed)
    }

    async fn list_objects(&self, prefix: &str) -> BucketResult<Vec<ObjectInfo>> {
        let rows = sqlx::query_as::<_, ObjectRecord>(
            "SELECT id, bucket, key, content_type, size_bytes, etag, last_modified
             FROM objects
             WHERE bucket = ? AND substr(key, 1, length(?)) = ?
             ORDER BY key ASC",
        )
        .bind(&self.name)
        .bind(prefix)
        .bind(prefix)
        .fetch_all(&*self.db)
        .await?;
        Ok(rows.into_iter().map(ObjectInfo::from).collect())
    }
}

/// Write `body` to `path`, returning its length and hex MD5.
async fn stage_payload(path: &Path, mut body: ByteStream) -> io::Result<(i64, String)> {
    let mut file = File::create(path).await?;
    let mut digest = Context::new();
    let mut len: i64 = 0;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        digest.consume(&chunk);
        len += chunk.len() as i64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok((len, format!("{:x}", digest.compute())))
}

/// Create the metadata schema, one statement at a time.
async fn run_migrations(db: &SqlitePool) -> BucketResult<()> {
    let statements = SCHEMA
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    for stmt in statements {
        debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }
    Ok(())
}

/// Basic key validation to avoid trivial path traversal vectors.
///
/// Rejects empty or overlong keys, keys that begin with `/` or contain `..`,
/// and keys with control characters or backslashes.
fn ensure_key_safe(key: &str) -> BucketResult<()> {
    let invalid = key.is_empty()
        || key.len() > MAX_OBJECT_KEY_LEN
        || key.starts_with('/')
        || key.contains("..")
        || key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0');
    if invalid {
        return Err(BucketError::InvalidObjectKey(key.to_string()));
    }
    Ok(())
}

/// A bucket name becomes a directory below the base path, so it must be a
/// single plain path segment.
fn ensure_bucket_name_safe(name: &str) -> BucketResult<()> {
    let reason = if name.trim().is_empty() {
        Some("must not be blank")
    } else if matches!(name, "." | "..") || name.contains(['/', '\\']) {
        Some("must be a single path segment")
    } else if name.chars().any(char::is_control) {
        Some("must not contain control characters")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(BucketError::InvalidBucketName {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;
    use tempfile::TempDir;

    fn body(data: &'static [u8]) -> ByteStream {
        stream::iter(vec![Ok::<_, io::Error>(Bytes::from_static(data))]).boxed()
    }

    async fn collect(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let bucket = LocalBucket::open("content-bucket", temp_dir.path()).await?;

        let info = bucket
            .put_object("root/2024/01/01/00/00/a.bin", "application/octet-stream", body(b"payload"))
            .await?;
        assert_eq!(info.size, 7);
        assert_eq!(info.etag.as_deref(), Some(format!("{:x}", md5::compute(b"payload")).as_str()));

        let data = collect(bucket.get_object("root/2024/01/01/00/00/a.bin").await?).await;
        assert_eq!(data, b"payload");
        Ok(())
    }

    #[tokio::test]
    async fn test_put_replaces_existing_object() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let bucket = LocalBucket::open("content-bucket", temp_dir.path()).await?;

        bucket.put_object("k.bin", "text/plain", body(b"first")).await?;
        bucket.put_object("k.bin", "text/plain", body(b"second!")).await?;

        let meta = bucket
            .get_object_metadata("k.bin", &[MetadataField::Size])
            .await?
            .expect("present");
        assert_eq!(meta.size, Some(7));
        assert_eq!(collect(bucket.get_object("k.bin").await?).await, b"second!");
        assert_eq!(bucket.list_objects("").await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_metadata_for_missing_object() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let bucket = LocalBucket::open("content-bucket", temp_dir.path()).await?;

        let meta = bucket
            .get_object_metadata("missing.bin", &[MetadataField::Size, MetadataField::Updated])
            .await?;
        assert!(meta.is_none());
        assert!(matches!(
            bucket.get_object("missing.bin").await,
            Err(BucketError::ObjectNotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_prunes() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let bucket = LocalBucket::open("content-bucket", temp_dir.path()).await?;

        bucket.put_object("a/b/c.bin", "x", body(b"1")).await?;
        let payload = bucket.object_path("a/b/c.bin");
        assert!(payload.exists());

        assert!(bucket.delete_object("a/b/c.bin").await?);
        assert!(!bucket.delete_object("a/b/c.bin").await?);
        assert!(!payload.exists());
        assert!(!payload.parent().unwrap().exists());
        assert!(bucket.bucket_root().exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_objects_by_prefix() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let bucket = LocalBucket::open("content-bucket", temp_dir.path()).await?;

        for key in ["root/b", "root/a", "other/c", "root_x"] {
            bucket.put_object(key, "x", body(b"1")).await?;
        }
        let keys: Vec<String> = bucket
            .list_objects("root/")
            .await?
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, vec!["root/a", "root/b"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_buckets_share_a_pool() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let first = LocalBucket::open("first-bucket", temp_dir.path()).await?;
        let second =
            LocalBucket::with_pool("second-bucket", first.db.clone(), temp_dir.path()).await?;

        first.put_object("same.bin", "x", body(b"one")).await?;
        assert!(second
            .get_object_metadata("same.bin", &[MetadataField::Size])
            .await?
            .is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_rejects_unsafe_keys() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let bucket = LocalBucket::open("content-bucket", temp_dir.path()).await?;

        for key in ["", "/abs", "a/../b", "tab\tkey", "back\\slash"] {
            let result = bucket.put_object(key, "x", body(b"1")).await;
            assert!(matches!(result, Err(BucketError::InvalidObjectKey(_))), "{key:?}");
        }
        Ok(())
    }

    #[test]
    fn test_bucket_name_is_one_segment() {
        assert!(ensure_bucket_name_safe("content-store").is_ok());
        assert!(ensure_bucket_name_safe("Alfresco_Content").is_ok());
        for name in ["", "  ", ".", "..", "a/b", "a\\b", "tab\tname"] {
            assert!(
                matches!(
                    ensure_bucket_name_safe(name),
                    Err(BucketError::InvalidBucketName { .. })
                ),
                "{name:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_failed_upload_leaves_no_staging_file() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let bucket = LocalBucket::open("content-bucket", temp_dir.path()).await?;

        let broken: ByteStream = stream::iter(vec![
            Ok(Bytes::from_static(b"part")),
            Err(io::Error::other("client went away")),
        ])
        .boxed();
        assert!(matches!(
            bucket.put_object("a.bin", "x", broken).await,
            Err(BucketError::Io(_))
        ));

        let shard_dir = bucket.object_path("a.bin");
        let mut entries = fs::read_dir(shard_dir.parent().unwrap()).await?;
        assert!(entries.next_entry().await?.is_none());
        assert!(bucket.get_object_metadata("a.bin", &[]).await?.is_none());
        Ok(())
    }
}
