//! Content writers buffer incoming bytes in a local temp file; nothing reaches
//! the bucket until the write channel is closed.
//!
//! Lifecycle:
//! ```text
//! Created --open_write_channel--> Buffering --close--> Committed
//!                                                 \--> Failed (temp file kept)
//! ```

use std::{
    fmt, io,
    path::{Path, PathBuf},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncWrite, AsyncWriteExt},
};
use tracing::{debug, warn};

use super::commit_listener::CommitListener;
use super::content_reader::{BucketContentReader, ContentReader, FileContentReader};
use crate::bucket::Bucket;
use crate::errors::{ContentError, ContentResult};
use crate::models::content_url::ContentUrl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Created,
    Buffering,
    Committed,
    Failed,
}

/// Writer for one content object in the remote bucket.
pub struct BucketContentWriter {
    /// Object key within the bucket. Survives bucket migrations since it does
    /// not include the bucket name.
    key: String,
    url: ContentUrl,
    bucket: Arc<dyn Bucket>,
    existing_content_url: Option<ContentUrl>,
    /// Names the temp file; never used for the object key.
    session_id: String,
    temp_dir: PathBuf,
    temp_file: Option<PathBuf>,
    /// Bytes committed, set when the channel is closed.
    size: i64,
    state: WriterState,
}

impl BucketContentWriter {
    pub(crate) fn new(
        key: String,
        url: ContentUrl,
        existing_content_url: Option<ContentUrl>,
        bucket: Arc<dyn Bucket>,
        session_id: String,
        temp_dir: PathBuf,
    ) -> Self {
        Self {
            key,
            url,
            bucket,
            existing_content_url,
            session_id,
            temp_dir,
            temp_file: None,
            size: 0,
            state: WriterState::Created,
        }
    }

    pub fn content_url(&self) -> &ContentUrl {
        &self.url
    }

    /// Object key this writer commits to.
    pub fn path(&self) -> &str {
        &self.key
    }

    pub fn bucket(&self) -> &Arc<dyn Bucket> {
        &self.bucket
    }

    /// URL of the content this write replaces, if any.
    pub fn existing_content_url(&self) -> Option<&ContentUrl> {
        self.existing_content_url.as_ref()
    }

    /// Local buffer file, once a channel has been opened.
    pub fn temp_file(&self) -> Option<&Path> {
        self.temp_file.as_deref()
    }

    /// Committed size in bytes; zero until the channel has been closed.
    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub(crate) fn set_size(&mut self, size: i64) {
        self.size = size;
    }

    pub(crate) fn set_state(&mut self, state: WriterState) {
        self.state = state;
    }

    /// Create the temp file and return a channel appending to it.
    ///
    /// Only one channel may ever be opened per writer. No remote I/O happens
    /// here.
    pub async fn open_write_channel(&mut self) -> ContentResult<WriteChannel<'_>> {
        if self.state != WriterState::Created {
            return Err(ContentError::ChannelAlreadyOpened(self.url.to_string()));
        }

        fs::create_dir_all(&self.temp_dir).await.map_err(|err| {
            ContentError::setup(
                format!("could not create temp dir {}", self.temp_dir.display()),
                err,
            )
        })?;
        let path = self.temp_dir.join(format!("{}.bin", self.session_id));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|err| ContentError::setup("could not open write channel", err))?;

        debug!("buffering {} into {}", self.url, path.display());
        self.temp_file = Some(path);
        self.state = WriterState::Buffering;
        Ok(WriteChannel {
            file: Some(file),
            writer: self,
            bytes_written: 0,
        })
    }

    /// Write `data` as the whole content and commit it.
    pub async fn put_content(&mut self, data: &[u8]) -> ContentResult<i64> {
        let mut channel = self.open_write_channel().await?;
        channel
            .write_all(data)
            .await
            .map_err(|err| ContentError::setup("could not buffer content", err))?;
        channel.close().await
    }

    /// A reader for the content just written.
    ///
    /// Once committed, the local buffer is served while it is still on disk;
    /// otherwise the remote object is read, so uncommitted or failed writes
    /// read as absent.
    pub async fn create_reader(&self) -> Box<dyn ContentReader> {
        if self.state == WriterState::Committed {
            if let Some(path) = &self.temp_file {
                if fs::try_exists(path).await.unwrap_or(false) {
                    return Box::new(FileContentReader::new(path, self.url.clone()));
                }
            }
        }
        Box::new(BucketContentReader::new(
            self.key.clone(),
            self.url.clone(),
            self.bucket.clone(),
        ))
    }

    /// Remove the local buffer file.
    ///
    /// Returns whether a file was removed. Later readers from
    /// [`create_reader`](Self::create_reader) go to the bucket.
    pub async fn release_temp_file(&mut self) -> ContentResult<bool> {
        let Some(path) = self.temp_file.take() else {
            return Ok(false);
        };
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("released write buffer {}", path.display());
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => {
                let context = format!("could not remove write buffer {}", path.display());
                self.temp_file = Some(path);
                Err(ContentError::setup(context, err))
            }
        }
    }
}

impl fmt::Debug for BucketContentWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketContentWriter")
            .field("key", &self.key)
            .field("url", &self.url)
            .field("bucket", &self.bucket.name())
            .field("temp_file", &self.temp_file)
            .field("size", &self.size)
            .field("state", &self.state)
            .finish()
    }
}

/// Channel appending to a writer's temp file.
///
/// [`close`](WriteChannel::close) commits the buffered bytes to the bucket
/// before returning. Dropping the channel without closing it leaves the
/// content uncommitted.
pub struct WriteChannel<'w> {
    file: Option<File>,
    writer: &'w mut BucketContentWriter,
    bytes_written: u64,
}

impl WriteChannel<'_> {
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flush the temp file and upload it to the writer's object key.
    ///
    /// Returns the committed size.
    pub async fn close(mut self) -> ContentResult<i64> {
        let Some(mut file) = self.file.take() else {
            return Err(ContentError::ChannelNotOpened(self.writer.url.to_string()));
        };
        let flushed = match file.flush().await {
            Ok(()) => file.sync_all().await,
            Err(err) => Err(err),
        };
        drop(file);
        if let Err(err) = flushed {
            self.writer.set_state(WriterState::Failed);
            return Err(ContentError::setup("could not flush write channel", err));
        }

        CommitListener::new(&mut *self.writer)
            .content_stream_closed()
            .await
    }
}

impl AsyncWrite for WriteChannel<'_> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let Some(file) = this.file.as_mut() else {
            return Poll::Ready(Err(io::Error::other("write channel closed")));
        };
        match Pin::new(file).poll_write(cx, buf) {
            Poll::Ready(Ok(n)) => {
                this.bytes_written += n as u64;
                Poll::Ready(Ok(n))
            }
            other => other,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_shutdown(cx),
            None => Poll::Ready(Ok(())),
        }
    }
}

impl Drop for WriteChannel<'_> {
    fn drop(&mut self) {
        if self.file.is_some() {
            warn!(
                "write channel for {} dropped without close; content not committed",
                self.writer.url
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::MemoryBucket;
    use tempfile::TempDir;

    fn writer(temp_dir: &Path) -> anyhow::Result<BucketContentWriter> {
        Ok(BucketContentWriter::new(
            "root/2024/01/01/00/00/a.bin".to_string(),
            ContentUrl::parse("store://2024/01/01/00/00/a.bin")?,
            None,
            Arc::new(MemoryBucket::new("content")),
            "session-1".to_string(),
            temp_dir.join("buffers"),
        ))
    }

    #[tokio::test]
    async fn test_temp_file_named_after_session() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let mut writer = writer(temp_dir.path())?;
        assert_eq!(writer.state(), WriterState::Created);
        assert!(!fs::try_exists(temp_dir.path().join("buffers")).await?);

        let channel = writer.open_write_channel().await?;
        assert_eq!(channel.bytes_written(), 0);
        channel.close().await?;

        let expected = temp_dir.path().join("buffers").join("session-1.bin");
        assert_eq!(writer.temp_file(), Some(expected.as_path()));
        assert_eq!(writer.size(), 0);
        assert_eq!(writer.state(), WriterState::Committed);
        Ok(())
    }

    #[tokio::test]
    async fn test_release_temp_file() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let mut writer = writer(temp_dir.path())?;
        assert!(!writer.release_temp_file().await?);

        writer.put_content(b"kept remotely").await?;
        let path = writer.temp_file().map(Path::to_path_buf);
        assert!(writer.release_temp_file().await?);
        assert!(writer.temp_file().is_none());
        if let Some(path) = path {
            assert!(!fs::try_exists(&path).await?);
        }
        assert!(!writer.release_temp_file().await?);

        let reader = writer.create_reader().await;
        assert_eq!(reader.read_all().await?, b"kept remotely");
        Ok(())
    }

    #[tokio::test]
    async fn test_create_reader_before_write_reads_bucket() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let writer = writer(temp_dir.path())?;
        let reader = writer.create_reader().await;
        assert!(!reader.exists().await?);
        Ok(())
    }
}
