//! Uploads a writer's buffered temp file once its channel has been closed.

use futures::StreamExt;
use tokio::fs::{self, File};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use super::content_writer::{BucketContentWriter, WriterState};
use crate::bucket::OCTET_STREAM;
use crate::errors::{ContentError, ContentResult, Operation};

/// Commit step bound to a single writer.
///
/// The temp file is left on disk whether the upload succeeds or not.
pub(crate) struct CommitListener<'w> {
    writer: &'w mut BucketContentWriter,
}

impl<'w> CommitListener<'w> {
    pub(crate) fn new(writer: &'w mut BucketContentWriter) -> Self {
        Self { writer }
    }

    /// Record the buffered size, then upload the buffer to the writer's key.
    pub(crate) async fn content_stream_closed(mut self) -> ContentResult<i64> {
        let result = self.commit().await;
        match &result {
            Ok(size) => {
                self.writer.set_state(WriterState::Committed);
                debug!(
                    "committed {} ({} bytes) to {}",
                    self.writer.content_url(),
                    size,
                    self.writer.path()
                );
            }
            Err(err) => {
                self.writer.set_state(WriterState::Failed);
                warn!("commit of {} failed: {}", self.writer.content_url(), err);
            }
        }
        result
    }

    async fn commit(&mut self) -> ContentResult<i64> {
        let Some(path) = self.writer.temp_file().map(|p| p.to_path_buf()) else {
            return Err(ContentError::ChannelNotOpened(
                self.writer.content_url().to_string(),
            ));
        };

        let size = fs::metadata(&path)
            .await
            .map_err(|err| ContentError::setup("could not stat write buffer", err))?
            .len() as i64;
        self.writer.set_size(size);
        let file = File::open(&path)
            .await
            .map_err(|err| ContentError::setup("could not reopen write buffer", err))?;

        debug!(
            "uploading {} bytes from {} to {}",
            size,
            path.display(),
            self.writer.path()
        );
        // The file handle lives in the body stream and is released with it.
        let body = ReaderStream::new(file).boxed();
        self.writer
            .bucket()
            .put_object(self.writer.path(), OCTET_STREAM, body)
            .await
            .map_err(|err| ContentError::transport(Operation::Commit, self.writer.path(), err))?;
        Ok(size)
    }
}
