//! Error types for the bucket collaborator and the content store surface.

use std::{fmt, io};
use thiserror::Error;

/// Failures reported by a [`Bucket`](crate::bucket::Bucket) implementation.
#[derive(Debug, Error)]
pub enum BucketError {
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("invalid object key `{0}`")]
    InvalidObjectKey(String),
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type BucketResult<T> = Result<T, BucketError>;

/// The remote call that was in flight when a transport failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    MetadataFetch,
    Read,
    Commit,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::MetadataFetch => "metadata fetch",
            Operation::Read => "read",
            Operation::Commit => "write commit",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the content store, its readers and its writers.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content `{url}` not found (object key `{key}`)")]
    NotFound { url: String, key: String },
    #[error("malformed content URL `{url}`: {reason}")]
    MalformedUrl { url: String, reason: String },
    #[error("{operation} failed for object `{key}`")]
    Transport {
        operation: Operation,
        key: String,
        #[source]
        source: BucketError,
    },
    #[error("{context}")]
    Setup {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to get writer: {0}")]
    WriterSetup(String),
    #[error("write channel already opened for `{0}`")]
    ChannelAlreadyOpened(String),
    #[error("write channel never opened for `{0}`")]
    ChannelNotOpened(String),
}

pub type ContentResult<T> = Result<T, ContentError>;

impl ContentError {
    pub(crate) fn transport(operation: Operation, key: &str, source: BucketError) -> Self {
        ContentError::Transport {
            operation,
            key: key.to_string(),
            source,
        }
    }

    pub(crate) fn setup(context: impl Into<String>, source: io::Error) -> Self {
        ContentError::Setup {
            context: context.into(),
            source,
        }
    }

    /// True for [`ContentError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, ContentError::NotFound { .. })
    }
}
