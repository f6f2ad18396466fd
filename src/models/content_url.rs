//! Content URLs: the logical, protocol-prefixed address of one stored object.
//!
//! A URL has the form `<protocol>://<relative-path>`. Freshly generated URLs
//! partition the relative path by time, `yyyy/MM/dd/HH/mm/<id>.bin`; URLs
//! supplied from outside (legacy data, migrations) may carry any relative path.
//! The object key is derived from the relative path only, so two URLs that
//! differ just by protocol address the same object.

use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ContentError;

/// Separates the protocol from the relative path.
pub const PROTOCOL_DELIMITER: &str = "://";

/// Protocol used for newly generated URLs unless configured otherwise.
pub const DEFAULT_PROTOCOL: &str = "store";

/// A validated content URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentUrl {
    url: String,
    /// Byte length of the protocol part.
    protocol_len: usize,
}

impl ContentUrl {
    /// Parse and validate a content URL.
    pub fn parse(url: impl Into<String>) -> Result<Self, ContentError> {
        let url = url.into();
        let Some(index) = url.find(PROTOCOL_DELIMITER) else {
            return Err(ContentError::MalformedUrl {
                url,
                reason: format!("missing protocol delimiter `{}`", PROTOCOL_DELIMITER),
            });
        };
        if index == 0 {
            return Err(ContentError::MalformedUrl {
                url,
                reason: "protocol is empty".into(),
            });
        }
        if url.len() == index + PROTOCOL_DELIMITER.len() {
            return Err(ContentError::MalformedUrl {
                url,
                reason: "relative path is empty".into(),
            });
        }
        Ok(Self {
            url,
            protocol_len: index,
        })
    }

    /// Build a time-partitioned URL: `protocol://yyyy/MM/dd/HH/mm/<id>.bin`.
    pub fn generate<T>(protocol: &str, at: &T, id: &str) -> Result<Self, ContentError>
    where
        T: Datelike + Timelike,
    {
        Self::parse(format!(
            "{}{}{:04}/{:02}/{:02}/{:02}/{:02}/{}.bin",
            protocol,
            PROTOCOL_DELIMITER,
            at.year(),
            at.month(),
            at.day(),
            at.hour(),
            at.minute(),
            id
        ))
    }

    pub fn protocol(&self) -> &str {
        &self.url[..self.protocol_len]
    }

    pub fn relative_path(&self) -> &str {
        &self.url[self.protocol_len + PROTOCOL_DELIMITER.len()..]
    }

    /// Map this URL onto an object key below `root_dir`.
    ///
    /// A blank root directory leaves the relative path untouched. The result
    /// depends only on the URL and `root_dir`, never on object existence.
    pub fn object_key(&self, root_dir: &str) -> String {
        if root_dir.trim().is_empty() {
            self.relative_path().to_string()
        } else {
            format!("{}/{}", root_dir, self.relative_path())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn into_inner(self) -> String {
        self.url
    }
}

impl fmt::Display for ContentUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl FromStr for ContentUrl {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentUrl {
    type Error = ContentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ContentUrl> for String {
    fn from(value: ContentUrl) -> Self {
        value.url
    }
}

impl AsRef<str> for ContentUrl {
    fn as_ref(&self) -> &str {
        &self.url
    }
}
