//! Object metadata as returned by a bucket projection, and the cached
//! snapshot a content reader keeps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fields that may be requested from [`Bucket::get_object_metadata`].
///
/// [`Bucket::get_object_metadata`]: crate::bucket::Bucket::get_object_metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetadataField {
    Size,
    Updated,
    ContentType,
}

/// Projection of an existing object's metadata.
///
/// Only fields that were requested are populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Object key within the bucket.
    pub key: String,

    /// Size in bytes.
    pub size: Option<i64>,

    /// Last time the object was written.
    pub updated: Option<DateTime<Utc>>,

    /// Content type recorded at upload.
    pub content_type: Option<String>,
}

impl ObjectMetadata {
    /// Build a projection holding only the fields listed in `fields`.
    pub fn project(
        key: impl Into<String>,
        fields: &[MetadataField],
        size: i64,
        updated: DateTime<Utc>,
        content_type: Option<String>,
    ) -> Self {
        Self {
            key: key.into(),
            size: fields.contains(&MetadataField::Size).then_some(size),
            updated: fields.contains(&MetadataField::Updated).then_some(updated),
            content_type: if fields.contains(&MetadataField::ContentType) {
                content_type
            } else {
                None
            },
        }
    }
}

/// Existence, size and modification time of one content object.
///
/// An absent object reports `exists == false` with zero size and timestamp.
/// Zero size alone does not mean absence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMetadata {
    pub exists: bool,
    pub size: i64,
    pub last_modified: i64,
}

impl ContentMetadata {
    pub const ABSENT: ContentMetadata = ContentMetadata {
        exists: false,
        size: 0,
        last_modified: 0,
    };
}

impl From<Option<ObjectMetadata>> for ContentMetadata {
    fn from(meta: Option<ObjectMetadata>) -> Self {
        match meta {
            Some(meta) => ContentMetadata {
                exists: true,
                size: meta.size.unwrap_or(0),
                last_modified: meta.updated.map(|t| t.timestamp_millis()).unwrap_or(0),
            },
            None => ContentMetadata::ABSENT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_projection_drops_unrequested_fields() {
        let updated = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let meta = ObjectMetadata::project(
            "a.bin",
            &[MetadataField::Size],
            42,
            updated,
            Some("text/plain".into()),
        );
        assert_eq!(meta.size, Some(42));
        assert_eq!(meta.updated, None);
        assert_eq!(meta.content_type, None);
    }

    #[test]
    fn test_absent_object_is_zeroed() {
        let meta = ContentMetadata::from(None);
        assert!(!meta.exists);
        assert_eq!(meta.size, 0);
        assert_eq!(meta.last_modified, 0);
    }

    #[test]
    fn test_present_empty_object_still_exists() {
        let updated = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let meta = ContentMetadata::from(Some(ObjectMetadata::project(
            "empty.bin",
            &[MetadataField::Size, MetadataField::Updated],
            0,
            updated,
            None,
        )));
        assert!(meta.exists);
        assert_eq!(meta.size, 0);
        assert_eq!(meta.last_modified, updated.timestamp_millis());
    }
}
