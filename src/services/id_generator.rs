//! Unique id generation for content URLs and write-buffer names.

use std::fmt;
use uuid::Uuid;

/// Source of globally unique ids.
///
/// Uniqueness of generated content URLs rests entirely on this generator, not
/// on the timestamp they are partitioned by.
pub trait IdGenerator: Send + Sync + fmt::Debug {
    fn generate(&self) -> String;
}

/// Random (v4) UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_uuid_generator_format() {
        let id = UuidGenerator.generate();
        assert_eq!(id.len(), 36);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_uuid_generator_uniqueness() {
        let ids: HashSet<String> = (0..1000).map(|_| UuidGenerator.generate()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
