//! Aspect type metadata.
//!
//! An aspect is a named, independently-storable bag of typed attributes
//! that may or may not be attached to any given media item. Plugins declare
//! aspects as data; the storage manager derives the physical schema from
//! these descriptors, so nothing here knows about tables or columns.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AspectId(pub Uuid);

impl AspectId {
    pub fn new() -> Self {
        AspectId(Uuid::new_v4())
    }
}

impl Default for AspectId {
    fn default() -> Self {
        AspectId::new()
    }
}

impl fmt::Display for AspectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Value type of one attribute.
///
/// `Text` carries the indexability contract: a bounded maximum length makes
/// the column eligible for free-text LIKE search, while `large` marks
/// unbounded text that default search skips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    Text {
        max_len: Option<usize>,
        large: bool,
    },
    Integer,
    Real,
    Bool,
    DateTime,
    Id,
    Binary,
}

impl AttributeType {
    pub const fn text(max_len: usize) -> Self {
        AttributeType::Text {
            max_len: Some(max_len),
            large: false,
        }
    }

    pub const fn large_text() -> Self {
        AttributeType::Text {
            max_len: None,
            large: true,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, AttributeType::Text { .. })
    }

    pub fn is_large_text(&self) -> bool {
        matches!(self, AttributeType::Text { large: true, .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    Single,
    Multi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
    pub value_type: AttributeType,
    pub cardinality: Cardinality,
}

impl AttributeSpec {
    pub fn single(name: impl Into<String>, value_type: AttributeType) -> Self {
        AttributeSpec {
            name: name.into(),
            value_type,
            cardinality: Cardinality::Single,
        }
    }

    pub fn multi(name: impl Into<String>, value_type: AttributeType) -> Self {
        AttributeSpec {
            name: name.into(),
            value_type,
            cardinality: Cardinality::Multi,
        }
    }

    pub fn is_single(&self) -> bool {
        self.cardinality == Cardinality::Single
    }
}

/// Immutable definition of one aspect type: stable id, display name and the
/// ordered attribute list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectMetadata {
    pub id: AspectId,
    pub name: String,
    pub attributes: Vec<AttributeSpec>,
}

impl AspectMetadata {
    pub fn new(id: AspectId, name: impl Into<String>, attributes: Vec<AttributeSpec>) -> Self {
        AspectMetadata {
            id,
            name: name.into(),
            attributes,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|spec| spec.name == name)
    }

    pub fn single_value_attributes(&self) -> impl Iterator<Item = &AttributeSpec> {
        self.attributes.iter().filter(|spec| spec.is_single())
    }

    pub fn multi_value_attributes(&self) -> impl Iterator<Item = &AttributeSpec> {
        self.attributes.iter().filter(|spec| !spec.is_single())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> AspectMetadata {
        AspectMetadata::new(
            AspectId::new(),
            "audio",
            vec![
                AttributeSpec::single("title", AttributeType::text(200)),
                AttributeSpec::single("duration", AttributeType::Integer),
                AttributeSpec::multi("genres", AttributeType::text(100)),
            ],
        )
    }

    #[test]
    fn attribute_lookup_by_name() {
        let meta = sample_metadata();
        assert!(meta.attribute("title").is_some());
        assert!(meta.attribute("missing").is_none());
    }

    #[test]
    fn cardinality_partitions() {
        let meta = sample_metadata();
        assert_eq!(meta.single_value_attributes().count(), 2);
        assert_eq!(meta.multi_value_attributes().count(), 1);
    }

    #[test]
    fn large_text_flag() {
        assert!(AttributeType::large_text().is_large_text());
        assert!(!AttributeType::text(50).is_large_text());
        assert!(AttributeType::large_text().is_text());
    }

    #[test]
    fn metadata_serde_round_trip() {
        let meta = sample_metadata();
        let json = serde_json::to_string(&meta).unwrap();
        let back: AspectMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
