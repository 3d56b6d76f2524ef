//! Media items: an opaque identity plus the aspect instances attached to it.

use crate::aspect::{AspectId, AspectInstance, ProviderResourceAspect};
use crate::error::{LibraryError, Result};
use crate::resource_path::ResourcePath;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaItemId(pub Uuid);

impl MediaItemId {
    pub fn new() -> Self {
        MediaItemId(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(MediaItemId)
            .map_err(|e| LibraryError::Other(anyhow::anyhow!("invalid media item id '{s}': {e}")))
    }
}

impl Default for MediaItemId {
    fn default() -> Self {
        MediaItemId::new()
    }
}

impl fmt::Display for MediaItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One materialized item: its id and whichever aspects the query attached.
#[derive(Debug, Clone)]
pub struct MediaItem {
    pub id: MediaItemId,
    aspects: HashMap<AspectId, AspectInstance>,
}

impl MediaItem {
    pub fn new(id: MediaItemId) -> Self {
        MediaItem {
            id,
            aspects: HashMap::new(),
        }
    }

    pub fn attach(&mut self, instance: AspectInstance) {
        self.aspects.insert(instance.aspect_id, instance);
    }

    pub fn aspect(&self, aspect_id: AspectId) -> Option<&AspectInstance> {
        self.aspects.get(&aspect_id)
    }

    pub fn detach(&mut self, aspect_id: AspectId) -> Option<AspectInstance> {
        self.aspects.remove(&aspect_id)
    }

    pub fn aspects(&self) -> impl Iterator<Item = &AspectInstance> {
        self.aspects.values()
    }

    /// Owning system id, when the provider-resource aspect is attached.
    pub fn system_id(&self) -> Option<&str> {
        self.aspect(ProviderResourceAspect::ASPECT_ID)?
            .get(ProviderResourceAspect::ATTR_SYSTEM_ID)?
            .as_text()
    }

    /// Resource path, when the provider-resource aspect is attached.
    pub fn resource_path(&self) -> Option<ResourcePath> {
        let serialized = self
            .aspect(ProviderResourceAspect::ASPECT_ID)?
            .get(ProviderResourceAspect::ATTR_PATH)?
            .as_text()?;
        ResourcePath::parse(serialized).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_and_path_come_from_provider_aspect() {
        let mut item = MediaItem::new(MediaItemId::new());
        assert!(item.system_id().is_none());

        let path = ResourcePath::new("fs", "/x/y.mkv");
        item.attach(ProviderResourceAspect::instance("sys-1", &path));
        assert_eq!(item.system_id(), Some("sys-1"));
        assert_eq!(item.resource_path(), Some(path));
    }

    #[test]
    fn item_id_parse_round_trips() {
        let id = MediaItemId::new();
        assert_eq!(MediaItemId::parse(&id.to_string()).unwrap(), id);
        assert!(MediaItemId::parse("not-a-uuid").is_err());
    }
}
