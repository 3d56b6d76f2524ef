//! Built-in aspects every library instance registers at startup.

use super::metadata::{AspectId, AspectMetadata, AttributeSpec, AttributeType};
use super::value::AttributeValue;
use crate::resource_path::ResourcePath;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::instance::AspectInstance;

/// Provider-resource aspect: where an item's bytes live. Attached to every
/// persisted item; (system_id, path) is the unique item lookup key.
pub struct ProviderResourceAspect;

impl ProviderResourceAspect {
    pub const ASPECT_ID: AspectId =
        AspectId(Uuid::from_u128(0x5f40_1bfc_7e94_41a2_b1d7_02a1f7b0d3e1));
    pub const ATTR_SYSTEM_ID: &'static str = "system_id";
    pub const ATTR_PATH: &'static str = "path";

    pub fn instance(system_id: &str, path: &ResourcePath) -> AspectInstance {
        AspectInstance::new(Self::ASPECT_ID)
            .set(Self::ATTR_SYSTEM_ID, system_id)
            .set(Self::ATTR_PATH, path.serialize())
    }
}

pub fn provider_resource() -> AspectMetadata {
    AspectMetadata::new(
        ProviderResourceAspect::ASPECT_ID,
        "provider_resource",
        vec![
            AttributeSpec::single(
                ProviderResourceAspect::ATTR_SYSTEM_ID,
                AttributeType::text(64),
            ),
            AttributeSpec::single(ProviderResourceAspect::ATTR_PATH, AttributeType::text(1024)),
        ],
    )
}

/// Importer bookkeeping: first/last time the importer saw the item and a
/// dirty flag for items whose bytes changed since the last refresh.
pub struct ImporterStateAspect;

impl ImporterStateAspect {
    pub const ASPECT_ID: AspectId =
        AspectId(Uuid::from_u128(0x1c6e_83df_2294_4f0a_9c55_3b84a07d95b2));
    pub const ATTR_FIRST_SEEN: &'static str = "first_seen";
    pub const ATTR_LAST_SEEN: &'static str = "last_seen";
    pub const ATTR_DIRTY: &'static str = "dirty";

    pub fn fresh(now: DateTime<Utc>) -> AspectInstance {
        AspectInstance::new(Self::ASPECT_ID)
            .set(Self::ATTR_FIRST_SEEN, AttributeValue::DateTime(now))
            .set(Self::ATTR_LAST_SEEN, AttributeValue::DateTime(now))
            .set(Self::ATTR_DIRTY, false)
    }
}

pub fn importer_state() -> AspectMetadata {
    AspectMetadata::new(
        ImporterStateAspect::ASPECT_ID,
        "importer_state",
        vec![
            AttributeSpec::single(ImporterStateAspect::ATTR_FIRST_SEEN, AttributeType::DateTime),
            AttributeSpec::single(ImporterStateAspect::ATTR_LAST_SEEN, AttributeType::DateTime),
            AttributeSpec::single(ImporterStateAspect::ATTR_DIRTY, AttributeType::Bool),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_aspect_ids_are_distinct_and_stable() {
        assert_ne!(
            ProviderResourceAspect::ASPECT_ID,
            ImporterStateAspect::ASPECT_ID
        );
        assert_eq!(provider_resource().id, ProviderResourceAspect::ASPECT_ID);
        assert_eq!(importer_state().id, ImporterStateAspect::ASPECT_ID);
    }

    #[test]
    fn provider_instance_carries_serialized_path() {
        let path = ResourcePath::new("fs", "/a.mkv");
        let instance = ProviderResourceAspect::instance("sys-1", &path);
        assert_eq!(
            instance
                .get(ProviderResourceAspect::ATTR_PATH)
                .unwrap()
                .as_text(),
            Some("fs:///a.mkv")
        );
    }
}
