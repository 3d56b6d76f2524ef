//! Aspect model: plugin-declared metadata schemas and per-item instances.

mod builtin;
mod instance;
mod metadata;
mod value;

pub use builtin::{importer_state, provider_resource, ImporterStateAspect, ProviderResourceAspect};
pub use instance::AspectInstance;
pub use metadata::{AspectId, AspectMetadata, AttributeSpec, AttributeType, Cardinality};
pub use value::AttributeValue;
