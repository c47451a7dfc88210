//! Provider catalog and access credentials.
//!
//! Everything here is pure and synchronous: a static registry of the
//! providers the console knows about, the field schemas their payloads must
//! satisfy, and the typed [`AccessConfig`] those payloads decode into.

pub mod access;
pub mod error;
pub mod registry;
pub mod schema;

pub use access::{validate_access, Access, AccessConfig, AccessRecord};
pub use error::{ProviderKind, Reason, UnknownProviderError, ValidationError, ValidationErrors};
pub use registry::{
    AccessProvider, AccessProviderDescriptor, AccessUsage, ApplyDnsProvider,
    ApplyDnsProviderDescriptor, DeployProvider, DeployProviderDescriptor, ProviderRegistry,
};
pub use schema::{check_fields, check_value, FieldKind, FieldSpec, Presence};
