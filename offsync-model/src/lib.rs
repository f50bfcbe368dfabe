//! Entity identity model for offsync.
//!
//! Defines how the synchronization layer tells two instances of an entity
//! type apart:
//! - [`HasIdentity`]: the capability an entity type implements to declare its
//!   properties and (optionally) its explicit key properties
//! - [`EntityIdentity`]: the resolved, ordered identifier property names of a type
//! - [`IdentityKey`]: identifier values read off one instance
//! - [`EntityTypeRegistry`]: a shared, lazily populated cache of identities
//!
//! Identity resolution is a registration-time declaration rather than runtime
//! introspection: every entity type states its properties, and the naming
//! convention is only applied to that declared list.

mod entity;
mod error;
mod identity;
mod registry;

pub use entity::{HasIdentity, IdentityKey};
pub use error::{ModelError, ModelResult};
pub use identity::{CONVENTION_NAMES, CONVENTION_SUFFIXES, EntityIdentity};
pub use registry::EntityTypeRegistry;
