//! Identifier resolution for entity types.
//!
//! Resolution order:
//! 1. Properties explicitly marked as keys ([`HasIdentity::key_properties`]).
//! 2. The first declared property matching `{TypeName}Id`, `{TypeName}Key`,
//!    `Id`, `UniqueIdentifier`, `UniqueId` (checked in that order).
//!
//! Convention matching ignores ASCII case and underscores, so `order_id`
//! satisfies `OrderId`. Resolved names are reported exactly as declared.

use crate::entity::{HasIdentity, IdentityKey};
use crate::error::{ModelError, ModelResult};
use std::any::TypeId;

/// Suffixes appended to the type name, tried before [`CONVENTION_NAMES`].
pub const CONVENTION_SUFFIXES: [&str; 2] = ["Id", "Key"];

/// Type-independent identifier names, tried in order.
pub const CONVENTION_NAMES: [&str; 3] = ["Id", "UniqueIdentifier", "UniqueId"];

/// The resolved identity descriptor of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityIdentity {
    type_id: TypeId,
    entity_type: &'static str,
    identifier_names: Vec<&'static str>,
}

impl EntityIdentity {
    /// Resolves the identifier properties of `T`.
    pub fn resolve<T: HasIdentity>() -> ModelResult<Self> {
        let declared = T::property_names();
        let explicit = T::key_properties();

        let identifier_names = if explicit.is_empty() {
            match by_convention(T::ENTITY_TYPE, declared) {
                Some(name) => vec![name],
                None => {
                    return Err(ModelError::IdentityResolution {
                        entity_type: T::ENTITY_TYPE.to_string(),
                        reason: format!(
                            "no key properties and no conventional identifier among {declared:?}"
                        ),
                    });
                }
            }
        } else {
            let mut names: Vec<&'static str> = Vec::with_capacity(explicit.len());
            for key in explicit {
                if !declared.contains(key) {
                    return Err(ModelError::IdentityResolution {
                        entity_type: T::ENTITY_TYPE.to_string(),
                        reason: format!("key property `{key}` is not a declared property"),
                    });
                }
                if !names.contains(key) {
                    names.push(*key);
                }
            }
            names
        };

        Ok(Self {
            type_id: TypeId::of::<T>(),
            entity_type: T::ENTITY_TYPE,
            identifier_names,
        })
    }

    /// The described type's name.
    pub fn entity_type(&self) -> &'static str {
        self.entity_type
    }

    /// The described type's `TypeId`.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Identifier property names in resolution order.
    pub fn identifier_names(&self) -> &[&'static str] {
        &self.identifier_names
    }

    /// Returns true if this identity was resolved for `T`.
    pub fn describes<T: HasIdentity>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Reads the identifier values off `entity`.
    pub fn extract_identifiers<T: HasIdentity>(&self, entity: &T) -> ModelResult<IdentityKey> {
        if !self.describes::<T>() {
            return Err(ModelError::InvalidEntity {
                entity_type: self.entity_type.to_string(),
                reason: format!("got an entity of type `{}`", T::ENTITY_TYPE),
            });
        }

        let value = serde_json::to_value(entity)?;
        let Some(fields) = value.as_object() else {
            return Err(ModelError::InvalidEntity {
                entity_type: self.entity_type.to_string(),
                reason: "entity does not serialize to an object".to_string(),
            });
        };

        let mut values = Vec::with_capacity(self.identifier_names.len());
        for name in &self.identifier_names {
            match fields.get(*name) {
                Some(v) => values.push(v.clone()),
                None => {
                    return Err(ModelError::InvalidEntity {
                        entity_type: self.entity_type.to_string(),
                        reason: format!("identifier property `{name}` is missing"),
                    });
                }
            }
        }

        Ok(IdentityKey::new(values))
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn by_convention(type_name: &str, declared: &[&'static str]) -> Option<&'static str> {
    let candidates = CONVENTION_SUFFIXES
        .iter()
        .map(|suffix| format!("{type_name}{suffix}"))
        .chain(CONVENTION_NAMES.iter().map(|name| (*name).to_string()));

    for candidate in candidates {
        let wanted = normalize(&candidate);
        if let Some(found) = declared.iter().find(|p| normalize(p) == wanted) {
            return Some(*found);
        }
    }
    None
}
