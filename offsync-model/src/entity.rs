use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

/// Capability implemented by every entity type that can be cached and
/// synchronized.
///
/// Property names are the entity's *serialized* field names, so they must
/// match whatever `serde` emits (including `rename` attributes).
///
/// ```
/// use offsync_model::HasIdentity;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Order {
///     #[serde(rename = "OrderId")]
///     order_id: u64,
///     total: u32,
/// }
///
/// impl HasIdentity for Order {
///     const ENTITY_TYPE: &'static str = "Order";
///
///     fn property_names() -> &'static [&'static str] {
///         &["OrderId", "total"]
///     }
/// }
/// ```
pub trait HasIdentity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The entity type name. Used as the `{TypeName}` prefix of the naming
    /// convention and as the type tag on remote records.
    const ENTITY_TYPE: &'static str;

    /// All declared properties, in declaration order.
    fn property_names() -> &'static [&'static str];

    /// Properties explicitly marked as keys. When non-empty these take
    /// precedence over the naming convention.
    fn key_properties() -> &'static [&'static str] {
        &[]
    }
}

/// Identifier values read off one entity, in the order fixed by its
/// [`EntityIdentity`](crate::EntityIdentity).
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityKey {
    values: Vec<serde_json::Value>,
    fingerprint: String,
}

impl IdentityKey {
    /// Builds a key from identifier values.
    pub fn new(values: Vec<serde_json::Value>) -> Self {
        // Arrays of JSON values always serialize; object keys come out sorted.
        let fingerprint = serde_json::Value::Array(values.clone()).to_string();
        Self { values, fingerprint }
    }

    /// The identifier values.
    pub fn values(&self) -> &[serde_json::Value] {
        &self.values
    }

    /// Canonical string form, equal for equal keys. Used as an index key.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl Eq for IdentityKey {}

impl std::hash::Hash for IdentityKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.fingerprint.hash(state);
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint)
    }
}
