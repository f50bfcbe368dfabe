#![allow(dead_code)]

use offsync_model::HasIdentity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "OrderId")]
    pub order_id: u64,
    #[serde(rename = "Total")]
    pub total: u32,
}

impl HasIdentity for Order {
    const ENTITY_TYPE: &'static str = "Order";

    fn property_names() -> &'static [&'static str] {
        &["OrderId", "Total"]
    }
}

/// Declares both `CustomerKey` and `Id`; the type-prefixed name wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(rename = "Id")]
    pub id: u64,
    #[serde(rename = "CustomerKey")]
    pub customer_key: String,
}

impl HasIdentity for Customer {
    const ENTITY_TYPE: &'static str = "Customer";

    fn property_names() -> &'static [&'static str] {
        &["Id", "CustomerKey"]
    }
}

/// Snake-case fields matched case- and underscore-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub unique_id: String,
    pub amount: i64,
}

impl HasIdentity for Invoice {
    const ENTITY_TYPE: &'static str = "Invoice";

    fn property_names() -> &'static [&'static str] {
        &["unique_id", "amount"]
    }
}

/// Composite explicit key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub order: u64,
    pub line: u32,
    pub sku: String,
}

impl HasIdentity for LineItem {
    const ENTITY_TYPE: &'static str = "LineItem";

    fn property_names() -> &'static [&'static str] {
        &["order", "line", "sku"]
    }

    fn key_properties() -> &'static [&'static str] {
        &["order", "line", "order"]
    }
}

/// No property satisfies the convention and no explicit keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub title: String,
}

impl HasIdentity for Note {
    const ENTITY_TYPE: &'static str = "Note";

    fn property_names() -> &'static [&'static str] {
        &["title"]
    }
}

/// Explicit key that is not declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broken {
    pub id: u64,
}

impl HasIdentity for Broken {
    const ENTITY_TYPE: &'static str = "Broken";

    fn property_names() -> &'static [&'static str] {
        &["id"]
    }

    fn key_properties() -> &'static [&'static str] {
        &["serial"]
    }
}

/// Declares a property the serialized form does not carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ghost {
    pub name: String,
}

impl HasIdentity for Ghost {
    const ENTITY_TYPE: &'static str = "Ghost";

    fn property_names() -> &'static [&'static str] {
        &["GhostId", "name"]
    }
}
