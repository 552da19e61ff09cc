#![allow(dead_code)]

use chrono::{DateTime, Utc};
use inventory_query::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum ItemStatus {
    #[default]
    Active,
    Discontinued,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub sku: String,
    pub quantity: i32,
    pub price: Decimal,
    pub status: ItemStatus,
    pub tags: Vec<String>,
    pub received_at: DateTime<Utc>,
    pub owner_id: Option<Uuid>,
}

impl Entity for Item {
    fn describe() -> TableBuilder {
        TableBuilder::new("Items")
            .key("id", FieldType::Int64)
            .field("name", FieldType::Text)
            .max_length(200)
            .field("sku", FieldType::Text)
            .field("quantity", FieldType::Int32)
            .field("price", FieldType::Decimal)
            .field("status", FieldType::Enum(&["Active", "Discontinued"]))
            .list("tags")
            .field("received_at", FieldType::Timestamp)
            .owned_by("owner_id")
            .sortable(&["name", "quantity", "price"])
    }
}

impl Item {
    pub fn named(name: &str, quantity: i32) -> Self {
        Self {
            name: name.to_string(),
            sku: format!("SKU-{}", name.to_uppercase().replace(' ', "-")),
            quantity,
            price: Decimal::new(250, 2),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl Entity for Category {
    fn describe() -> TableBuilder {
        TableBuilder::new("Categories")
            .key("id", FieldType::Uuid)
            .field("name", FieldType::Text)
            .optional("description", FieldType::Text)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub code: String,
    pub aisle: String,
}

impl Entity for Location {
    fn describe() -> TableBuilder {
        TableBuilder::new("Locations")
            .key("code", FieldType::Text)
            .max_length(64)
            .field("aisle", FieldType::Text)
    }
}

pub fn init_tracing() {
    let _subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn generator() -> SchemaGenerator {
    SchemaGenerator::new()
        .with::<Item>()
        .and_then(|g| g.with::<Category>())
        .unwrap()
}

#[cfg(feature = "sqlite")]
pub async fn sqlite_provider() -> StorageProvider<SqliteBackend> {
    init_tracing();
    StorageProvider::connect(&StoreConfig::default(), generator())
        .await
        .unwrap()
}
