//! Shared fixtures for the integration suites: a retailer/product catalog
//! over the in-memory reference source.

// Each suite uses a subset of these helpers.
#![allow(dead_code)]

use corral::prelude::*;
use std::sync::Arc;

pub fn registry() -> Arc<Registry> {
    let mut registry = Registry::new();
    registry
        .register_entity(
            EntityDef::new("Retailer").with_columns(["id", "name", "region"]),
        )
        .unwrap();
    registry
        .register_entity(EntityDef::new("StockedProduct").with_columns([
            "id",
            "retailer_id",
            "product_id",
            "price",
        ]))
        .unwrap();
    registry
        .register_collection(CollectionDef::new("Retailers"))
        .unwrap();
    registry
        .register_collection(
            CollectionDef::new("StockedProducts")
                .with_default_batch_size(200)
                .with_batching_threshold(500),
        )
        .unwrap();
    registry
        .register_collection(
            CollectionDef::new("ProductCollection").with_entity("StockedProduct"),
        )
        .unwrap();
    registry
        .register_collection(
            CollectionDef::new("MoreRetailers").with_parent("Retailers"),
        )
        .unwrap();
    Arc::new(registry)
}

pub fn seeded(stocked: u64) -> Arc<dyn DataSource> {
    let mut source = MemorySource::new();
    source.extend(
        "retailers",
        (1..=5u64).map(|i| {
            let region = if i <= 2 { "north" } else { "south" };
            Record::from_pairs([
                ("id", Value::Uint(i)),
                ("name", Value::Text(format!("retailer {i}"))),
                ("region", Value::Text(region.to_string())),
            ])
        }),
    );
    source.extend(
        "stocked_products",
        (1..=stocked).map(|i| {
            Record::from_pairs([
                ("id", Value::Uint(i)),
                ("retailer_id", Value::Uint(i % 5 + 1)),
                ("product_id", Value::Uint(i % 7 + 1)),
                ("price", Value::Uint(i * 3)),
            ])
        }),
    );
    Arc::new(source)
}

pub fn stocked_products(rows: u64) -> Collection {
    Collection::new(registry(), seeded(rows), "StockedProducts").unwrap()
}
