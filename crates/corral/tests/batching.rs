mod support;

use corral::prelude::*;
use support::stocked_products;

#[test]
fn default_batch_size_is_500() {
    assert_eq!(CollectionDef::new("Anything").default_batch_size(), 500);
}

#[test]
fn batch_size_is_overridable_per_collection_type() {
    let collection = stocked_products(1);
    assert_eq!(collection.def().default_batch_size(), 200);
}

#[test]
fn batching_threshold_defaults_to_disabled() {
    assert_eq!(CollectionDef::new("Anything").batching_threshold(), 0);
}

#[test]
fn batching_threshold_is_overridable_per_collection_type() {
    let collection = stocked_products(1);
    assert_eq!(collection.def().batching_threshold(), 500);
}

#[test]
fn whole_set_operations_auto_batch_past_the_threshold() {
    // threshold 500, batch size 200, total 1200: six ascending batches.
    let collection = stocked_products(1200);

    let mut batch_sizes = Vec::new();
    let mut all_ids = Vec::new();
    collection
        .each_batch(|batch| {
            batch_sizes.push(batch.len());
            all_ids.extend(batch.iter().map(|r| r.value("id")));
        })
        .unwrap();

    assert_eq!(collection.total_batches().unwrap(), 6);
    assert_eq!(batch_sizes, vec![200; 6]);
    assert!(batch_sizes.iter().all(|len| *len <= 200));

    // Every record exactly once, in ascending page order.
    assert_eq!(all_ids.len(), 1200);
    let expected: Vec<Value> = (1..=1200u64).map(Value::Uint).collect();
    assert_eq!(all_ids, expected);
}

#[test]
fn batch_lengths_sum_to_the_total_count() {
    let collection = stocked_products(1100);
    let total: u64 = collection
        .batch_map(|batch| batch.len() as u64)
        .unwrap()
        .into_iter()
        .sum();
    assert_eq!(total, collection.total_count().unwrap());
}

#[test]
fn small_sets_stay_unbatched() {
    let collection = stocked_products(120);
    let mut chunks = 0;
    collection.each_batch(|_| chunks += 1).unwrap();
    assert_eq!(chunks, 1);
    assert!(!collection.should_batch().unwrap());
}

#[test]
fn an_isolated_batch_never_re_batches() {
    let collection = stocked_products(1200);
    let second = collection.batch(2).as_batch();

    assert!(second.is_explicit_batch());
    assert_eq!(second.total_batches().unwrap(), 1);

    let rows = second.to_vec().unwrap();
    assert_eq!(rows.len(), 200);
    assert_eq!(rows[0].value("id"), Value::Uint(201));
}

#[test]
fn page_math_matches_the_invariants() {
    let collection = stocked_products(1050).per(100);

    let pages = collection.total_pages().unwrap();
    let total = collection.total_count().unwrap();
    assert_eq!(pages, 11);
    assert!((pages - 1) * 100 < total && total <= pages * 100);

    assert_eq!(collection.current_page(), 1);
    let last = collection.last_page().unwrap();
    assert_eq!(last.current_page(), 11);
    assert_eq!(last.records().unwrap().len(), 50);
    assert_eq!(last.next_page().unwrap().current_page(), 11);
}

#[test]
fn explicit_window_overrides_clear_batch_state() {
    let collection = stocked_products(1200).batch(3);
    assert!(collection.is_paginated());

    // Documented behavior: the raw window silently wins.
    let overridden = collection.limit(Some(10));
    assert!(!overridden.is_paginated());
    assert_eq!(overridden.records().unwrap().len(), 10);
}

#[test]
fn flat_batch_map_flattens_in_order() {
    let collection = stocked_products(600);
    let ids = collection
        .flat_batch_map(|batch| batch.iter().map(|r| r.value("id")).collect())
        .unwrap();
    assert_eq!(ids.len(), 600);
    assert_eq!(ids[0], Value::Uint(1));
    assert_eq!(ids[599], Value::Uint(600));
}
