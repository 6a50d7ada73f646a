mod support;

use corral::prelude::*;
use support::{registry, seeded, stocked_products};

#[test]
fn returns_the_same_records_as_a_directly_built_query() {
    let collection = stocked_products(40).filter(Criteria::column("retailer_id", 3u64));

    let entity = collection.binding().unwrap();
    let direct_spec = QuerySpec::new().with_criteria(Criteria::column("retailer_id", 3u64));
    let source = seeded(40);
    let direct_count = source.count(&entity, &direct_spec).unwrap();
    let direct_ids: Vec<Value> = source
        .fetch(&entity, &direct_spec)
        .unwrap()
        .iter()
        .map(|r| r.value("id"))
        .collect();

    assert_eq!(collection.count().unwrap(), direct_count);
    assert_eq!(collection.record_ids().unwrap(), direct_ids);
}

#[test]
fn not_excludes_records_matching_the_criteria() {
    let all = stocked_products(40);
    let included = all.filter(Criteria::column("retailer_id", 3u64));
    let excluded = all.not(Criteria::column("retailer_id", 3u64));

    assert_eq!(
        included.count().unwrap() + excluded.count().unwrap(),
        all.count().unwrap()
    );
    let ids = excluded.record_ids().unwrap();
    let included_ids = included.record_ids().unwrap();
    assert!(ids.iter().all(|id| !included_ids.contains(id)));
}

#[test]
fn chained_snapshots_are_independent() {
    let base = stocked_products(40);
    let cheap = base.filter_predicate(
        corral::core::predicate::Predicate::lte("price", Value::Uint(30)),
    );
    let ordered = base.order(["price desc"]);

    assert!(base.spec().predicate().is_none());
    assert!(base.spec().order().is_empty());
    assert_eq!(cheap.count().unwrap(), 10);
    assert_eq!(ordered.count().unwrap(), 40);
}

#[test]
fn the_binding_is_inferred_from_the_collection_type_name() {
    let collection = Collection::new(registry(), seeded(1), "Retailers").unwrap();
    assert_eq!(collection.binding().unwrap().name(), "Retailer");
    assert_eq!(collection.binding().unwrap().table(), "retailers");
}

#[test]
fn an_explicit_binding_overrides_the_convention() {
    let collection = Collection::new(registry(), seeded(1), "ProductCollection").unwrap();
    assert_eq!(collection.binding().unwrap().name(), "StockedProduct");
}

#[test]
fn a_child_collection_inherits_the_parent_binding() {
    let collection = Collection::new(registry(), seeded(1), "MoreRetailers").unwrap();
    assert_eq!(collection.binding().unwrap().name(), "Retailer");
}

#[test]
fn select_order_group_and_window_compose() {
    let collection = stocked_products(12)
        .select(["id", "price"])
        .order(["price desc"])
        .limit(Some(3));

    let rows = collection.records().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].value("price"), Value::Uint(36));
    // Projection narrowed the record to the selected columns.
    assert_eq!(rows[0].get("retailer_id"), None);
}

#[test]
fn delegation_falls_back_from_query_ops_to_columns() {
    let collection = stocked_products(10);

    match collection.delegate("price", &[]).unwrap() {
        Delegated::Batches(batches) => {
            let flat: Vec<Value> = batches.into_iter().flatten().collect();
            assert_eq!(flat.len(), 10);
        }
        other => panic!("expected batched column values, got {other:?}"),
    }

    assert!(collection.delegate("frobnicate", &[]).is_err());
}
