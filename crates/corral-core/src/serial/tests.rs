use super::*;
use crate::{
    registry::EntityDef,
    source::{MemorySource, Record},
};

fn seeded(rows: u64) -> MemorySource {
    let mut source = MemorySource::new();
    source.extend(
        "widgets",
        (1..=rows).map(|i| {
            let color = if i % 2 == 0 { "red" } else { "blue" };
            Record::from_pairs([
                ("id", Value::Uint(i)),
                ("name", Value::Text(format!("w{i}"))),
                ("color", Value::Text(color.to_string())),
                ("price", Value::Uint(i * 10)),
            ])
        }),
    );
    source.extend(
        "gadgets",
        (1..=3u64).map(|i| {
            Record::from_pairs([("id", Value::Uint(i)), ("size", Value::Uint(i * 2))])
        }),
    );
    source
}

fn setup(rows: u64) -> (Arc<Registry>, Arc<dyn DataSource>) {
    let mut registry = Registry::new();
    registry
        .register_entity(EntityDef::new("Widget").with_columns(["id", "name", "color", "price"]))
        .unwrap();
    registry
        .register_entity(EntityDef::new("Gadget").with_columns(["id", "size"]))
        .unwrap();
    registry
        .register_collection(crate::registry::CollectionDef::new("Widgets"))
        .unwrap();
    (Arc::new(registry), Arc::new(seeded(rows)))
}

fn widgets(rows: u64) -> Collection {
    let (registry, source) = setup(rows);
    Collection::new(registry, source, "Widgets").unwrap()
}

#[test]
fn the_wire_example_holds_exactly() {
    let collection = widgets(10)
        .filter(Criteria::column("color", "red"))
        .order(["name"])
        .limit(Some(10));

    let repr = collection.to_primitive().unwrap();
    assert_eq!(repr.entity_type.as_deref(), Some("Widget"));
    assert_eq!(repr.collection_type.as_deref(), Some("Widgets"));
    assert_eq!(repr.order, ["name"]);
    assert_eq!(repr.limit, Some(10));
    assert_eq!(repr.offset, None);
    assert!(repr.bind.is_empty());

    let mut columns = BTreeMap::new();
    columns.insert("color".to_string(), Value::Text("red".into()));
    let mut map = BTreeMap::new();
    map.insert("widgets".to_string(), columns);
    assert_eq!(repr.where_clause, vec![WhereNode::Map(map)]);

    let json = collection.to_json().unwrap();
    assert!(json.contains(r#""where":[{"widgets":{"color":"red"}}]"#));
    assert!(json.contains(r#""order":["name"]"#));
    assert!(json.contains(r#""limit":10"#));
    assert!(json.contains(r#""offset":null"#));
}

#[test]
fn equal_table_fragments_merge_at_the_head() {
    let repr = widgets(10)
        .filter(Criteria::column("color", "red"))
        .filter(Criteria::column("name", "w2"))
        .to_primitive()
        .unwrap();

    assert_eq!(repr.where_clause.len(), 1);
    match &repr.where_clause[0] {
        WhereNode::Map(map) => {
            let columns = &map["widgets"];
            assert_eq!(columns.len(), 2);
            assert_eq!(columns["color"], Value::Text("red".into()));
            assert_eq!(columns["name"], Value::Text("w2".into()));
        }
        other => panic!("expected merged map, got {other:?}"),
    }
    // Every bound value was consumed exactly once.
    assert!(repr.bind.is_empty());
}

#[test]
fn duplicate_column_fragments_stay_separate() {
    let repr = widgets(10)
        .filter(Criteria::column("color", "red"))
        .filter(Criteria::column("color", "blue"))
        .to_primitive()
        .unwrap();

    // Merging both would silently drop one predicate; the second fragment
    // keeps its own node instead.
    assert_eq!(repr.where_clause.len(), 2);
}

#[test]
fn round_trip_reproduces_the_result_set() {
    let (registry, source) = setup(10);
    let original = Collection::new(registry.clone(), source.clone(), "Widgets")
        .unwrap()
        .filter(Criteria::column("color", "red"))
        .order(["id desc"])
        .limit(Some(3));

    let repr = original.to_primitive().unwrap();
    let decoded = Collection::from_primitive(registry, source, &repr).unwrap();

    assert_eq!(decoded.record_ids().unwrap(), original.record_ids().unwrap());
    assert_eq!(
        original.record_ids().unwrap(),
        vec![Value::Uint(10), Value::Uint(8), Value::Uint(6)]
    );
}

#[test]
fn negation_round_trips_without_drift() {
    let (registry, source) = setup(10);
    let original = Collection::new(registry.clone(), source.clone(), "Widgets")
        .unwrap()
        .not(Criteria::column("color", "red"));

    let first = original.to_primitive().unwrap();
    let decoded = Collection::from_primitive(registry.clone(), source.clone(), &first).unwrap();
    let second = decoded.to_primitive().unwrap();

    // Same negation shape after a full cycle: no double negative, no lost
    // negation.
    assert_eq!(first.where_clause, second.where_clause);
    assert!(matches!(first.where_clause[0], WhereNode::Not { .. }));
    assert_eq!(decoded.total_count().unwrap(), 5);
}

#[test]
fn disjunctions_round_trip() {
    let (registry, source) = setup(10);
    let original = Collection::new(registry.clone(), source.clone(), "Widgets")
        .unwrap()
        .filter(Criteria::column("color", "red"))
        .or(Criteria::column("id", 1u64));

    let repr = original.to_primitive().unwrap();
    assert!(matches!(repr.where_clause[0], WhereNode::Or { .. }));

    let decoded = Collection::from_primitive(registry, source, &repr).unwrap();
    assert_eq!(decoded.total_count().unwrap(), 6);
    assert_eq!(original.total_count().unwrap(), 6);
}

#[test]
fn cursors_serialize_as_their_window() {
    let repr = widgets(10).per(3).page(2).to_primitive().unwrap();
    assert_eq!(repr.limit, Some(3));
    assert_eq!(repr.offset, Some(3));
}

#[test]
fn raw_fragments_pass_through_verbatim() {
    let original = widgets(10)
        .filter_raw("price > ?", vec![Value::Uint(30)])
        .unwrap();

    let repr = original.to_primitive().unwrap();
    assert_eq!(repr.where_clause, vec![WhereNode::Raw("price > ?".into())]);
    assert_eq!(repr.bind.len(), 1);
    assert_eq!(repr.bind[0].name, "$1");
    assert_eq!(repr.bind[0].value, Value::Uint(30));

    let (registry, source) = setup(10);
    let decoded = Collection::from_primitive(registry, source, &repr).unwrap();
    assert!(decoded.spec().predicate().unwrap().has_raw());
    assert_eq!(decoded.to_primitive().unwrap().where_clause, repr.where_clause);
}

#[test]
fn dollar_placeholders_are_normalized_on_replay() {
    let (registry, source) = setup(10);
    let repr = CollectionRepr {
        entity_type: Some("Widget".to_string()),
        where_clause: vec![WhereNode::Raw("price > $1".to_string())],
        bind: vec![Bind {
            name: "$1".to_string(),
            value: Value::Uint(30),
        }],
        ..CollectionRepr::default()
    };

    let decoded = Collection::from_primitive(registry, source, &repr).unwrap();
    let again = decoded.to_primitive().unwrap();
    assert_eq!(again.where_clause, vec![WhereNode::Raw("price > ?".into())]);
    assert_eq!(again.bind[0].value, Value::Uint(30));
}

#[test]
fn range_comparisons_degrade_to_fragments() {
    let repr = widgets(10)
        .filter_predicate(Predicate::gt("price", Value::Uint(30)))
        .to_primitive()
        .unwrap();

    assert_eq!(
        repr.where_clause,
        vec![WhereNode::Raw("widgets.price > ?".into())]
    );
    assert_eq!(repr.bind.len(), 1);
}

#[test]
fn in_comparisons_expand_one_placeholder_per_element() {
    let repr = widgets(10)
        .filter_predicate(Predicate::in_(
            "id",
            vec![Value::Uint(1), Value::Uint(2)],
        ))
        .to_primitive()
        .unwrap();

    assert_eq!(
        repr.where_clause,
        vec![WhereNode::Raw("widgets.id IN (?, ?)".into())]
    );
    assert_eq!(repr.bind.len(), 2);
}

#[test]
fn ne_comparisons_keep_their_structural_spelling() {
    let (registry, source) = setup(10);
    let original = Collection::new(registry.clone(), source.clone(), "Widgets")
        .unwrap()
        .filter_predicate(Predicate::ne("color", Value::Text("red".into())));

    let repr = original.to_primitive().unwrap();
    assert!(matches!(repr.where_clause[0], WhereNode::Not { .. }));

    let decoded = Collection::from_primitive(registry, source, &repr).unwrap();
    assert_eq!(decoded.total_count().unwrap(), 5);
}

#[test]
fn anonymous_collections_travel_by_entity_alone() {
    let (registry, source) = setup(6);
    let original = Collection::over(registry.clone(), source.clone(), "Gadget")
        .unwrap()
        .filter(Criteria::column("size", 4u64));

    let repr = original.to_primitive().unwrap();
    assert_eq!(repr.entity_type.as_deref(), Some("Gadget"));
    assert_eq!(repr.collection_type, None);

    let decoded = Collection::from_primitive(registry, source, &repr).unwrap();
    assert_eq!(decoded.total_count().unwrap(), 1);
}

#[test]
fn unknown_references_fail_typed() {
    let (registry, source) = setup(0);

    let repr = CollectionRepr {
        collection_type: Some("Ghosts".to_string()),
        ..CollectionRepr::default()
    };
    let err = Collection::from_primitive(registry.clone(), source.clone(), &repr).unwrap_err();
    assert!(matches!(
        err,
        Error::Serial(SerialError::InvalidReference { .. })
    ));

    let repr = CollectionRepr {
        entity_type: Some("Phantom".to_string()),
        ..CollectionRepr::default()
    };
    let err = Collection::from_primitive(registry.clone(), source.clone(), &repr).unwrap_err();
    assert!(matches!(
        err,
        Error::Serial(SerialError::InvalidReference { .. })
    ));

    let repr = CollectionRepr::default();
    let err = Collection::from_primitive(registry, source, &repr).unwrap_err();
    assert!(matches!(
        err,
        Error::Serial(SerialError::InvalidReference { .. })
    ));
}

#[test]
fn incompatible_type_pairs_are_rejected() {
    let (registry, source) = setup(0);
    let repr = CollectionRepr {
        collection_type: Some("Widgets".to_string()),
        entity_type: Some("Gadget".to_string()),
        ..CollectionRepr::default()
    };
    let err = Collection::from_primitive(registry, source, &repr).unwrap_err();
    assert!(matches!(
        err,
        Error::Serial(SerialError::InvalidReference { .. })
    ));
}
