use std::fmt;
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use rustmemorm::prelude::*;

#[derive(Debug, Default, ValueObject)]
struct Tags(Mutex<Vec<String>>);

impl Tags {
    fn add(&self, tag: &str) {
        self.0.lock().unwrap().push(tag.to_string());
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.lock().unwrap().join(","))
    }
}

#[derive(Debug, ValueObject)]
#[value_object(snapshot = "debug", type_name = "Money")]
struct Money {
    cents: Mutex<i64>,
}

fn with_tags(tags: &Arc<Tags>) -> Entity {
    Entity::plain(
        value_map! { "id" => 1, "tags" => Value::Object(tags.clone() as Arc<dyn ValueObject>) },
        false,
    )
    .unwrap()
}

#[test]
fn test_in_place_mutation_is_detected() {
    let tags = Arc::new(Tags::default());
    tags.add("a");
    let mut entity = with_tags(&tags);
    assert!(!entity.is_modified("tags").unwrap());

    tags.add("b");

    assert!(entity.is_modified("tags").unwrap());
    let updated = entity.values_updated().unwrap();
    assert_eq!(updated.keys().collect::<Vec<_>>(), vec!["tags"]);
    assert_eq!(updated.get("tags").map(Value::to_text), Some("a,b".to_string()));
}

#[test]
fn test_reset_takes_a_new_snapshot() {
    let tags = Arc::new(Tags::default());
    let mut entity = with_tags(&tags);
    tags.add("x");

    entity.reset_modified(None).unwrap();
    assert!(!entity.is_modified("tags").unwrap());

    tags.add("y");
    assert!(entity.is_modified("tags").unwrap());
}

#[test]
fn test_debug_snapshot_and_type_name() {
    let money = Arc::new(Money { cents: Mutex::new(100) });
    let value = Value::Object(money.clone() as Arc<dyn ValueObject>);

    assert_eq!(value.type_name(), "Money");
    assert!(value.snapshot().unwrap().contains("100"));

    let mut entity = Entity::plain(value_map! { "price" => value.clone() }, false).unwrap();
    *money.cents.lock().unwrap() = 250;
    assert!(entity.is_modified("price").unwrap());
    assert!(value.downcast_ref::<Money>().is_some());
    assert!(value.downcast_ref::<Tags>().is_none());
}

#[test]
fn test_instance_of_transformer() {
    let definition = Arc::new(ModelDefinition::new("Product").transform("price", [Transformer::instance_of::<Money>()]));
    let mut product = Entity::new(definition, ValueMap::new(), true).unwrap();

    assert!(product.set("price", Value::object(Money { cents: Mutex::new(5) })).is_ok());
    assert!(matches!(
        product.set("price", Value::object(Tags::default())),
        Err(DbError::TypeMismatch(_))
    ));
    assert!(matches!(product.set("price", 5), Err(DbError::TypeMismatch(_))));
    assert!(product.set("price", Value::Null).is_ok());
}

#[test]
fn test_replaced_object_keeps_original_instance() {
    let mut entity = Entity::plain(
        value_map! { "price" => Value::object(Money { cents: Mutex::new(100) }) },
        false,
    )
    .unwrap();

    entity.set("price", Value::object(Money { cents: Mutex::new(250) })).unwrap();

    let old = entity.values_old().unwrap();
    let original = old.get("price").unwrap();
    assert_eq!(original.type_name(), "Money");
    assert_eq!(*original.downcast_ref::<Money>().unwrap().cents.lock().unwrap(), 100);
    assert_eq!(
        entity.value_orig("price").unwrap().downcast_ref::<Money>().map(|m| *m.cents.lock().unwrap()),
        Some(100)
    );
}
