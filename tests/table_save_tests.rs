use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use rustmemorm::prelude::*;
use rustmemorm::{RecordingAdapter, RowCache};
use rustmemorm::mapper::MapperRegistry;

type EventLog = Arc<Mutex<Vec<&'static str>>>;

struct Fixture {
    table: Table,
    adapter: Arc<RecordingAdapter>,
    events: EventLog,
}

fn fixture(definition: TableDefinition) -> Fixture {
    let adapter = Arc::new(RecordingAdapter::new());
    let table = Table::new(
        definition,
        adapter.clone(),
        Arc::new(MapperRegistry::with_default_mappers()),
        Arc::new(RowCache::new()),
    );

    let events: EventLog = Arc::new(Mutex::new(Vec::new()));
    for event in TableEvent::ALL {
        let log = events.clone();
        table
            .on(event, move |event: TableEvent, _: &mut Entity| {
                log.lock().unwrap().push(event.as_str());
                Ok(())
            })
            .unwrap();
    }

    Fixture { table, adapter, events }
}

fn test_table() -> TableDefinition {
    TableDefinition::new("test").with_alias("t")
}

impl Fixture {
    fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }

    fn statements(&self) -> Vec<String> {
        self.adapter.statements().unwrap()
    }
}

#[test]
fn test_insert_filters_fields_and_pushes_returned_key() {
    let fx = fixture(test_table().available_fields(&["code", "name"]));
    fx.adapter.push_records(vec![value_map! { "id" => 555 }]).unwrap();

    let mut entity = Entity::plain(
        value_map! { "code" => "Code", "name" => "Name", "unknown" => "x" },
        true,
    )
    .unwrap();
    assert!(fx.table.insert(&mut entity).unwrap());

    assert_eq!(
        fx.statements(),
        vec!["/*test::insert*/\nINSERT INTO test (code, name) VALUES ('Code', 'Name') RETURNING id".to_string()]
    );
    assert_eq!(fx.events(), vec!["pre_insert", "pre_save", "post_insert", "post_save"]);
    assert_eq!(entity.get("id").unwrap(), Value::Integer(555));
    assert!(!entity.is_new());
    assert!(entity.values_updated().unwrap().is_empty());
}

#[test]
fn test_insert_without_writable_fields_is_a_no_op() {
    let fx = fixture(test_table().available_fields(&["code"]));
    let mut entity = Entity::plain(value_map! { "other" => 1 }, true).unwrap();

    assert!(!fx.table.insert(&mut entity).unwrap());
    assert!(fx.statements().is_empty());
    assert!(fx.events().is_empty());
    assert!(entity.is_new());
}

#[test]
fn test_insert_sees_hook_changes() {
    let fx = fixture(test_table().available_fields(&["code", "created_by"]));
    fx.table
        .add_listener("pre_save", |_: TableEvent, entity: &mut Entity| {
            entity.set("created_by", "system").map(|_| ())
        })
        .unwrap();

    let mut entity = Entity::plain(value_map! { "code" => "a" }, true).unwrap();
    fx.table.insert(&mut entity).unwrap();

    assert_eq!(
        fx.adapter.last_statement().unwrap().unwrap(),
        "/*test::insert*/\nINSERT INTO test (code, created_by) VALUES ('a', 'system') RETURNING id"
    );
    assert!(entity.values_updated().unwrap().is_empty());
}

#[test]
fn test_insert_maps_values_through_casts() {
    let fx = fixture(
        test_table()
            .cast("tags", &["pg_array"])
            .cast("active", &["pg_bool"])
            .cast("note", &["null", "string"]),
    );
    let mut entity = Entity::plain(
        value_map! {
            "tags" => Value::List(vec![Value::from("a"), Value::from("b")]),
            "active" => true,
            "note" => "",
        },
        true,
    )
    .unwrap();
    fx.table.insert(&mut entity).unwrap();

    assert_eq!(
        fx.adapter.last_statement().unwrap().unwrap(),
        "/*test::insert*/\nINSERT INTO test (tags, active, note) VALUES ('{\"a\",\"b\"}', 't', NULL) RETURNING id"
    );
    assert_eq!(entity.get("active").unwrap(), Value::Boolean(true));
}

#[test]
fn test_failing_hook_aborts_insert() {
    let fx = fixture(test_table());
    fx.table
        .add_listener("pre_save", |_: TableEvent, _: &mut Entity| {
            Err(DbError::InvalidArgument("rejected".to_string()))
        })
        .unwrap();

    let mut entity = Entity::plain(value_map! { "code" => "a" }, true).unwrap();
    assert!(fx.table.insert(&mut entity).is_err());
    assert!(fx.statements().is_empty());
    assert!(entity.is_new());
}

#[test]
fn test_update_without_changes_is_a_no_op() {
    let fx = fixture(test_table());
    let mut entity = Entity::plain(value_map! { "id" => 556, "code" => "Code" }, false).unwrap();
    entity.set("code", "Code").unwrap();

    assert!(!fx.table.update(&mut entity).unwrap());
    assert!(fx.statements().is_empty());
    assert!(fx.events().is_empty());
}

#[test]
fn test_update_matches_original_primary_key() {
    let fx = fixture(test_table());
    let mut entity = Entity::plain(value_map! { "id" => 556, "code" => "Code" }, false).unwrap();
    entity.set("id", 557).unwrap();
    entity.set("code", "New Code").unwrap();

    assert!(fx.table.update(&mut entity).unwrap());
    assert_eq!(
        fx.statements(),
        vec!["/*test::update*/\nUPDATE test SET id='557', code='New Code'\nWHERE id='556'".to_string()]
    );
    assert_eq!(fx.events(), vec!["pre_update", "pre_save", "post_update", "post_save"]);
    assert!(entity.values_updated().unwrap().is_empty());
    assert_eq!(fx.table.extract_pk_values(&entity, true).unwrap(), Value::Integer(557));
}

#[test]
fn test_update_matches_original_datetime_primary_key() {
    let fx = fixture(test_table().cast("id", &["datetime"]));
    let mut entity = fx
        .table
        .make_model(value_map! { "id" => "2017-01-31 13:32:00", "code" => "a" })
        .unwrap();
    let original = DateTime::from_ymd_hms(2017, 1, 31, 13, 32, 0).unwrap();

    entity.set("id", DateTime::from_ymd_hms(2018, 1, 1, 0, 0, 0).unwrap()).unwrap();
    assert_eq!(entity.value_orig("id").unwrap(), Value::DateTime(original));

    assert!(fx.table.update(&mut entity).unwrap());
    assert_eq!(
        fx.statements(),
        vec!["/*test::update*/\nUPDATE test SET id='2018-01-01 00:00:00'\nWHERE id='2017-01-31 13:32:00'".to_string()]
    );
    assert!(entity.values_updated().unwrap().is_empty());
}

#[test]
fn test_update_only_writes_allowed_fields() {
    let fx = fixture(test_table().available_fields(&["code"]));
    let mut entity = Entity::plain(value_map! { "id" => 1, "code" => "a", "cache" => "x" }, false).unwrap();
    entity.set("code", "b").unwrap();
    entity.set("cache", "y").unwrap();

    fx.table.update(&mut entity).unwrap();
    assert_eq!(
        fx.adapter.last_statement().unwrap().unwrap(),
        "/*test::update*/\nUPDATE test SET code='b'\nWHERE id='1'"
    );
    assert_eq!(entity.values_updated().unwrap(), value_map! { "cache" => "y" });
}

#[test]
fn test_update_with_composite_key() {
    let fx = fixture(test_table().primary_key(&["org_id", "id"]));
    let mut entity = Entity::plain(value_map! { "org_id" => 1, "id" => 2, "name" => "a" }, false).unwrap();
    entity.set("name", "b").unwrap();

    fx.table.update(&mut entity).unwrap();
    assert_eq!(
        fx.adapter.last_statement().unwrap().unwrap(),
        "/*test::update*/\nUPDATE test SET name='b'\nWHERE org_id='1' AND id='2'"
    );
}

#[test]
fn test_delete_fires_post_delete_only() {
    let fx = fixture(test_table());
    let mut entity = Entity::plain(value_map! { "id" => 556, "code" => "x" }, false).unwrap();

    assert_eq!(fx.table.delete(&mut entity).unwrap(), 1);
    assert_eq!(fx.statements(), vec!["/*test::delete*/\nDELETE FROM test\nWHERE id='556'".to_string()]);
    assert_eq!(fx.events(), vec!["post_delete"]);
}

#[test]
fn test_delete_by_pk() {
    let fx = fixture(test_table());
    fx.table.delete_by_pk(&Value::from(12)).unwrap();
    assert_eq!(fx.statements(), vec!["/*test::delete*/\nDELETE FROM test\nWHERE id='12'".to_string()]);
    assert!(fx.events().is_empty());

    assert!(matches!(
        fx.table.delete_by_pk(&Value::from("")),
        Err(DbError::InvalidArgument(_))
    ));
}

#[test]
fn test_soft_delete_goes_through_update() {
    let fx = fixture(test_table().cast("deleted_at", &["datetime"]));
    let mut entity = Entity::plain(value_map! { "id" => 5, "deleted_at" => DateTime::Null }, false).unwrap();

    assert!(fx.table.soft_delete(&mut entity).unwrap());
    let statement = fx.adapter.last_statement().unwrap().unwrap();
    assert!(statement.starts_with("/*test::update*/\nUPDATE test SET deleted_at='"));
    assert!(statement.ends_with("'\nWHERE id='5'"));
    assert_eq!(fx.events(), vec!["pre_update", "pre_save", "post_update", "post_save"]);
    assert!(entity.get("deleted_at").unwrap().is_truthy());
}

#[test]
fn test_soft_delete_requires_the_field() {
    let fx = fixture(test_table());
    let mut entity = Entity::plain(value_map! { "id" => 5 }, false).unwrap();
    assert!(matches!(
        fx.table.soft_delete(&mut entity),
        Err(DbError::FieldNotFound { .. })
    ));
    assert!(fx.statements().is_empty());
}

#[test]
fn test_soft_delete_on_violation_always_fires_post_delete() {
    let fx = fixture(test_table());
    let mut entity = Entity::plain(value_map! { "id" => 9 }, false).unwrap();

    fx.table.soft_delete_on_violation(&mut entity).unwrap();
    let statement = fx.adapter.last_statement().unwrap().unwrap();
    assert!(statement.contains("DELETE FROM test WHERE id='9';"));
    assert!(statement.contains("EXCEPTION WHEN foreign_key_violation THEN"));
    assert!(statement.contains("UPDATE test SET deleted_at=now() WHERE id='9';"));
    assert_eq!(fx.events(), vec!["post_delete"]);
}

#[test]
fn test_adapter_failure_propagates() {
    let fx = fixture(test_table());
    fx.adapter.push_failure("connection lost").unwrap();

    let mut entity = Entity::plain(value_map! { "id" => 1, "code" => "a" }, false).unwrap();
    entity.set("code", "b").unwrap();
    assert!(matches!(fx.table.update(&mut entity), Err(DbError::ExecutionError(_))));
    assert_eq!(fx.events(), vec!["pre_update", "pre_save"]);
    assert_eq!(entity.values_updated().unwrap(), value_map! { "code" => "b" });
}
