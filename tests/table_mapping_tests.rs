use std::sync::Arc;

use pretty_assertions::assert_eq;
use rustmemorm::mapper::{MapperRegistry, MultiColumnMapper};
use rustmemorm::prelude::*;
use rustmemorm::{RecordingAdapter, RowCache};

/// Virtual `combo` field stored as `code` and `name`.
#[derive(Default)]
struct ComboMapper;

impl MultiColumnMapper for ComboMapper {
    fn name(&self) -> &'static str {
        "combo"
    }

    fn columns(&self) -> &[&str] {
        &["code", "name"]
    }

    fn to_db(&self, value: &Value) -> Result<ValueMap> {
        let parts = value
            .as_map()
            .ok_or_else(|| DbError::TypeMismatch(format!("combo expects a map, got {}", value.type_name())))?;
        Ok(parts.only(&["code", "name"]))
    }

    fn from_db(&self, row: &ValueMap) -> Result<(Vec<String>, Value)> {
        Ok((
            vec!["code".to_string(), "name".to_string()],
            Value::Map(row.only(&["code", "name"])),
        ))
    }
}

fn table_with(definition: TableDefinition) -> (Table, Arc<RecordingAdapter>) {
    let mut registry = MapperRegistry::with_default_mappers();
    registry.register_multi_as::<ComboMapper>("combo");

    let adapter = Arc::new(RecordingAdapter::new());
    let table = Table::new(definition, adapter.clone(), Arc::new(registry), Arc::new(RowCache::new()));
    (table, adapter)
}

fn combo_table() -> (Table, Arc<RecordingAdapter>) {
    table_with(TableDefinition::new("test").with_alias("t").cast("combo", &["combo"]))
}

#[test]
fn test_composite_round_trip() {
    let (table, _) = combo_table();
    let row = value_map! { "code" => "21", "name" => "text" };

    let fields = table.map_from_db(row.clone()).unwrap();
    assert_eq!(fields, value_map! { "combo" => Value::Map(row.clone()) });
    assert_eq!(table.map_to_db(&fields).unwrap(), row);
}

#[test]
fn test_model_holds_only_the_virtual_field() {
    let (table, _) = combo_table();
    let entity = table
        .make_model(value_map! { "id" => 1, "code" => "21", "name" => "text" })
        .unwrap();

    assert!(entity.has("combo"));
    assert!(!entity.has("code"));
    assert!(!entity.has("name"));
    assert_eq!(entity.fields().collect::<Vec<_>>(), vec!["id", "combo"]);
}

#[test]
fn test_composite_field_is_expanded_on_update() {
    let (table, adapter) = combo_table();
    let mut entity = table
        .make_model(value_map! { "id" => 3, "code" => "21", "name" => "text" })
        .unwrap();
    entity
        .set("combo", Value::Map(value_map! { "code" => "22", "name" => "other" }))
        .unwrap();

    table.update(&mut entity).unwrap();
    assert_eq!(
        adapter.last_statement().unwrap().unwrap(),
        "/*test::update*/\nUPDATE test SET code='22', name='other'\nWHERE id='3'"
    );
    assert!(entity.values_updated().unwrap().is_empty());
}

#[test]
fn test_returned_key_does_not_clobber_virtual_field() {
    let (table, adapter) = combo_table();
    adapter.push_records(vec![value_map! { "id" => 10 }]).unwrap();

    let combo = Value::Map(value_map! { "code" => "1", "name" => "n" });
    let mut entity = Entity::plain(value_map! { "combo" => combo.clone() }, true).unwrap();
    table.insert(&mut entity).unwrap();

    assert_eq!(
        adapter.last_statement().unwrap().unwrap(),
        "/*test::insert*/\nINSERT INTO test (code, name) VALUES ('1', 'n') RETURNING id"
    );
    assert_eq!(entity.get("combo").unwrap(), combo);
    assert_eq!(entity.get("id").unwrap(), Value::Integer(10));
}

#[test]
fn test_ordinary_columns_map_both_ways() {
    let (table, _) = table_with(
        TableDefinition::new("users")
            .cast("active", &["pg_bool"])
            .cast("age", &["null", "int"])
            .cast("born", &["datetime"])
            .cast("flags", &["json"]),
    );

    let fields = table
        .map_from_db(value_map! {
            "active" => "f",
            "age" => Value::Null,
            "born" => Value::Null,
            "flags" => "{\"a\":1}",
            "name" => "raw",
        })
        .unwrap();
    assert_eq!(
        fields,
        value_map! {
            "active" => false,
            "age" => Value::Null,
            "born" => DateTime::Null,
            "flags" => Value::Map(value_map! { "a" => 1 }),
            "name" => "raw",
        }
    );

    let row = table
        .map_to_db(&value_map! { "active" => true, "age" => 0, "flags" => Value::List(vec![]) })
        .unwrap();
    assert_eq!(row, value_map! { "active" => "t", "age" => Value::Null, "flags" => "[]" });
}

#[test]
fn test_unknown_mapper_surfaces_on_first_use() {
    let (table, _) = table_with(TableDefinition::new("x").cast("a", &["money"]));
    assert!(matches!(
        table.map_from_db(value_map! { "a" => 1 }),
        Err(DbError::UnknownMapper(name)) if name == "money"
    ));
}
