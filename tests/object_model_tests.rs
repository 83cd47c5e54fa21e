/// Object model tests
///
/// Type registration from model documents and the tables derived from them.
/// Run with: cargo test --test object_model_tests

use gameobj::{
    ConnectionConfig, FieldDef, FieldType, ObjectError, ObjectModel, SchemaRegistry,
};

const FIXTURE: &str = include_str!("fixtures/game_model.json");

#[test]
fn test_fixture_registers_every_type() {
    let registry = SchemaRegistry::from_model_json(FIXTURE).unwrap();

    assert_eq!(registry.type_names(), vec!["Character", "Guild", "Item"]);

    let character = registry.lookup("Character").unwrap();
    assert_eq!(character.key_field().name, "Name");
    assert_eq!(character.field("Speed").unwrap().field_type, FieldType::Float);
    assert_eq!(character.field("Online").unwrap().field_type, FieldType::Boolean);

    let guild = registry.lookup("Guild").unwrap();
    assert_eq!(guild.key_field(), &FieldDef::key("Id", FieldType::Integer));
    assert_eq!(guild.table_name(), "obj_guild");
}

#[test]
fn test_fixture_tables_are_usable() {
    let registry = SchemaRegistry::from_model_json(FIXTURE).unwrap();
    let config = ConnectionConfig::new("game", "").database("memory:model_fixture");
    let store = gameobj::open(registry, config).unwrap();

    let mut guild = store.create("Guild", 1).unwrap();
    guild.set("Motto", "Fortune favours").unwrap().set("Emblem", vec![7u8; 16]).unwrap();
    guild.commit(&store).unwrap();

    let mut item = store.create("Item", "SN-001").unwrap();
    item.set("Owner", "hero1").unwrap().set("Weight", 2).unwrap();
    item.commit(&store).unwrap();

    let loaded = store.fetch_by_key("Item", "SN-001").unwrap();
    assert_eq!(loaded.get_f64("Weight").unwrap(), 2.0);
    assert_eq!(store.fetch_by_key("Guild", 1).unwrap().get_blob("Emblem").unwrap().len(), 16);
}

#[test]
fn test_key_rules() {
    let no_key = r#"{"Zone": {"Id": "Integer", "Name": "String"}}"#;
    let two_keys = r#"{"Zone": {"Id": "Integer KEY", "Name": "String KEY"}}"#;

    for model in [no_key, two_keys] {
        assert!(
            matches!(SchemaRegistry::from_model_json(model), Err(ObjectError::InvalidSchema(_))),
            "{} should be rejected",
            model
        );
    }

    let float_key = SchemaRegistry::from_model_json(r#"{"Waypoint": {"X": "Float KEY"}}"#).unwrap();
    assert_eq!(float_key.lookup("Waypoint").unwrap().key_field().field_type, FieldType::Float);
}

#[test]
fn test_names_must_be_identifiers() {
    let bad_type = r#"{"Zone Map": {"Id": "Integer KEY"}}"#;
    let bad_field = r#"{"Zone": {"Id;--": "Integer KEY"}}"#;

    assert!(matches!(SchemaRegistry::from_model_json(bad_type), Err(ObjectError::InvalidSchema(_))));
    assert!(matches!(SchemaRegistry::from_model_json(bad_field), Err(ObjectError::InvalidSchema(_))));
}

#[test]
fn test_registration_merges_models() {
    let mut registry = SchemaRegistry::new();
    registry
        .register_model(&ObjectModel::parse(r#"{"Zone": {"Id": "Integer KEY"}}"#).unwrap())
        .unwrap();

    let err = registry
        .register_model(&ObjectModel::parse(r#"{"Zone": {"Id": "String KEY"}}"#).unwrap())
        .unwrap_err();
    assert!(matches!(err, ObjectError::DuplicateType(name) if name == "Zone"));

    registry
        .register("Quest", vec![FieldDef::key("Code", FieldType::String)])
        .unwrap();
    assert_eq!(registry.len(), 2);
}
