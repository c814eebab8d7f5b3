//! Tests for model definitions and their JSON form.

use super::*;
use std::io::Write;

const CUSTOMER_JSON: &str = r#"{
    "name": "Customer",
    "settings": { "db2": { "table": "CUSTOMER", "schema": "STORE" } },
    "properties": [
        { "name": "id", "type": "Number", "id": true, "generated": true },
        { "name": "email", "type": "String", "required": true, "length": 200,
          "index": { "unique": true } },
        { "name": "status", "type": "enum", "values": ["active", "closed"] },
        { "name": "notes", "type": "String", "db2": { "columnName": "NOTE_TEXT", "dataType": "CLOB" } },
        { "name": "balance", "type": "Number", "precision": 10, "scale": 2, "dataType": "DECIMAL" }
    ],
    "indexes": {
        "customer_name_idx": { "columns": "lastName, firstName DESC" },
        "legacy_idx": { "keys": { "email": 1, "status": -1 }, "options": { "unique": true } }
    }
}"#;

#[test]
fn test_parse_model_definition() {
    let model = ModelDefinition::from_json(CUSTOMER_JSON).expect("valid model");

    assert_eq!(model.name, "Customer");
    assert_eq!(model.table_name(), "CUSTOMER");
    assert_eq!(model.settings.db2.schema.as_deref(), Some("STORE"));
    assert_eq!(model.properties.len(), 5);

    let id = model.id_property().expect("id property");
    assert_eq!(id.name, "id");
    assert!(id.generated);
    assert!(!id.is_nullable());

    let status = model.property("status").expect("status");
    assert_eq!(
        status.property_type,
        PropertyType::Enum(vec!["active".to_string(), "closed".to_string()])
    );

    let notes = model.property("notes").expect("notes");
    assert_eq!(notes.column_name(), "NOTE_TEXT");
    assert_eq!(notes.declared_data_type(), Some("CLOB"));
    assert!(model.property_by_column("NOTE_TEXT").is_some());
}

#[test]
fn test_index_forms() {
    let model = ModelDefinition::from_json(CUSTOMER_JSON).expect("valid model");

    let by_columns = &model.indexes["customer_name_idx"];
    assert_eq!(
        by_columns.columns,
        vec![IndexColumn::asc("lastName"), IndexColumn::desc("firstName")]
    );
    assert!(!by_columns.unique);

    let by_keys = &model.indexes["legacy_idx"];
    assert!(by_keys.unique);
    assert_eq!(
        by_keys.columns,
        vec![IndexColumn::asc("email"), IndexColumn::desc("status")]
    );

    let email = model.property("email").expect("email");
    assert!(email.has_index());
    assert!(email.index.as_ref().is_some_and(PropertyIndex::is_unique));
}

#[test]
fn test_index_without_columns_is_rejected() {
    let json = r#"{"name": "M", "properties": [], "indexes": {"bad": {"unique": true}}}"#;
    assert!(ModelDefinition::from_json(json).is_err());
}

#[test]
fn test_nullability_rules() {
    let plain = PropertyDefinition::new("a", PropertyType::String);
    assert!(plain.is_nullable());

    let required = PropertyDefinition::new("b", PropertyType::String).with_required(true);
    assert!(!required.is_nullable());

    let explicit = PropertyDefinition::new("c", PropertyType::String).with_nullable(false);
    assert!(!explicit.is_nullable());

    let required_wins = PropertyDefinition::new("d", PropertyType::String)
        .with_required(true)
        .with_nullable(true);
    assert!(!required_wins.is_nullable());

    let id = PropertyDefinition::new("id", PropertyType::Number)
        .as_id()
        .with_nullable(true);
    assert!(!id.is_nullable());
}

#[test]
fn test_unknown_type_is_preserved() {
    let json = r#"{"name": "M", "properties": [{"name": "x", "type": "Money"}]}"#;
    let model = ModelDefinition::from_json(json).expect("valid model");
    assert_eq!(
        model.properties[0].property_type,
        PropertyType::Unknown("Money".to_string())
    );
}

#[test]
fn test_duplicate_property_rejected() {
    let model = ModelDefinition::new(
        "Dup",
        vec![
            PropertyDefinition::new("a", PropertyType::String),
            PropertyDefinition::new("a", PropertyType::Number),
        ],
    );
    assert!(model.validate().is_err());
}

#[test]
fn test_composite_id_order() {
    let mut second = PropertyDefinition::new("b", PropertyType::Number);
    second.id = Some(2);
    let mut first = PropertyDefinition::new("a", PropertyType::Number);
    first.id = Some(1);
    let model = ModelDefinition::new("Pair", vec![second, first]);

    let names: Vec<_> = model.id_properties().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn test_from_json_file_accepts_array_and_single() {
    let mut single = tempfile::NamedTempFile::new().expect("temp file");
    write!(single, "{CUSTOMER_JSON}").expect("write");
    let models = ModelDefinition::from_json_file(single.path()).expect("single model");
    assert_eq!(models.len(), 1);

    let mut many = tempfile::NamedTempFile::new().expect("temp file");
    write!(many, "[{CUSTOMER_JSON}, {{\"name\": \"Order\", \"properties\": []}}]").expect("write");
    let models = ModelDefinition::from_json_file(many.path()).expect("model array");
    assert_eq!(models.len(), 2);
    assert_eq!(models[1].table_name(), "Order");
}

#[test]
fn test_from_json_file_missing() {
    let result = ModelDefinition::from_json_file(std::path::Path::new("/nonexistent/models.json"));
    assert!(matches!(result, Err(IbmDbError::Io { .. })));
}
