//! Integration tests for statement execution, pagination and bulk operations.

use std::sync::Arc;

use ibmdb_core::driver::scripted::{DriverEvent, ScriptedDriver, row};
use ibmdb_core::{
    ConnectionSettings, Db2Connector, Filter, IbmDbError, ModelData, ModelDefinition, ModelValue,
    OrderBy, ParameterizedSql, PropertyDefinition, PropertyType, Row, SqlValue, Where,
};

fn settings() -> ConnectionSettings {
    ConnectionSettings::new("db.example.com")
        .with_port(50000)
        .with_database("sample")
        .with_credentials("app", "secret")
        .with_schema("store")
}

fn connector(driver: &ScriptedDriver, settings: ConnectionSettings) -> Db2Connector {
    let mut connector = Db2Connector::new(settings, Arc::new(driver.clone())).unwrap();
    connector
        .define(ModelDefinition::new(
            "Item",
            vec![
                PropertyDefinition::new("id", PropertyType::Number).as_id(),
                PropertyDefinition::new("name", PropertyType::String),
            ],
        ))
        .unwrap();
    connector
}

fn five_items() -> Vec<Row> {
    (1..=5)
        .map(|n| row([("id", SqlValue::from(n.to_string())), ("name", SqlValue::from(format!("item-{n}")))]))
        .collect()
}

fn ids(items: &[ModelData]) -> Vec<ModelValue> {
    items.iter().filter_map(|item| item.get("id").cloned()).collect()
}

#[tokio::test]
async fn test_limit_offset_stripped_and_applied_to_rows() {
    let driver = ScriptedDriver::new();
    driver.respond("FROM STORE.\"Item\"", five_items());
    let connector = connector(&driver, settings());

    let filter = Filter::new()
        .with_order(OrderBy::asc("id"))
        .with_limit(2)
        .with_offset(1);
    let items = connector.find("Item", &filter, None).await.unwrap();

    assert_eq!(
        driver.statements(),
        vec!["SELECT \"id\",\"name\" FROM STORE.\"Item\" ORDER BY \"id\" ASC".to_string()]
    );
    assert_eq!(
        ids(&items),
        vec![ModelValue::Integer(2), ModelValue::Integer(3)]
    );
    assert_eq!(items[0].get("name"), Some(&ModelValue::from("item-2")));
}

#[tokio::test]
async fn test_offset_only_skips_rows_without_limit() {
    let driver = ScriptedDriver::new();
    driver.respond("FROM STORE.\"Item\"", five_items());
    let connector = connector(&driver, settings());

    let items = connector
        .find("Item", &Filter::new().with_offset(3), None)
        .await
        .unwrap();

    assert!(!driver.statements()[0].contains("OFFSET"));
    assert_eq!(
        ids(&items),
        vec![ModelValue::Integer(4), ModelValue::Integer(5)]
    );
}

#[tokio::test]
async fn test_limit_alone_uses_fetch_first() {
    let driver = ScriptedDriver::new();
    driver.respond("FROM STORE.\"Item\"", five_items());
    let connector = connector(&driver, settings());

    let items = connector
        .find("Item", &Filter::new().with_limit(2), None)
        .await
        .unwrap();

    assert_eq!(
        driver.statements(),
        vec!["SELECT \"id\",\"name\" FROM STORE.\"Item\" FETCH FIRST 2 ROWS ONLY".to_string()]
    );
    // The server applies FETCH FIRST; the client does not slice again
    assert_eq!(items.len(), 5);
}

#[tokio::test]
async fn test_first_page_with_zero_offset_uses_fetch_first() {
    let driver = ScriptedDriver::new();
    driver.respond("FROM STORE.\"Item\"", five_items());
    let connector = connector(&driver, settings());

    connector
        .find("Item", &Filter::new().with_limit(2).with_offset(0), None)
        .await
        .unwrap();
    connector
        .find("Item", &Filter::new().with_limit(0), None)
        .await
        .unwrap();

    assert_eq!(
        driver.statements(),
        vec![
            "SELECT \"id\",\"name\" FROM STORE.\"Item\" FETCH FIRST 2 ROWS ONLY".to_string(),
            "SELECT \"id\",\"name\" FROM STORE.\"Item\"".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_limit_offset_passed_through_when_enabled() {
    let driver = ScriptedDriver::new();
    driver.respond("FROM STORE.\"Item\"", five_items());
    let connector = connector(&driver, settings().with_use_limit_offset(true));

    let items = connector
        .find("Item", &Filter::new().with_limit(2).with_offset(1), None)
        .await
        .unwrap();

    assert!(driver.statements()[0].ends_with("LIMIT 2 OFFSET 1"));
    assert_eq!(items.len(), 5);
}

#[tokio::test]
async fn test_find_by_id_returns_first_match() {
    let driver = ScriptedDriver::new();
    driver.respond("WHERE \"id\"=(?)", vec![row([("id", "4"), ("name", "lamp")])]);
    let connector = connector(&driver, settings());

    let found = connector.find_by_id("Item", 4, None).await.unwrap().unwrap();
    assert_eq!(found.get("name"), Some(&ModelValue::from("lamp")));

    let events = driver.events();
    assert!(events.contains(&DriverEvent::Query {
        sql: "SELECT \"id\",\"name\" FROM STORE.\"Item\" WHERE \"id\"=(?) FETCH FIRST 1 ROWS ONLY"
            .to_string(),
        params: vec![SqlValue::Integer(4)],
    }));
}

#[tokio::test]
async fn test_execute_rejects_placeholder_count_mismatch() {
    let driver = ScriptedDriver::new();
    let connector = connector(&driver, settings());

    let error = connector
        .execute("SELECT * FROM STORE.\"Item\" WHERE \"id\"=?", None)
        .await
        .unwrap_err();

    assert!(matches!(error, IbmDbError::ParameterMismatch { .. }));
    assert!(driver.statements().is_empty());
    assert_eq!(driver.count_events(&DriverEvent::Close), 1);
}

#[tokio::test]
async fn test_execute_binds_parameters_as_placeholders() {
    let driver = ScriptedDriver::new();
    driver.respond("\"name\" LIKE", vec![row([("id", SqlValue::Integer(1))])]);
    let connector = connector(&driver, settings());

    let stmt = ParameterizedSql::with_params(
        "SELECT \"id\" FROM STORE.\"Item\" WHERE \"name\" LIKE ?",
        vec![SqlValue::from("la%")],
    );
    let rows = connector.execute(stmt, None).await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(
        driver.statements(),
        vec!["SELECT \"id\" FROM STORE.\"Item\" WHERE \"name\" LIKE (?)".to_string()]
    );
}

#[tokio::test]
async fn test_count_reads_cnt_column() {
    let driver = ScriptedDriver::new();
    driver.respond("COUNT(*) AS CNT", vec![row([("CNT", SqlValue::Integer(12))])]);
    let connector = connector(&driver, settings());

    let count = connector
        .count("Item", Some(&Where::eq("name", "lamp")), None)
        .await
        .unwrap();
    assert_eq!(count, 12);
}

#[tokio::test]
async fn test_update_all_reports_affected_rows() {
    let driver = ScriptedDriver::new();
    driver.respond("FROM FINAL TABLE (UPDATE", vec![row([("affectedRows", SqlValue::Integer(3))])]);
    let connector = connector(&driver, settings());

    let mut data = ModelData::new();
    data.insert("name".to_string(), ModelValue::from("renamed"));
    let updated = connector.update_all("Item", None, &data, None).await.unwrap();

    assert_eq!(updated, 3);
    assert_eq!(driver.count_statements("UPDATE STORE.\"Item\" SET \"name\"=(?)"), 1);
}

#[tokio::test]
async fn test_update_all_with_nothing_assignable_sends_nothing() {
    let driver = ScriptedDriver::new();
    let connector = connector(&driver, settings());

    let mut data = ModelData::new();
    data.insert("id".to_string(), ModelValue::Integer(1));
    let updated = connector.update_all("Item", None, &data, None).await.unwrap();

    assert_eq!(updated, 0);
    assert!(driver.events().is_empty());
}

#[tokio::test]
async fn test_destroy_all_reports_deleted_rows() {
    let driver = ScriptedDriver::new();
    driver.respond("FROM OLD TABLE (DELETE", vec![row([("affectedRows", SqlValue::Integer(2))])]);
    let connector = connector(&driver, settings());

    let deleted = connector
        .destroy_all("Item", Some(&Where::eq("name", "lamp")), None)
        .await
        .unwrap();
    assert_eq!(deleted, 2);
}
