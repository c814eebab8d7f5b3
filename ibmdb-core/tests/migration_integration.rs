//! Integration tests for table creation, drop and catalog-driven migration.

use std::sync::Arc;

use ibmdb_core::driver::scripted::{DriverEvent, ScriptedDriver, row};
use ibmdb_core::migration::{CatalogColumn, CatalogIndex, UniqueRule};
use ibmdb_core::models::PropertyIndex;
use ibmdb_core::{
    ConnectionSettings, Db2Connector, DdlKind, IbmDbError, IndexColumn, ModelDefinition,
    PropertyDefinition, PropertyType, Row, SqlValue,
};

fn connector(driver: &ScriptedDriver) -> Db2Connector {
    let settings = ConnectionSettings::new("db.example.com")
        .with_port(50000)
        .with_database("sample")
        .with_credentials("app", "secret")
        .with_schema("store");
    let mut connector = Db2Connector::new(settings, Arc::new(driver.clone())).unwrap();
    connector
        .define(
            ModelDefinition::new(
                "Customer",
                vec![
                    PropertyDefinition::new("id", PropertyType::Number)
                        .as_id()
                        .with_generated(true),
                    PropertyDefinition::new("name", PropertyType::String).with_required(true),
                    PropertyDefinition::new("email", PropertyType::String).with_index(
                        PropertyIndex::Options {
                            unique: true,
                            kind: None,
                        },
                    ),
                ],
            )
            .with_table("CUSTOMER"),
        )
        .unwrap();
    connector
}

fn column_row(name: &str, position: i64, nulls: &str) -> Row {
    row([
        ("NAME", SqlValue::from(name)),
        ("DATATYPE", SqlValue::from("VARCHAR")),
        ("COLNO", SqlValue::Integer(position)),
        ("DATALENGTH", SqlValue::from("512")),
        ("NULLS", SqlValue::from(nulls)),
    ])
}

fn index_row(name: &str, colnames: &str, rule: &str) -> Row {
    row([
        ("INDNAME", name),
        ("TABSCHEMA", "STORE"),
        ("COLNAMES", colnames),
        ("UNIQUERULE", rule),
    ])
}

fn script_catalog(driver: &ScriptedDriver, name_nulls: &str) {
    driver.respond(
        "SYSCAT.COLUMNS",
        vec![
            column_row("id", 0, "N"),
            column_row("name", 1, name_nulls),
            column_row("email", 2, "Y"),
        ],
    );
    driver.respond(
        "SYSCAT.INDEXES",
        vec![
            index_row("SQL2301", "+id", "P"),
            index_row("email", "+email", "U"),
        ],
    );
}

#[tokio::test]
async fn test_is_actual_for_matching_catalog() {
    let driver = ScriptedDriver::new();
    script_catalog(&driver, "N");
    let connector = connector(&driver);

    assert!(connector.is_actual(&[]).await.unwrap());
    assert_eq!(driver.count_statements("SYSCAT.COLUMNS"), 1);
    assert_eq!(driver.count_statements("SYSCAT.INDEXES"), 1);
    assert_eq!(driver.count_statements("ALTER"), 0);
}

#[tokio::test]
async fn test_is_actual_false_when_nullability_differs() {
    let driver = ScriptedDriver::new();
    script_catalog(&driver, "Y");
    let connector = connector(&driver);

    assert!(!connector.is_actual(&["Customer"]).await.unwrap());
    assert_eq!(driver.count_statements("ALTER"), 0);
}

#[tokio::test]
async fn test_autoupdate_creates_missing_table() {
    let driver = ScriptedDriver::new();
    let connector = connector(&driver);

    let plans = connector.autoupdate(&[]).await.unwrap();

    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].count(DdlKind::CreateTable), 1);
    assert_eq!(plans[0].count(DdlKind::CreateIndex), 1);
    let statements = driver.statements();
    assert_eq!(statements.len(), 3);
    assert!(statements[0].contains("SYSCAT.COLUMNS"));
    assert!(statements[1].starts_with("CREATE TABLE STORE.\"CUSTOMER\""));
    assert_eq!(
        statements[2],
        "CREATE UNIQUE INDEX \"email\" ON STORE.\"CUSTOMER\" (\"email\")"
    );
}

#[tokio::test]
async fn test_autoupdate_alters_existing_table_in_order() {
    let driver = ScriptedDriver::new();
    script_catalog(&driver, "Y");
    let connector = connector(&driver);

    let plans = connector.autoupdate(&["Customer"]).await.unwrap();

    let kinds: Vec<DdlKind> = plans[0].operations.iter().map(|op| op.kind).collect();
    assert_eq!(
        kinds,
        vec![
            DdlKind::DropIndex,
            DdlKind::AlterTable,
            DdlKind::Reorg,
            DdlKind::CreateIndex,
        ]
    );
    let executed: Vec<String> = driver
        .statements()
        .into_iter()
        .filter(|sql| !sql.contains("SYSCAT."))
        .collect();
    assert_eq!(executed, plans[0].statements());
    assert_eq!(executed[0], "DROP INDEX STORE.\"email\"");
    assert!(executed[1].contains("ALTER COLUMN \"name\" SET NOT NULL"));
    assert_eq!(
        executed[2],
        "CALL SYSPROC.ADMIN_CMD('REORG TABLE STORE.\"CUSTOMER\"')"
    );
}

#[tokio::test]
async fn test_autoupdate_stops_at_first_failed_statement() {
    let driver = ScriptedDriver::new();
    script_catalog(&driver, "Y");
    driver.fail("ALTER TABLE", "SQL0668N operation not allowed", Some("57016"));
    let connector = connector(&driver);

    let error = connector.autoupdate(&[]).await.unwrap_err();

    assert_eq!(error.sqlstate(), Some("57016"));
    assert_eq!(driver.count_statements("REORG"), 0);
    assert_eq!(driver.count_statements("CREATE UNIQUE INDEX"), 0);
    assert_eq!(driver.count_events(&DriverEvent::Close), 1);
}

#[tokio::test]
async fn test_alter_table_check_only_runs_nothing() {
    let driver = ScriptedDriver::new();
    let connector = connector(&driver);
    let fields = vec![CatalogColumn {
        name: "id".to_string(),
        data_type: "INTEGER".to_string(),
        position: 0,
        length: None,
        nullable: false,
    }];
    let indexes = vec![CatalogIndex {
        name: "SQL2301".to_string(),
        schema: Some("STORE".to_string()),
        columns: vec![IndexColumn::asc("id")],
        rule: UniqueRule::Primary,
    }];

    let plan = connector
        .alter_table("Customer", &fields, &indexes, true, None)
        .await
        .unwrap();

    assert_eq!(plan.column_changes.len(), 2);
    assert_eq!(plan.count(DdlKind::AlterTable), 1);
    assert_eq!(plan.count(DdlKind::Reorg), 0);
    assert!(driver.events().is_empty());
}

#[tokio::test]
async fn test_drop_table_ignores_undefined_table() {
    let driver = ScriptedDriver::new();
    driver.fail("DROP TABLE", "SQL0204N \"STORE.CUSTOMER\" is an undefined name", Some("42704"));
    let connector = connector(&driver);

    connector.drop_table("Customer", None).await.unwrap();
    assert_eq!(driver.count_statements("DROP TABLE STORE.\"CUSTOMER\""), 1);
}

#[tokio::test]
async fn test_drop_table_propagates_other_errors() {
    let driver = ScriptedDriver::new();
    driver.fail("DROP TABLE", "SQL0911N deadlock", Some("40001"));
    let connector = connector(&driver);

    let error = connector.drop_table("Customer", None).await.unwrap_err();
    assert!(matches!(error, IbmDbError::Driver { .. }));
}

#[tokio::test]
async fn test_automigrate_drops_then_recreates() {
    let driver = ScriptedDriver::new();
    driver.fail("DROP TABLE", "SQL0204N undefined name", Some("42704"));
    let connector = connector(&driver);

    connector.automigrate(&["Customer"]).await.unwrap();

    let statements = driver.statements();
    assert_eq!(statements.len(), 3);
    assert!(statements[0].starts_with("DROP TABLE"));
    assert!(statements[1].starts_with("CREATE TABLE"));
    assert!(statements[2].starts_with("CREATE UNIQUE INDEX"));
}

#[tokio::test]
async fn test_plan_migration_unknown_model_touches_nothing() {
    let driver = ScriptedDriver::new();
    let connector = connector(&driver);

    let error = connector.plan_migration(&["Ghost"]).await.unwrap_err();
    assert!(matches!(error, IbmDbError::Configuration { .. }));
    assert!(driver.events().is_empty());
}
