//! Integration tests for schema initialization using in-memory SurrealDB.

use serde::Deserialize;
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[derive(Debug, Deserialize)]
struct MigrationRow {
    version: u32,
}

#[derive(Debug, Deserialize)]
struct CounterRow {
    last_id: i64,
}

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    assetlog_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: surrealdb::Value = result.take(0).unwrap();
    let info_str = info.to_string();

    for table in ["counter", "device", "employee", "assignment", "audit_event", "_migration"] {
        assert!(info_str.contains(table), "missing {table} table");
    }
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    // Run twice; the second run must be a no-op.
    assetlog_db::run_migrations(&db).await.unwrap();
    assetlog_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT version FROM _migration").await.unwrap();
    let records: Vec<MigrationRow> = result.take(0).unwrap();
    assert_eq!(records.len(), 1, "expected exactly one migration record");
    assert_eq!(records[0].version, 1);
}

#[tokio::test]
async fn counters_start_at_zero() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    assetlog_db::run_migrations(&db).await.unwrap();

    let mut result = db
        .query("SELECT last_id FROM counter:audit_event")
        .await
        .unwrap();
    let counters: Vec<CounterRow> = result.take(0).unwrap();
    assert_eq!(counters.len(), 1);
    assert_eq!(counters[0].last_id, 0);
}

#[tokio::test]
async fn unknown_action_is_rejected_by_the_schema() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    assetlog_db::run_migrations(&db).await.unwrap();

    let result = db
        .query(
            "CREATE audit_event SET seq = 1, timestamp = 0, action = 'RENAME', \
             entity_type = 'device', entity_id = 1",
        )
        .await
        .unwrap()
        .check();
    assert!(result.is_err(), "ASSERT on action should reject RENAME");
}
