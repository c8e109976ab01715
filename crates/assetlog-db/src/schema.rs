//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! Identifiers are integer record keys allocated from the `counter`
//! table. Timestamps are stored as integer epoch milliseconds and enums as
//! strings with ASSERT constraints for validation.

use serde::Deserialize;
use surrealdb::{Connection, Surreal};
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, Deserialize)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Identifier sequences
-- =======================================================================
DEFINE TABLE counter SCHEMAFULL;
DEFINE FIELD last_id ON TABLE counter TYPE int;
CREATE counter:device SET last_id = 0;
CREATE counter:employee SET last_id = 0;
CREATE counter:assignment SET last_id = 0;
CREATE counter:audit_event SET last_id = 0;

-- =======================================================================
-- Devices
-- =======================================================================
DEFINE TABLE device SCHEMAFULL;
DEFINE FIELD serial_number ON TABLE device TYPE string;
DEFINE FIELD device_type ON TABLE device TYPE string \
    ASSERT $value IN ['laptop', 'monitor', 'keyboard', 'mouse', 'stand', \
        'backpack', 'mobile', 'charger', 'chip', 'keyboard_mouse_kit', \
        'headphones'];
DEFINE FIELD brand ON TABLE device TYPE string;
DEFINE FIELD model ON TABLE device TYPE string;
DEFINE FIELD hostname ON TABLE device TYPE option<string>;
DEFINE FIELD inventory_code ON TABLE device TYPE option<string>;
DEFINE FIELD location ON TABLE device TYPE option<string>;
DEFINE FIELD status ON TABLE device TYPE string \
    ASSERT $value IN ['available', 'assigned', 'maintenance', 'retired', \
        'sold'];
DEFINE FIELD purchase_date ON TABLE device TYPE option<string>;
DEFINE FIELD registered_at ON TABLE device TYPE int;
DEFINE FIELD version ON TABLE device TYPE int;
DEFINE INDEX idx_device_serial ON TABLE device \
    COLUMNS serial_number UNIQUE;

-- =======================================================================
-- Employees
-- =======================================================================
DEFINE TABLE employee SCHEMAFULL;
DEFINE FIELD full_name ON TABLE employee TYPE string;
DEFINE FIELD email ON TABLE employee TYPE string;
DEFINE FIELD department ON TABLE employee TYPE option<string>;
DEFINE FIELD position ON TABLE employee TYPE option<string>;
DEFINE FIELD company ON TABLE employee TYPE option<string>;
DEFINE FIELD location ON TABLE employee TYPE option<string>;
DEFINE FIELD is_active ON TABLE employee TYPE bool;
DEFINE FIELD version ON TABLE employee TYPE int;
DEFINE INDEX idx_employee_email ON TABLE employee COLUMNS email UNIQUE;

-- =======================================================================
-- Assignments (employee <-> device links)
-- =======================================================================
DEFINE TABLE assignment SCHEMAFULL;
DEFINE FIELD device_id ON TABLE assignment TYPE int;
DEFINE FIELD employee_id ON TABLE assignment TYPE int;
DEFINE FIELD assigned_at ON TABLE assignment TYPE int;
DEFINE FIELD returned_at ON TABLE assignment TYPE option<int>;
DEFINE FIELD notes ON TABLE assignment TYPE option<string>;
DEFINE FIELD return_observations ON TABLE assignment TYPE option<string>;
DEFINE FIELD version ON TABLE assignment TYPE int;
DEFINE INDEX idx_assignment_device ON TABLE assignment COLUMNS device_id;
DEFINE INDEX idx_assignment_employee ON TABLE assignment \
    COLUMNS employee_id;

-- =======================================================================
-- Audit events (append-only; only the revert marker is ever updated)
-- =======================================================================
DEFINE TABLE audit_event SCHEMAFULL;
DEFINE FIELD seq ON TABLE audit_event TYPE int;
DEFINE FIELD timestamp ON TABLE audit_event TYPE int;
DEFINE FIELD actor ON TABLE audit_event TYPE option<string>;
DEFINE FIELD action ON TABLE audit_event TYPE string \
    ASSERT $value IN ['CREATE', 'UPDATE', 'DELETE', 'ASSIGN', 'RETURN', \
        'REVERT'];
DEFINE FIELD entity_type ON TABLE audit_event TYPE string \
    ASSERT $value IN ['device', 'employee', 'assignment'];
DEFINE FIELD entity_id ON TABLE audit_event TYPE int;
DEFINE FIELD snapshot_before ON TABLE audit_event TYPE option<string>;
DEFINE FIELD snapshot_after ON TABLE audit_event TYPE option<string>;
DEFINE FIELD details ON TABLE audit_event TYPE option<string>;
DEFINE FIELD reverted_at ON TABLE audit_event TYPE option<int>;
DEFINE FIELD reverted_by ON TABLE audit_event TYPE option<string>;
DEFINE FIELD reverts_event_id ON TABLE audit_event TYPE option<int>;
DEFINE INDEX idx_audit_event_seq ON TABLE audit_event COLUMNS seq UNIQUE;
DEFINE INDEX idx_audit_event_entity ON TABLE audit_event \
    COLUMNS entity_type, entity_id;
DEFINE INDEX idx_audit_event_time ON TABLE audit_event COLUMNS timestamp;
";

// -----------------------------------------------------------------------
// Migration runner
// -----------------------------------------------------------------------

/// Run all pending schema migrations.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    // Ensure migration tracking table exists (idempotent).
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    // Determine current schema version.
    let mut result = db
        .query("SELECT version, name FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            // Record the applied migration.
            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}
