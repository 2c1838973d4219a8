//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation. Governance sub-documents
//! (notification bindings, pending updates) are FLEXIBLE objects.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
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

#[derive(Debug, SurrealValue)]
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
-- Users
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD name ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD roles ON TABLE user TYPE array DEFAULT [];
DEFINE FIELD roles.* ON TABLE user TYPE string;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;

-- =======================================================================
-- Groups
-- =======================================================================
DEFINE TABLE group SCHEMAFULL;
DEFINE FIELD name ON TABLE group TYPE string;
DEFINE FIELD description ON TABLE group TYPE string;
DEFINE FIELD member_added_notifications ON TABLE group TYPE array \
    DEFAULT [];
DEFINE FIELD member_added_notifications.* ON TABLE group \
    FLEXIBLE TYPE object;
DEFINE FIELD approval_request_notifications ON TABLE group TYPE array \
    DEFAULT [];
DEFINE FIELD approval_request_notifications.* ON TABLE group \
    FLEXIBLE TYPE object;
DEFINE FIELD created_at ON TABLE group TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE group TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_group_name ON TABLE group COLUMNS name UNIQUE;

-- =======================================================================
-- Catalogs (governance record only; configuration is injected)
-- =======================================================================
DEFINE TABLE catalog SCHEMAFULL;
DEFINE FIELD name ON TABLE catalog TYPE string;
DEFINE FIELD description ON TABLE catalog TYPE string;
DEFINE FIELD owner_group_id ON TABLE catalog TYPE option<string>;
DEFINE FIELD created_at ON TABLE catalog TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE catalog TYPE datetime \
    DEFAULT time::now();

-- =======================================================================
-- Resource governance records
-- =======================================================================
DEFINE TABLE resource SCHEMAFULL;
DEFINE FIELD catalog_id ON TABLE resource TYPE string;
DEFINE FIELD resource_type_id ON TABLE resource TYPE string;
DEFINE FIELD resource_id ON TABLE resource TYPE string;
DEFINE FIELD owner_group_id ON TABLE resource TYPE option<string>;
DEFINE FIELD approver_group_id ON TABLE resource TYPE option<string>;
DEFINE FIELD parent_resource_type_id ON TABLE resource \
    TYPE option<string>;
DEFINE FIELD pending_update ON TABLE resource \
    FLEXIBLE TYPE option<object>;
DEFINE FIELD audit_notifications ON TABLE resource TYPE array \
    DEFAULT [];
DEFINE FIELD audit_notifications.* ON TABLE resource \
    FLEXIBLE TYPE object;
DEFINE FIELD created_at ON TABLE resource TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE resource TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_resource_key ON TABLE resource \
    COLUMNS catalog_id, resource_type_id, resource_id UNIQUE;

-- =======================================================================
-- Approval flow governance records
-- =======================================================================
DEFINE TABLE approval_flow SCHEMAFULL;
DEFINE FIELD catalog_id ON TABLE approval_flow TYPE string;
DEFINE FIELD flow_id ON TABLE approval_flow TYPE string;
DEFINE FIELD approver_group_id ON TABLE approval_flow \
    TYPE option<string>;
DEFINE FIELD created_at ON TABLE approval_flow TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE approval_flow TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_approval_flow_key ON TABLE approval_flow \
    COLUMNS catalog_id, flow_id UNIQUE;

-- =======================================================================
-- Approval requests (append-and-update, never deleted)
-- =======================================================================
DEFINE TABLE approval_request SCHEMAFULL;
DEFINE FIELD status ON TABLE approval_request TYPE string \
    ASSERT $value IN ['Pending', 'ValidationFailed', 'Approved', \
    'Rejected', 'Revoked'];
DEFINE FIELD catalog_id ON TABLE approval_request TYPE string;
DEFINE FIELD approval_flow_id ON TABLE approval_request TYPE string;
DEFINE FIELD request_user_id ON TABLE approval_request TYPE string;
DEFINE FIELD request_comment ON TABLE approval_request TYPE string;
DEFINE FIELD input_params ON TABLE approval_request \
    FLEXIBLE TYPE object DEFAULT {};
DEFINE FIELD input_resources ON TABLE approval_request TYPE array \
    DEFAULT [];
DEFINE FIELD input_resources.* ON TABLE approval_request \
    FLEXIBLE TYPE object;
DEFINE FIELD approver_type ON TABLE approval_request TYPE string \
    ASSERT $value IN ['Group'];
DEFINE FIELD approver_group_id ON TABLE approval_request TYPE string;
DEFINE FIELD request_date ON TABLE approval_request TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD validated_date ON TABLE approval_request \
    TYPE option<datetime>;
DEFINE FIELD approved_date ON TABLE approval_request \
    TYPE option<datetime>;
DEFINE FIELD validation_result ON TABLE approval_request \
    FLEXIBLE TYPE option<object>;
DEFINE FIELD auto_revoke_duration ON TABLE approval_request \
    TYPE option<string>;
DEFINE INDEX idx_request_flow ON TABLE approval_request \
    COLUMNS catalog_id, approval_flow_id;
DEFINE INDEX idx_request_requester ON TABLE approval_request \
    COLUMNS request_user_id;
DEFINE INDEX idx_request_approver ON TABLE approval_request \
    COLUMNS approver_group_id;

-- =======================================================================
-- Graph Edge Tables (relations)
-- =======================================================================

-- User -> Group membership, with the member's role on the edge
DEFINE TABLE member_of TYPE RELATION SCHEMAFULL;
DEFINE FIELD role ON TABLE member_of TYPE string \
    ASSERT $value IN ['Owner', 'Member'];
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
/// All DEFINE statements are idempotent so re-running is safe.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    // Ensure migration tracking table exists (idempotent).
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    // Determine current schema version.
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
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

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
