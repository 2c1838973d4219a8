//! SurrealDB implementation of [`ResourceStore`].
//!
//! Governance records are keyed by the (catalog, resource type, resource)
//! triple through a unique index rather than the record id, because
//! resource ids are owned by the type handlers' backing systems.
//!
//! The binding mutation operations are read-modify-write: the read and
//! the write are separate statements. Concurrent writers can interleave,
//! which is the documented check-then-act gap of the audit-notification
//! workflow — the last write wins.

use custos_core::error::CustosResult;
use custos_core::models::resource::{
    AuditNotificationBinding, PendingUpdateParams, ResourceRecord,
};
use custos_core::store::ResourceStore;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ResourceRow {
    catalog_id: String,
    resource_type_id: String,
    resource_id: String,
    owner_group_id: Option<String>,
    approver_group_id: Option<String>,
    parent_resource_type_id: Option<String>,
    pending_update: Option<serde_json::Value>,
    audit_notifications: Vec<serde_json::Value>,
}

fn parse_group(id: Option<String>, which: &str) -> Result<Option<Uuid>, DbError> {
    id.map(|id| {
        Uuid::parse_str(&id).map_err(|e| DbError::Decode(format!("invalid {which} UUID: {e}")))
    })
    .transpose()
}

impl ResourceRow {
    fn try_into_record(self) -> Result<ResourceRecord, DbError> {
        let pending_update = self
            .pending_update
            .map(|value| {
                serde_json::from_value::<PendingUpdateParams>(value)
                    .map_err(|e| DbError::Decode(format!("pending update: {e}")))
            })
            .transpose()?;

        let audit_notifications = self
            .audit_notifications
            .into_iter()
            .map(|value| {
                serde_json::from_value::<AuditNotificationBinding>(value)
                    .map_err(|e| DbError::Decode(format!("audit notification: {e}")))
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(ResourceRecord {
            catalog_id: self.catalog_id,
            resource_type_id: self.resource_type_id,
            resource_id: self.resource_id,
            owner_group_id: parse_group(self.owner_group_id, "owner group")?,
            approver_group_id: parse_group(self.approver_group_id, "approver group")?,
            parent_resource_type_id: self.parent_resource_type_id,
            pending_update,
            audit_notifications,
        })
    }
}

fn record_key(catalog_id: &str, resource_type_id: &str, resource_id: &str) -> String {
    format!("{catalog_id}/{resource_type_id}/{resource_id}")
}

fn encode_pending(
    pending: &Option<PendingUpdateParams>,
) -> Result<Option<serde_json::Value>, DbError> {
    pending
        .as_ref()
        .map(|p| {
            serde_json::to_value(p).map_err(|e| DbError::Decode(format!("pending update: {e}")))
        })
        .transpose()
}

fn encode_bindings(
    bindings: &[AuditNotificationBinding],
) -> Result<Vec<serde_json::Value>, DbError> {
    bindings
        .iter()
        .map(|b| {
            serde_json::to_value(b)
                .map_err(|e| DbError::Decode(format!("audit notification: {e}")))
        })
        .collect()
}

/// SurrealDB implementation of the Resource store.
#[derive(Clone)]
pub struct SurrealResourceStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealResourceStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn require_record(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
    ) -> CustosResult<ResourceRecord> {
        self.get_record(catalog_id, resource_type_id, resource_id)
            .await?
            .ok_or_else(|| {
                DbError::NotFound {
                    entity: "resource".into(),
                    id: record_key(catalog_id, resource_type_id, resource_id),
                }
                .into()
            })
    }
}

impl<C: Connection> ResourceStore for SurrealResourceStore<C> {
    async fn save_record(&self, record: ResourceRecord) -> CustosResult<ResourceRecord> {
        let pending = encode_pending(&record.pending_update)?;
        let bindings = encode_bindings(&record.audit_notifications)?;

        // Update the existing record if there is one, otherwise create it.
        let result = self
            .db
            .query(
                "UPDATE resource SET \
                 owner_group_id = $owner_group_id, \
                 approver_group_id = $approver_group_id, \
                 parent_resource_type_id = $parent_resource_type_id, \
                 pending_update = $pending_update, \
                 audit_notifications = $audit_notifications, \
                 updated_at = time::now() \
                 WHERE catalog_id = $catalog_id \
                 AND resource_type_id = $resource_type_id \
                 AND resource_id = $resource_id",
            )
            .bind(("catalog_id", record.catalog_id.clone()))
            .bind(("resource_type_id", record.resource_type_id.clone()))
            .bind(("resource_id", record.resource_id.clone()))
            .bind((
                "owner_group_id",
                record.owner_group_id.map(|g| g.to_string()),
            ))
            .bind((
                "approver_group_id",
                record.approver_group_id.map(|g| g.to_string()),
            ))
            .bind((
                "parent_resource_type_id",
                record.parent_resource_type_id.clone(),
            ))
            .bind(("pending_update", pending.clone()))
            .bind(("audit_notifications", bindings.clone()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;
        let rows: Vec<ResourceRow> = result.take(0).map_err(DbError::from)?;
        if let Some(row) = rows.into_iter().next() {
            return Ok(row.try_into_record()?);
        }

        let result = self
            .db
            .query(
                "CREATE resource SET \
                 catalog_id = $catalog_id, \
                 resource_type_id = $resource_type_id, \
                 resource_id = $resource_id, \
                 owner_group_id = $owner_group_id, \
                 approver_group_id = $approver_group_id, \
                 parent_resource_type_id = $parent_resource_type_id, \
                 pending_update = $pending_update, \
                 audit_notifications = $audit_notifications",
            )
            .bind(("catalog_id", record.catalog_id.clone()))
            .bind(("resource_type_id", record.resource_type_id.clone()))
            .bind(("resource_id", record.resource_id.clone()))
            .bind((
                "owner_group_id",
                record.owner_group_id.map(|g| g.to_string()),
            ))
            .bind((
                "approver_group_id",
                record.approver_group_id.map(|g| g.to_string()),
            ))
            .bind(("parent_resource_type_id", record.parent_resource_type_id))
            .bind(("pending_update", pending))
            .bind(("audit_notifications", bindings))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;
        let rows: Vec<ResourceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "resource".into(),
            id: record_key(&record.catalog_id, &record.resource_type_id, &record.resource_id),
        })?;

        Ok(row.try_into_record()?)
    }

    async fn get_record(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
    ) -> CustosResult<Option<ResourceRecord>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM resource \
                 WHERE catalog_id = $catalog_id \
                 AND resource_type_id = $resource_type_id \
                 AND resource_id = $resource_id",
            )
            .bind(("catalog_id", catalog_id.to_string()))
            .bind(("resource_type_id", resource_type_id.to_string()))
            .bind(("resource_id", resource_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResourceRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.try_into_record()?)),
            None => Ok(None),
        }
    }

    async fn delete_record(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
    ) -> CustosResult<()> {
        self.db
            .query(
                "DELETE resource \
                 WHERE catalog_id = $catalog_id \
                 AND resource_type_id = $resource_type_id \
                 AND resource_id = $resource_id",
            )
            .bind(("catalog_id", catalog_id.to_string()))
            .bind(("resource_type_id", resource_type_id.to_string()))
            .bind(("resource_id", resource_id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list_records(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
    ) -> CustosResult<Vec<ResourceRecord>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM resource \
                 WHERE catalog_id = $catalog_id \
                 AND resource_type_id = $resource_type_id \
                 ORDER BY resource_id ASC",
            )
            .bind(("catalog_id", catalog_id.to_string()))
            .bind(("resource_type_id", resource_type_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResourceRow> = result.take(0).map_err(DbError::from)?;

        let records = rows
            .into_iter()
            .map(|row| row.try_into_record())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(records)
    }

    async fn set_pending_update(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
        pending: Option<PendingUpdateParams>,
    ) -> CustosResult<ResourceRecord> {
        let mut record = self
            .require_record(catalog_id, resource_type_id, resource_id)
            .await?;
        record.pending_update = pending;
        self.save_record(record).await
    }

    async fn add_audit_notification(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
        binding: AuditNotificationBinding,
    ) -> CustosResult<ResourceRecord> {
        let mut record = self
            .require_record(catalog_id, resource_type_id, resource_id)
            .await?;
        // The list currently holds at most one binding; a second write
        // replaces the first.
        record.audit_notifications = vec![binding];
        self.save_record(record).await
    }

    async fn update_audit_notification(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
        binding: AuditNotificationBinding,
    ) -> CustosResult<ResourceRecord> {
        let mut record = self
            .require_record(catalog_id, resource_type_id, resource_id)
            .await?;

        let slot = record
            .audit_notifications
            .iter_mut()
            .find(|existing| existing.id == binding.id)
            .ok_or_else(|| DbError::NotFound {
                entity: "audit notification".into(),
                id: binding.id.to_string(),
            })?;
        *slot = binding;

        self.save_record(record).await
    }

    async fn delete_audit_notification(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
        binding_id: Uuid,
    ) -> CustosResult<ResourceRecord> {
        let mut record = self
            .require_record(catalog_id, resource_type_id, resource_id)
            .await?;

        let before = record.audit_notifications.len();
        record
            .audit_notifications
            .retain(|binding| binding.id != binding_id);
        if record.audit_notifications.len() == before {
            return Err(DbError::NotFound {
                entity: "audit notification".into(),
                id: binding_id.to_string(),
            }
            .into());
        }

        self.save_record(record).await
    }
}
