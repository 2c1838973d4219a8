//! SurrealDB implementation of [`ApprovalFlowStore`].

use custos_core::error::CustosResult;
use custos_core::models::approval_flow::ApprovalFlowRecord;
use custos_core::store::ApprovalFlowStore;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ApprovalFlowRow {
    catalog_id: String,
    flow_id: String,
    approver_group_id: Option<String>,
}

impl ApprovalFlowRow {
    fn try_into_record(self) -> Result<ApprovalFlowRecord, DbError> {
        let approver_group_id = self
            .approver_group_id
            .map(|id| {
                Uuid::parse_str(&id)
                    .map_err(|e| DbError::Decode(format!("invalid approver group UUID: {e}")))
            })
            .transpose()?;

        Ok(ApprovalFlowRecord {
            catalog_id: self.catalog_id,
            flow_id: self.flow_id,
            approver_group_id,
        })
    }
}

/// SurrealDB implementation of the ApprovalFlow store.
#[derive(Clone)]
pub struct SurrealApprovalFlowStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealApprovalFlowStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ApprovalFlowStore for SurrealApprovalFlowStore<C> {
    async fn save(&self, record: ApprovalFlowRecord) -> CustosResult<ApprovalFlowRecord> {
        let approver = record.approver_group_id.map(|g| g.to_string());

        let result = self
            .db
            .query(
                "UPDATE approval_flow SET \
                 approver_group_id = $approver_group_id, \
                 updated_at = time::now() \
                 WHERE catalog_id = $catalog_id AND flow_id = $flow_id",
            )
            .bind(("catalog_id", record.catalog_id.clone()))
            .bind(("flow_id", record.flow_id.clone()))
            .bind(("approver_group_id", approver.clone()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;
        let rows: Vec<ApprovalFlowRow> = result.take(0).map_err(DbError::from)?;
        if let Some(row) = rows.into_iter().next() {
            return Ok(row.try_into_record()?);
        }

        let result = self
            .db
            .query(
                "CREATE approval_flow SET \
                 catalog_id = $catalog_id, flow_id = $flow_id, \
                 approver_group_id = $approver_group_id",
            )
            .bind(("catalog_id", record.catalog_id.clone()))
            .bind(("flow_id", record.flow_id.clone()))
            .bind(("approver_group_id", approver))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;
        let rows: Vec<ApprovalFlowRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "approval flow".into(),
            id: format!("{}/{}", record.catalog_id, record.flow_id),
        })?;

        Ok(row.try_into_record()?)
    }

    async fn get(&self, catalog_id: &str, flow_id: &str) -> CustosResult<Option<ApprovalFlowRecord>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM approval_flow \
                 WHERE catalog_id = $catalog_id AND flow_id = $flow_id",
            )
            .bind(("catalog_id", catalog_id.to_string()))
            .bind(("flow_id", flow_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ApprovalFlowRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.try_into_record()?)),
            None => Ok(None),
        }
    }
}
