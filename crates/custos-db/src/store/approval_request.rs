//! SurrealDB implementation of [`ApprovalRequestStore`].
//!
//! Requests are only ever created and updated; there is no delete.

use chrono::{DateTime, Utc};
use custos_core::error::CustosResult;
use custos_core::models::approval_request::{
    ApprovalRequest, ApprovalRequestStatus, ApproverType, FlowValidationResult, InputResource,
};
use custos_core::store::ApprovalRequestStore;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ApprovalRequestRow {
    status: String,
    catalog_id: String,
    approval_flow_id: String,
    request_user_id: String,
    request_comment: String,
    input_params: serde_json::Value,
    input_resources: Vec<serde_json::Value>,
    approver_type: String,
    approver_group_id: String,
    request_date: DateTime<Utc>,
    validated_date: Option<DateTime<Utc>>,
    approved_date: Option<DateTime<Utc>>,
    validation_result: Option<serde_json::Value>,
    auto_revoke_duration: Option<String>,
}

#[derive(Debug, SurrealValue)]
struct ApprovalRequestRowWithId {
    record_id: String,
    status: String,
    catalog_id: String,
    approval_flow_id: String,
    request_user_id: String,
    request_comment: String,
    input_params: serde_json::Value,
    input_resources: Vec<serde_json::Value>,
    approver_type: String,
    approver_group_id: String,
    request_date: DateTime<Utc>,
    validated_date: Option<DateTime<Utc>>,
    approved_date: Option<DateTime<Utc>>,
    validation_result: Option<serde_json::Value>,
    auto_revoke_duration: Option<String>,
}

fn status_to_str(status: ApprovalRequestStatus) -> &'static str {
    match status {
        ApprovalRequestStatus::Pending => "Pending",
        ApprovalRequestStatus::ValidationFailed => "ValidationFailed",
        ApprovalRequestStatus::Approved => "Approved",
        ApprovalRequestStatus::Rejected => "Rejected",
        ApprovalRequestStatus::Revoked => "Revoked",
    }
}

fn parse_status(s: &str) -> Result<ApprovalRequestStatus, DbError> {
    match s {
        "Pending" => Ok(ApprovalRequestStatus::Pending),
        "ValidationFailed" => Ok(ApprovalRequestStatus::ValidationFailed),
        "Approved" => Ok(ApprovalRequestStatus::Approved),
        "Rejected" => Ok(ApprovalRequestStatus::Rejected),
        "Revoked" => Ok(ApprovalRequestStatus::Revoked),
        other => Err(DbError::Decode(format!("unknown request status: {other}"))),
    }
}

fn parse_approver_type(s: &str) -> Result<ApproverType, DbError> {
    match s {
        "Group" => Ok(ApproverType::Group),
        other => Err(DbError::Decode(format!("unknown approver type: {other}"))),
    }
}

fn row_to_request(row: ApprovalRequestRow, id: Uuid) -> Result<ApprovalRequest, DbError> {
    let request_user_id = Uuid::parse_str(&row.request_user_id)
        .map_err(|e| DbError::Decode(format!("invalid requester UUID: {e}")))?;
    let approver_group_id = Uuid::parse_str(&row.approver_group_id)
        .map_err(|e| DbError::Decode(format!("invalid approver group UUID: {e}")))?;

    let input_resources = row
        .input_resources
        .into_iter()
        .map(|value| {
            serde_json::from_value::<InputResource>(value)
                .map_err(|e| DbError::Decode(format!("input resource: {e}")))
        })
        .collect::<Result<Vec<_>, DbError>>()?;

    let validation_result = row
        .validation_result
        .map(|value| {
            serde_json::from_value::<FlowValidationResult>(value)
                .map_err(|e| DbError::Decode(format!("validation result: {e}")))
        })
        .transpose()?;

    Ok(ApprovalRequest {
        request_id: id,
        status: parse_status(&row.status)?,
        catalog_id: row.catalog_id,
        approval_flow_id: row.approval_flow_id,
        request_user_id,
        request_comment: row.request_comment,
        input_params: row.input_params,
        input_resources,
        approver_type: parse_approver_type(&row.approver_type)?,
        approver_group_id,
        request_date: row.request_date,
        validated_date: row.validated_date,
        approved_date: row.approved_date,
        validation_result,
        auto_revoke_duration: row.auto_revoke_duration,
    })
}

impl ApprovalRequestRowWithId {
    fn try_into_request(self) -> Result<ApprovalRequest, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid request UUID: {e}")))?;
        row_to_request(
            ApprovalRequestRow {
                status: self.status,
                catalog_id: self.catalog_id,
                approval_flow_id: self.approval_flow_id,
                request_user_id: self.request_user_id,
                request_comment: self.request_comment,
                input_params: self.input_params,
                input_resources: self.input_resources,
                approver_type: self.approver_type,
                approver_group_id: self.approver_group_id,
                request_date: self.request_date,
                validated_date: self.validated_date,
                approved_date: self.approved_date,
                validation_result: self.validation_result,
                auto_revoke_duration: self.auto_revoke_duration,
            },
            id,
        )
    }
}

/// SurrealDB implementation of the ApprovalRequest store.
#[derive(Clone)]
pub struct SurrealApprovalRequestStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealApprovalRequestStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn write(
        &self,
        statement: &str,
        request: &ApprovalRequest,
    ) -> CustosResult<Vec<ApprovalRequestRow>> {
        let input_resources = request
            .input_resources
            .iter()
            .map(|resource| {
                serde_json::to_value(resource)
                    .map_err(|e| DbError::Decode(format!("input resource: {e}")))
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        let validation_result = request
            .validation_result
            .as_ref()
            .map(|result| {
                serde_json::to_value(result)
                    .map_err(|e| DbError::Decode(format!("validation result: {e}")))
            })
            .transpose()?;

        let result = self
            .db
            .query(statement)
            .bind(("id", request.request_id.to_string()))
            .bind(("status", status_to_str(request.status)))
            .bind(("catalog_id", request.catalog_id.clone()))
            .bind(("approval_flow_id", request.approval_flow_id.clone()))
            .bind(("request_user_id", request.request_user_id.to_string()))
            .bind(("request_comment", request.request_comment.clone()))
            .bind(("input_params", request.input_params.clone()))
            .bind(("input_resources", input_resources))
            .bind(("approver_type", "Group"))
            .bind(("approver_group_id", request.approver_group_id.to_string()))
            .bind(("request_date", request.request_date))
            .bind(("validated_date", request.validated_date))
            .bind(("approved_date", request.approved_date))
            .bind(("validation_result", validation_result))
            .bind(("auto_revoke_duration", request.auto_revoke_duration.clone()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        Ok(result.take(0).map_err(DbError::from)?)
    }
}

const REQUEST_FIELDS: &str = "\
status = $status, \
catalog_id = $catalog_id, \
approval_flow_id = $approval_flow_id, \
request_user_id = $request_user_id, \
request_comment = $request_comment, \
input_params = $input_params, \
input_resources = $input_resources, \
approver_type = $approver_type, \
approver_group_id = $approver_group_id, \
request_date = $request_date, \
validated_date = $validated_date, \
approved_date = $approved_date, \
validation_result = $validation_result, \
auto_revoke_duration = $auto_revoke_duration";

impl<C: Connection> ApprovalRequestStore for SurrealApprovalRequestStore<C> {
    async fn save(&self, request: ApprovalRequest) -> CustosResult<ApprovalRequest> {
        let update = format!(
            "UPDATE type::record('approval_request', $id) SET {REQUEST_FIELDS}"
        );
        let rows = self.write(&update, &request).await?;
        if let Some(row) = rows.into_iter().next() {
            return Ok(row_to_request(row, request.request_id)?);
        }

        let create = format!(
            "CREATE type::record('approval_request', $id) SET {REQUEST_FIELDS}"
        );
        let rows = self.write(&create, &request).await?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "approval request".into(),
            id: request.request_id.to_string(),
        })?;

        Ok(row_to_request(row, request.request_id)?)
    }

    async fn get_by_id(&self, request_id: Uuid) -> CustosResult<Option<ApprovalRequest>> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('approval_request', $id)")
            .bind(("id", request_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ApprovalRequestRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row_to_request(row, request_id)?)),
            None => Ok(None),
        }
    }

    async fn list_by_flow(
        &self,
        catalog_id: &str,
        flow_id: &str,
    ) -> CustosResult<Vec<ApprovalRequest>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM approval_request \
                 WHERE catalog_id = $catalog_id \
                 AND approval_flow_id = $flow_id \
                 ORDER BY request_date ASC",
            )
            .bind(("catalog_id", catalog_id.to_string()))
            .bind(("flow_id", flow_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ApprovalRequestRowWithId> = result.take(0).map_err(DbError::from)?;
        let requests = rows
            .into_iter()
            .map(|row| row.try_into_request())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(requests)
    }

    async fn list_by_requester(&self, user_id: Uuid) -> CustosResult<Vec<ApprovalRequest>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM approval_request \
                 WHERE request_user_id = $request_user_id \
                 ORDER BY request_date ASC",
            )
            .bind(("request_user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ApprovalRequestRowWithId> = result.take(0).map_err(DbError::from)?;
        let requests = rows
            .into_iter()
            .map(|row| row.try_into_request())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(requests)
    }

    async fn list_by_approver(&self, group_id: Uuid) -> CustosResult<Vec<ApprovalRequest>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM approval_request \
                 WHERE approver_group_id = $approver_group_id \
                 ORDER BY request_date ASC",
            )
            .bind(("approver_group_id", group_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ApprovalRequestRowWithId> = result.take(0).map_err(DbError::from)?;
        let requests = rows
            .into_iter()
            .map(|row| row.try_into_request())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(requests)
    }
}
