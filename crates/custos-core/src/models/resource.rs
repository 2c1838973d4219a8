//! Resource governance record, handler-side view and the merged info value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::notification::NotificationChannel;

/// Audit-notification binding: the scheduler event and notification
/// channel pair attached to a resource. A resource holds at most one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditNotificationBinding {
    pub id: Uuid,
    pub channel: NotificationChannel,
    pub scheduler_event_id: Uuid,
    pub cron_expression: String,
}

/// An approval-gated parameter change awaiting approval. While present it
/// blocks further update-with-approval submissions for the resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingUpdateParams {
    pub approval_request_id: Uuid,
    pub update_params: serde_json::Value,
    pub request_user_id: Uuid,
    pub requested_at: DateTime<Utc>,
}

/// Governance record persisted by the hub for a resource. The resource
/// itself lives in the type handler's backing system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub catalog_id: String,
    pub resource_type_id: String,
    pub resource_id: String,
    pub owner_group_id: Option<Uuid>,
    pub approver_group_id: Option<Uuid>,
    pub parent_resource_type_id: Option<String>,
    pub pending_update: Option<PendingUpdateParams>,
    pub audit_notifications: Vec<AuditNotificationBinding>,
}

/// A resource as seen by its type handler's backing system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerResource {
    pub id: String,
    pub name: String,
    pub params: serde_json::Value,
    pub parent_resource_id: Option<String>,
}

/// Handler view merged with the governance record.
///
/// A resource may exist purely in its backing system; the governance
/// fields are then empty. When both sides exist, persisted governance
/// fields win on overlap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub catalog_id: String,
    pub resource_type_id: String,
    pub id: String,
    pub name: String,
    pub params: serde_json::Value,
    pub parent_resource_id: Option<String>,
    pub owner_group_id: Option<Uuid>,
    pub approver_group_id: Option<Uuid>,
    pub parent_resource_type_id: Option<String>,
    pub pending_update: Option<PendingUpdateParams>,
    pub audit_notifications: Vec<AuditNotificationBinding>,
}

impl ResourceInfo {
    /// A resource known only to its backing system: governance fields are
    /// all empty.
    pub fn from_handler(
        catalog_id: impl Into<String>,
        resource_type_id: impl Into<String>,
        live: HandlerResource,
    ) -> Self {
        Self {
            catalog_id: catalog_id.into(),
            resource_type_id: resource_type_id.into(),
            id: live.id,
            name: live.name,
            params: live.params,
            parent_resource_id: live.parent_resource_id,
            owner_group_id: None,
            approver_group_id: None,
            parent_resource_type_id: None,
            pending_update: None,
            audit_notifications: Vec::new(),
        }
    }

    /// Merge the handler view with the persisted governance record.
    pub fn merge(live: HandlerResource, record: ResourceRecord) -> Self {
        Self {
            catalog_id: record.catalog_id,
            resource_type_id: record.resource_type_id,
            id: live.id,
            name: live.name,
            params: live.params,
            parent_resource_id: live.parent_resource_id,
            owner_group_id: record.owner_group_id,
            approver_group_id: record.approver_group_id,
            parent_resource_type_id: record.parent_resource_type_id,
            pending_update: record.pending_update,
            audit_notifications: record.audit_notifications,
        }
    }

    /// The governance record carried by this view.
    pub fn to_record(&self) -> ResourceRecord {
        ResourceRecord {
            catalog_id: self.catalog_id.clone(),
            resource_type_id: self.resource_type_id.clone(),
            resource_id: self.id.clone(),
            owner_group_id: self.owner_group_id,
            approver_group_id: self.approver_group_id,
            parent_resource_type_id: self.parent_resource_type_id.clone(),
            pending_update: self.pending_update.clone(),
            audit_notifications: self.audit_notifications.clone(),
        }
    }
}

/// One entry of a resource's audit trail as reported by its handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceAuditItem {
    pub id: String,
    pub name: String,
    pub detail: serde_json::Value,
}
