//! Catalog governance record and catalog configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::approval_flow::ApprovalFlowConfig;

/// Persisted catalog governance record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner_group_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCatalog {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner_group_id: Option<Uuid>,
}

/// Capability flags for a resource type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceTypeCapabilities {
    pub is_creatable: bool,
    pub is_updatable: bool,
    pub is_deletable: bool,
    /// Whether the owner group can be reassigned after creation.
    pub owner_management: bool,
    /// Whether the approver group can be reassigned after creation.
    pub approver_management: bool,
    /// Bypasses the ownership checks for creation.
    pub anyone_can_create: bool,
}

/// Which resource's approver group gates an update-with-approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateApproverPolicy {
    /// The resource's own approver group.
    This,
    /// The approver group configured on the parent resource.
    ParentResource,
}

/// Configuration of a resource type within a catalog. The concrete
/// behavior behind each operation is supplied by a
/// [`ResourceTypeHandler`](crate::handler::ResourceTypeHandler) registered
/// under the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTypeConfig {
    pub id: String,
    pub capabilities: ResourceTypeCapabilities,
    pub parent_resource_type_id: Option<String>,
    pub update_approver: Option<UpdateApproverPolicy>,
}

/// Full configuration of a catalog: its resource types and approval flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub id: String,
    pub resource_types: Vec<ResourceTypeConfig>,
    pub approval_flows: Vec<ApprovalFlowConfig>,
}

impl CatalogConfig {
    pub fn resource_type(&self, id: &str) -> Option<&ResourceTypeConfig> {
        self.resource_types.iter().find(|rt| rt.id == id)
    }

    pub fn approval_flow(&self, id: &str) -> Option<&ApprovalFlowConfig> {
        self.approval_flows.iter().find(|flow| flow.id == id)
    }
}
