//! Approval flow configuration and governance record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default cap on auto-revoke durations: 30 days 24 hours.
pub const DEFAULT_MAX_AUTO_REVOKE_DURATION: &str = "P30DT24H";

/// How the approver group for a submitted request is determined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApproverPolicy {
    /// The group persisted on the flow's governance record.
    ApprovalFlow,
    /// The approver group of the input resource with this type id.
    Resource { resource_type_id: String },
    /// The submitter declares the approver group.
    RequestSpecified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoRevokeSettings {
    /// Submissions must carry a duration when true.
    pub required: bool,
    /// ISO-8601 duration cap, e.g. `"P30DT24H"`.
    pub max_duration: String,
}

impl Default for AutoRevokeSettings {
    fn default() -> Self {
        Self {
            required: false,
            max_duration: DEFAULT_MAX_AUTO_REVOKE_DURATION.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoRevokePolicy {
    pub enabled: bool,
    pub default_settings: AutoRevokeSettings,
}

/// Configuration of an approval flow within a catalog. The validation and
/// execution behavior is supplied by an
/// [`ApprovalFlowHandler`](crate::flow::ApprovalFlowHandler) registered
/// under the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalFlowConfig {
    pub id: String,
    /// JSON schema describing the expected `input_params` shape. Input
    /// validation mechanics belong to the transport layer.
    pub input_schema: Option<serde_json::Value>,
    pub approver: ApproverPolicy,
    pub auto_revoke: Option<AutoRevokePolicy>,
    pub enable_revoke: bool,
}

/// Persisted flow governance record: carries the fixed approver group for
/// [`ApproverPolicy::ApprovalFlow`] flows so it can be re-pointed without
/// a configuration redeploy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalFlowRecord {
    pub catalog_id: String,
    pub flow_id: String,
    pub approver_group_id: Option<Uuid>,
}
