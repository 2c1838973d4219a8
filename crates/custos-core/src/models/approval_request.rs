//! Approval request domain model and lifecycle states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle states of an approval request.
///
/// `Pending` transitions once, to `ValidationFailed` (during submission)
/// or to one of `Approved` / `Rejected` / `Revoked`. Requests are never
/// deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalRequestStatus {
    Pending,
    ValidationFailed,
    Approved,
    Rejected,
    Revoked,
}

impl ApprovalRequestStatus {
    /// Whether an approver can still act on the request.
    pub fn is_open(self) -> bool {
        matches!(self, ApprovalRequestStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApproverType {
    Group,
}

/// A resource referenced by an approval request's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputResource {
    pub resource_type_id: String,
    pub resource_id: String,
}

/// Result reported by a flow's validation handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowValidationResult {
    pub passed: bool,
    pub message: Option<String>,
}

impl FlowValidationResult {
    pub fn pass() -> Self {
        Self {
            passed: true,
            message: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub request_id: Uuid,
    pub status: ApprovalRequestStatus,
    pub catalog_id: String,
    pub approval_flow_id: String,
    pub request_user_id: Uuid,
    pub request_comment: String,
    pub input_params: serde_json::Value,
    pub input_resources: Vec<InputResource>,
    pub approver_type: ApproverType,
    pub approver_group_id: Uuid,
    pub request_date: DateTime<Utc>,
    pub validated_date: Option<DateTime<Utc>>,
    pub approved_date: Option<DateTime<Utc>>,
    pub validation_result: Option<FlowValidationResult>,
    /// ISO-8601 duration after which the grant is revoked again.
    pub auto_revoke_duration: Option<String>,
}

impl ApprovalRequest {
    /// The first input resource of the given type, if the request names one.
    pub fn input_resource(&self, resource_type_id: &str) -> Option<&InputResource> {
        self.input_resources
            .iter()
            .find(|resource| resource.resource_type_id == resource_type_id)
    }
}

/// Submission input for an [`ApprovalRequest`].
#[derive(Debug, Clone)]
pub struct SubmitApprovalRequest {
    pub catalog_id: String,
    pub approval_flow_id: String,
    pub request_user_id: Uuid,
    pub request_comment: String,
    pub input_params: serde_json::Value,
    pub input_resources: Vec<InputResource>,
    /// Only honored by flows with the `RequestSpecified` approver policy.
    pub approver_group_id: Option<Uuid>,
    pub auto_revoke_duration: Option<String>,
}
