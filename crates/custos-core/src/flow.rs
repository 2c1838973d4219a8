//! Approval flow handler contract.

use async_trait::async_trait;

use crate::error::CustosResult;
use crate::models::approval_request::{ApprovalRequest, FlowValidationResult};

/// Per-flow validation and execution hooks, registered under the flow id.
#[async_trait]
pub trait ApprovalFlowHandler: Send + Sync {
    /// Gate a freshly submitted request. A failed result persists the
    /// request as `ValidationFailed`; an `Err` aborts the submission.
    async fn validate_request(
        &self,
        request: &ApprovalRequest,
    ) -> CustosResult<FlowValidationResult>;

    /// Execute the approved action.
    async fn on_approved(&self, request: &ApprovalRequest) -> CustosResult<()>;

    /// Undo a previously granted action on revocation.
    async fn on_revoked(&self, request: &ApprovalRequest) -> CustosResult<()>;
}
