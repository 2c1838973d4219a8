//! Built-in "resource-update" approval flow.
//!
//! Gates approval-pending resource-parameter changes. The approver for
//! this flow is fixed: the approver group configured on the target
//! resource's parent. Validation and approval both re-derive the parent
//! and require an exact group match — ownership of the resource grants
//! nothing here.

use std::sync::Arc;

use async_trait::async_trait;
use custos_authz::ResourceInfoResolver;
use custos_core::error::{CustosError, CustosResult};
use custos_core::flow::ApprovalFlowHandler;
use custos_core::models::approval_request::{ApprovalRequest, FlowValidationResult};
use custos_core::models::resource::ResourceInfo;
use custos_core::registry::ResourceTypeHandlerRegistry;
use custos_core::store::ResourceStore;
use tracing::info;

/// Flow id under which the built-in resource-update flow is registered.
pub const RESOURCE_UPDATE_FLOW_ID: &str = "resource-update";

pub struct ResourceUpdateFlow<R> {
    handlers: Arc<ResourceTypeHandlerRegistry>,
    resolver: ResourceInfoResolver<R>,
    resources: R,
}

impl<R: ResourceStore> ResourceUpdateFlow<R> {
    pub fn new(
        handlers: Arc<ResourceTypeHandlerRegistry>,
        resolver: ResourceInfoResolver<R>,
        resources: R,
    ) -> Self {
        Self {
            handlers,
            resolver,
            resources,
        }
    }

    /// Re-derive the target resource and check the approver-group match
    /// against its parent. `Ok(Err(reason))` is a check failure the
    /// caller turns into a validation failure or a hard denial;
    /// `Err` is a collaborator failure.
    async fn checked_target(
        &self,
        request: &ApprovalRequest,
    ) -> CustosResult<Result<ResourceInfo, String>> {
        let Some(target) = request.input_resources.first() else {
            return Ok(Err("request names no target resource".into()));
        };

        let handler = self.handlers.require(&target.resource_type_id)?;
        let Some(resource) = self
            .resolver
            .resolve(
                handler.as_ref(),
                &request.catalog_id,
                &target.resource_type_id,
                &target.resource_id,
            )
            .await?
        else {
            return Ok(Err(format!(
                "resource '{}' was not found",
                target.resource_id
            )));
        };

        let (Some(parent_type), Some(parent_id)) = (
            resource.parent_resource_type_id.as_deref(),
            resource.parent_resource_id.as_deref(),
        ) else {
            return Ok(Err(format!(
                "resource '{}' has no parent resource to approve through",
                resource.id
            )));
        };

        let Some(parent) = self
            .resources
            .get_record(&request.catalog_id, parent_type, parent_id)
            .await?
        else {
            return Ok(Err(format!(
                "parent resource '{parent_id}' has no governance record"
            )));
        };

        match parent.approver_group_id {
            Some(approver) if approver == request.approver_group_id => Ok(Ok(resource)),
            Some(_) => Ok(Err(format!(
                "approver group does not match the one configured on parent resource '{parent_id}'"
            ))),
            None => Ok(Err(format!(
                "parent resource '{parent_id}' has no approver group configured"
            ))),
        }
    }
}

#[async_trait]
impl<R: ResourceStore> ApprovalFlowHandler for ResourceUpdateFlow<R> {
    async fn validate_request(
        &self,
        request: &ApprovalRequest,
    ) -> CustosResult<FlowValidationResult> {
        Ok(match self.checked_target(request).await? {
            Ok(_) => FlowValidationResult::pass(),
            Err(reason) => FlowValidationResult::fail(reason),
        })
    }

    /// Execute the pending parameter update: run the resource type's
    /// update handler, then clear the pending marker.
    async fn on_approved(&self, request: &ApprovalRequest) -> CustosResult<()> {
        let resource = match self.checked_target(request).await? {
            Ok(resource) => resource,
            Err(reason) => return Err(CustosError::forbidden(reason)),
        };

        let handler = self.handlers.require(&resource.resource_type_id)?;
        handler
            .update_resource(
                &request.catalog_id,
                &resource.resource_type_id,
                &resource.id,
                &request.input_params,
            )
            .await
            .map_err(|e| {
                CustosError::internal(format!(
                    "failed to execute approved update for resource '{}': {e}",
                    resource.id
                ))
            })?;

        self.resources
            .set_pending_update(
                &request.catalog_id,
                &resource.resource_type_id,
                &resource.id,
                None,
            )
            .await
            .map_err(|e| {
                CustosError::internal(format!(
                    "update of resource '{}' applied but the pending marker could not be cleared: {e}",
                    resource.id
                ))
            })?;

        info!(
            resource_id = %resource.id,
            request_id = %request.request_id,
            "approved resource update executed"
        );
        Ok(())
    }

    /// Revoking an in-flight parameter update is an open gap, kept as an
    /// explicit failure rather than a silent no-op.
    async fn on_revoked(&self, _request: &ApprovalRequest) -> CustosResult<()> {
        Err(CustosError::internal(
            "revoking a resource update is not implemented",
        ))
    }
}
