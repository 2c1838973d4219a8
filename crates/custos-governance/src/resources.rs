//! Resource administration: creation, updates (direct and
//! approval-gated), ownership management and deletion with its
//! audit-notification cascades.

use std::sync::Arc;

use chrono::Utc;
use custos_authz::{PermissionEvaluator, ResourceInfoResolver};
use custos_core::error::{CustosError, CustosResult};
use custos_core::models::approval_request::{
    ApprovalRequest, ApprovalRequestStatus, InputResource, SubmitApprovalRequest,
};
use custos_core::models::catalog::{ResourceTypeConfig, UpdateApproverPolicy};
use custos_core::models::resource::{
    PendingUpdateParams, ResourceAuditItem, ResourceInfo, ResourceRecord,
};
use custos_core::registry::ResourceTypeHandlerRegistry;
use custos_core::store::{
    ApprovalFlowStore, ApprovalRequestStore, CatalogConfigStore, CatalogStore, GroupStore,
    ResourceStore, UserStore,
};
use tracing::info;
use uuid::Uuid;

use crate::approval::ApprovalRequestService;
use crate::audit_notification::AuditNotificationService;
use crate::flows::RESOURCE_UPDATE_FLOW_ID;

#[derive(Debug, Clone)]
pub struct CreateResourceInput {
    pub catalog_id: String,
    pub resource_type_id: String,
    pub name: String,
    pub params: serde_json::Value,
    pub owner_group_id: Option<Uuid>,
    pub parent_resource_id: Option<String>,
}

pub struct ResourceService<U, G, C, K, F, Q, R> {
    evaluator: PermissionEvaluator<U, G, C, R>,
    resolver: ResourceInfoResolver<R>,
    config: K,
    resources: R,
    handlers: Arc<ResourceTypeHandlerRegistry>,
    approvals: ApprovalRequestService<G, K, F, Q, R>,
    audit: AuditNotificationService<U, G, C, R>,
}

impl<U, G, C, K, F, Q, R> ResourceService<U, G, C, K, F, Q, R>
where
    U: UserStore,
    G: GroupStore,
    C: CatalogStore,
    K: CatalogConfigStore,
    F: ApprovalFlowStore,
    Q: ApprovalRequestStore,
    R: ResourceStore,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        evaluator: PermissionEvaluator<U, G, C, R>,
        resolver: ResourceInfoResolver<R>,
        config: K,
        resources: R,
        handlers: Arc<ResourceTypeHandlerRegistry>,
        approvals: ApprovalRequestService<G, K, F, Q, R>,
        audit: AuditNotificationService<U, G, C, R>,
    ) -> Self {
        Self {
            evaluator,
            resolver,
            config,
            resources,
            handlers,
            approvals,
            audit,
        }
    }

    async fn resource_type(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
    ) -> CustosResult<ResourceTypeConfig> {
        let config = self
            .config
            .get_config(catalog_id)
            .await?
            .ok_or_else(|| CustosError::not_found("catalog", catalog_id))?;
        config
            .resource_type(resource_type_id)
            .cloned()
            .ok_or_else(|| {
                CustosError::bad_request(format!(
                    "unknown resource type '{resource_type_id}' in catalog '{catalog_id}'"
                ))
            })
    }

    async fn resolve(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
    ) -> CustosResult<ResourceInfo> {
        let handler = self.handlers.require(resource_type_id)?;
        self.resolver
            .resolve(handler.as_ref(), catalog_id, resource_type_id, resource_id)
            .await?
            .ok_or_else(|| CustosError::not_found("resource", resource_id))
    }

    pub async fn create_resource(
        &self,
        input: CreateResourceInput,
        user_id: Uuid,
    ) -> CustosResult<ResourceInfo> {
        let resource_type = self
            .resource_type(&input.catalog_id, &input.resource_type_id)
            .await?;
        if !resource_type.capabilities.is_creatable {
            return Err(CustosError::bad_request(format!(
                "resource type '{}' cannot be created",
                resource_type.id
            )));
        }

        self.evaluator
            .check_can_create_resource(
                &resource_type,
                &input.catalog_id,
                input.parent_resource_id.as_deref(),
                user_id,
            )
            .await?;

        let handler = self.handlers.require(&input.resource_type_id)?;
        let live = handler
            .create_resource(
                &input.catalog_id,
                &input.resource_type_id,
                &input.name,
                &input.params,
            )
            .await?;

        let record = self
            .resources
            .save_record(ResourceRecord {
                catalog_id: input.catalog_id.clone(),
                resource_type_id: input.resource_type_id.clone(),
                resource_id: live.id.clone(),
                owner_group_id: input.owner_group_id,
                approver_group_id: None,
                parent_resource_type_id: resource_type.parent_resource_type_id.clone(),
                pending_update: None,
                audit_notifications: Vec::new(),
            })
            .await?;

        info!(resource_id = %live.id, catalog = %input.catalog_id, "resource created");
        Ok(ResourceInfo::merge(live, record))
    }

    pub async fn get_resource(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
    ) -> CustosResult<ResourceInfo> {
        self.resolve(catalog_id, resource_type_id, resource_id).await
    }

    pub async fn list_resources(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
    ) -> CustosResult<Vec<ResourceInfo>> {
        let handler = self.handlers.require(resource_type_id)?;
        self.resolver
            .resolve_all(handler.as_ref(), catalog_id, resource_type_id)
            .await
    }

    /// Apply a parameter update directly, without approval.
    pub async fn update_resource(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
        params: serde_json::Value,
        user_id: Uuid,
    ) -> CustosResult<ResourceInfo> {
        let resource_type = self.resource_type(catalog_id, resource_type_id).await?;
        if !resource_type.capabilities.is_updatable {
            return Err(CustosError::bad_request(format!(
                "resource type '{}' cannot be updated",
                resource_type.id
            )));
        }

        let resource = self.resolve(catalog_id, resource_type_id, resource_id).await?;
        self.evaluator
            .check_can_edit_resource(&resource, user_id)
            .await?;

        let handler = self.handlers.require(resource_type_id)?;
        let live = handler
            .update_resource(catalog_id, resource_type_id, resource_id, &params)
            .await?;

        info!(%resource_id, "resource updated");
        Ok(ResourceInfo::merge(live, resource.to_record()))
    }

    /// Submit an approval-gated parameter update. The update is persisted
    /// as `pending_update` on the record and only applied when the
    /// resource-update flow approves it.
    pub async fn request_update(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
        params: serde_json::Value,
        comment: String,
        user_id: Uuid,
    ) -> CustosResult<ApprovalRequest> {
        let resource_type = self.resource_type(catalog_id, resource_type_id).await?;
        if !resource_type.capabilities.is_updatable {
            return Err(CustosError::bad_request(format!(
                "resource type '{}' cannot be updated",
                resource_type.id
            )));
        }

        let resource = self.resolve(catalog_id, resource_type_id, resource_id).await?;
        self.evaluator
            .check_can_edit_resource(&resource, user_id)
            .await?;

        if let Some(pending) = &resource.pending_update {
            return Err(CustosError::conflict(format!(
                "resource '{resource_id}' already has a pending update from request {}",
                pending.approval_request_id
            )));
        }

        let approver_group_id = self
            .update_approver_group(catalog_id, &resource_type, &resource)
            .await?;

        let request = self
            .approvals
            .submit(SubmitApprovalRequest {
                catalog_id: catalog_id.to_string(),
                approval_flow_id: RESOURCE_UPDATE_FLOW_ID.to_string(),
                request_user_id: user_id,
                request_comment: comment,
                input_params: params.clone(),
                input_resources: vec![InputResource {
                    resource_type_id: resource_type_id.to_string(),
                    resource_id: resource_id.to_string(),
                }],
                approver_group_id: Some(approver_group_id),
                auto_revoke_duration: None,
            })
            .await?;

        // Requests that failed validation leave no pending marker behind.
        if request.status == ApprovalRequestStatus::Pending {
            self.resources
                .set_pending_update(
                    catalog_id,
                    resource_type_id,
                    resource_id,
                    Some(PendingUpdateParams {
                        approval_request_id: request.request_id,
                        update_params: params,
                        request_user_id: user_id,
                        requested_at: Utc::now(),
                    }),
                )
                .await?;
        }

        Ok(request)
    }

    async fn update_approver_group(
        &self,
        catalog_id: &str,
        resource_type: &ResourceTypeConfig,
        resource: &ResourceInfo,
    ) -> CustosResult<Uuid> {
        match resource_type.update_approver {
            None => Err(CustosError::bad_request(format!(
                "resource type '{}' does not support approval-gated updates",
                resource_type.id
            ))),
            Some(UpdateApproverPolicy::This) => resource.approver_group_id.ok_or_else(|| {
                CustosError::bad_request(format!(
                    "resource '{}' has no approver group configured",
                    resource.id
                ))
            }),
            Some(UpdateApproverPolicy::ParentResource) => {
                let (Some(parent_type), Some(parent_id)) = (
                    resource.parent_resource_type_id.as_deref(),
                    resource.parent_resource_id.as_deref(),
                ) else {
                    return Err(CustosError::bad_request(format!(
                        "resource '{}' has no parent resource",
                        resource.id
                    )));
                };
                self.resources
                    .get_record(catalog_id, parent_type, parent_id)
                    .await?
                    .and_then(|parent| parent.approver_group_id)
                    .ok_or_else(|| {
                        CustosError::bad_request(format!(
                            "parent resource '{parent_id}' has no approver group configured"
                        ))
                    })
            }
        }
    }

    pub async fn update_owner_group(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
        owner_group_id: Option<Uuid>,
        user_id: Uuid,
    ) -> CustosResult<ResourceRecord> {
        let resource_type = self.resource_type(catalog_id, resource_type_id).await?;
        if !resource_type.capabilities.owner_management {
            return Err(CustosError::bad_request(format!(
                "resource type '{}' does not allow owner reassignment",
                resource_type.id
            )));
        }

        let resource = self.resolve(catalog_id, resource_type_id, resource_id).await?;
        self.evaluator
            .check_can_update_resource_owner(&resource, user_id)
            .await?;

        let mut record = resource.to_record();
        record.owner_group_id = owner_group_id;
        let record = self.resources.save_record(record).await?;

        info!(%resource_id, "resource owner group updated");
        Ok(record)
    }

    pub async fn update_approver_group_assignment(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
        approver_group_id: Option<Uuid>,
        user_id: Uuid,
    ) -> CustosResult<ResourceRecord> {
        let resource_type = self.resource_type(catalog_id, resource_type_id).await?;
        if !resource_type.capabilities.approver_management {
            return Err(CustosError::bad_request(format!(
                "resource type '{}' does not allow approver reassignment",
                resource_type.id
            )));
        }

        let resource = self.resolve(catalog_id, resource_type_id, resource_id).await?;
        self.evaluator
            .check_can_update_resource_approver(&resource, user_id)
            .await?;

        let mut record = resource.to_record();
        record.approver_group_id = approver_group_id;
        let record = self.resources.save_record(record).await?;

        info!(%resource_id, "resource approver group updated");
        Ok(record)
    }

    /// Delete a resource. Audit scheduler events are cleaned up
    /// best-effort before the handler runs; channels after the record is
    /// gone. Only the handler call and the record removal are hard
    /// failure points.
    pub async fn delete_resource(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
        user_id: Uuid,
    ) -> CustosResult<()> {
        let resource_type = self.resource_type(catalog_id, resource_type_id).await?;
        if !resource_type.capabilities.is_deletable {
            return Err(CustosError::bad_request(format!(
                "resource type '{}' cannot be deleted",
                resource_type.id
            )));
        }

        let resource = self.resolve(catalog_id, resource_type_id, resource_id).await?;
        self.evaluator
            .check_can_edit_resource(&resource, user_id)
            .await?;

        self.audit.delete_scheduler_events_for(&resource).await;

        let handler = self.handlers.require(resource_type_id)?;
        handler
            .delete_resource(catalog_id, resource_type_id, resource_id)
            .await?;

        self.resources
            .delete_record(catalog_id, resource_type_id, resource_id)
            .await?;

        let message = format!(
            "Audit notifications for resource '{}' removed with the resource",
            resource.name
        );
        self.audit.unset_channels_for(&resource, &message).await;

        info!(%resource_id, catalog = %catalog_id, "resource deleted");
        Ok(())
    }

    pub async fn list_audit_items(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
    ) -> CustosResult<Vec<ResourceAuditItem>> {
        let handler = self.handlers.require(resource_type_id)?;
        handler
            .list_resource_audit_items(catalog_id, resource_type_id, resource_id)
            .await
    }
}
