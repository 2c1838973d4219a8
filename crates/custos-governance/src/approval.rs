//! Approval-request lifecycle: submit, approve, reject, revoke.

use std::sync::Arc;

use chrono::Utc;
use custos_core::error::{CustosError, CustosResult};
use custos_core::models::approval_flow::{ApprovalFlowConfig, ApproverPolicy};
use custos_core::models::approval_request::{
    ApprovalRequest, ApprovalRequestStatus, ApproverType, SubmitApprovalRequest,
};
use custos_core::plugin::SchedulerProvider;
use custos_core::registry::{ApprovalFlowHandlerRegistry, NotificationPluginRegistry};
use custos_core::store::{
    ApprovalFlowStore, ApprovalRequestStore, CatalogConfigStore, GroupStore, ResourceStore,
};
use tracing::info;
use uuid::Uuid;

use crate::notify;

/// Parse an ISO-8601 duration such as `"PT20H"` or `"P30DT24H"`.
///
/// Year and month components have no fixed length and are rejected.
fn parse_duration(value: &str) -> CustosResult<std::time::Duration> {
    let parsed = value.parse::<iso8601_duration::Duration>().map_err(|_| {
        CustosError::bad_request(format!("invalid ISO-8601 duration '{value}'"))
    })?;
    if parsed.year != 0.0 || parsed.month != 0.0 {
        return Err(CustosError::bad_request(format!(
            "duration '{value}' uses year or month components, which are not supported"
        )));
    }
    let seconds = f64::from(parsed.day) * 86_400.0
        + f64::from(parsed.hour) * 3_600.0
        + f64::from(parsed.minute) * 60.0
        + f64::from(parsed.second);
    Ok(std::time::Duration::from_secs_f64(seconds))
}

/// Drives approval requests through their lifecycle. Per-flow behavior
/// (validation, execution) is delegated to the registered
/// [`ApprovalFlowHandler`](custos_core::flow::ApprovalFlowHandler)s.
pub struct ApprovalRequestService<G, K, F, Q, R> {
    groups: G,
    config: K,
    flow_store: F,
    requests: Q,
    resources: R,
    flows: Arc<ApprovalFlowHandlerRegistry>,
    plugins: Arc<NotificationPluginRegistry>,
    scheduler: Option<Arc<dyn SchedulerProvider>>,
}

impl<G, K, F, Q, R> ApprovalRequestService<G, K, F, Q, R>
where
    G: GroupStore,
    K: CatalogConfigStore,
    F: ApprovalFlowStore,
    Q: ApprovalRequestStore,
    R: ResourceStore,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        groups: G,
        config: K,
        flow_store: F,
        requests: Q,
        resources: R,
        flows: Arc<ApprovalFlowHandlerRegistry>,
        plugins: Arc<NotificationPluginRegistry>,
        scheduler: Option<Arc<dyn SchedulerProvider>>,
    ) -> Self {
        Self {
            groups,
            config,
            flow_store,
            requests,
            resources,
            flows,
            plugins,
            scheduler,
        }
    }

    /// Submit a new approval request.
    ///
    /// The returned request is `Pending`, or `ValidationFailed` when the
    /// flow's validation handler turned it down — in that case no
    /// notifications are sent.
    pub async fn submit(&self, input: SubmitApprovalRequest) -> CustosResult<ApprovalRequest> {
        // 1. Resolve the flow configuration and validate the auto-revoke
        //    parameters before anything is persisted.
        let catalog = self
            .config
            .get_config(&input.catalog_id)
            .await?
            .ok_or_else(|| CustosError::not_found("catalog", &input.catalog_id))?;
        let flow = catalog
            .approval_flow(&input.approval_flow_id)
            .ok_or_else(|| {
                CustosError::not_found("approval flow", &input.approval_flow_id)
            })?;
        self.validate_auto_revoke(flow, input.auto_revoke_duration.as_deref())?;

        // 2. Resolve the approver group according to the flow's policy.
        let approver_group_id = self.resolve_approver(&input, flow).await?;

        // 3. Persist as Pending.
        let request = ApprovalRequest {
            request_id: Uuid::new_v4(),
            status: ApprovalRequestStatus::Pending,
            catalog_id: input.catalog_id,
            approval_flow_id: input.approval_flow_id,
            request_user_id: input.request_user_id,
            request_comment: input.request_comment,
            input_params: input.input_params,
            input_resources: input.input_resources,
            approver_type: ApproverType::Group,
            approver_group_id,
            request_date: Utc::now(),
            validated_date: None,
            approved_date: None,
            validation_result: None,
            auto_revoke_duration: input.auto_revoke_duration,
        };
        let mut request = self.requests.save(request).await?;

        // 4. Run the flow's validation handler.
        let handler = self.flows.require(&request.approval_flow_id)?;
        let verdict = handler.validate_request(&request).await?;
        request.validated_date = Some(Utc::now());
        request.validation_result = Some(verdict.clone());

        if !verdict.passed {
            info!(
                request_id = %request.request_id,
                reason = verdict.message.as_deref().unwrap_or(""),
                "approval request failed validation"
            );
            request.status = ApprovalRequestStatus::ValidationFailed;
            return self.requests.save(request).await;
        }

        let request = self.requests.save(request).await?;

        // 5. Best-effort approver notification. The persisted request is
        //    the source of truth; dispatch failures never fail the submit.
        notify::send_approval_request_notifications(
            &self.groups,
            &self.plugins,
            approver_group_id,
            &request,
        )
        .await;

        Ok(request)
    }

    fn validate_auto_revoke(
        &self,
        flow: &ApprovalFlowConfig,
        duration: Option<&str>,
    ) -> CustosResult<()> {
        let policy = flow.auto_revoke.as_ref().filter(|policy| policy.enabled);

        let Some(duration) = duration else {
            if policy.is_some_and(|policy| policy.default_settings.required) {
                return Err(CustosError::bad_request(format!(
                    "flow '{}' requires an auto-revoke duration",
                    flow.id
                )));
            }
            return Ok(());
        };

        let Some(policy) = policy else {
            return Err(CustosError::bad_request(format!(
                "flow '{}' does not support auto-revoke",
                flow.id
            )));
        };

        if self.scheduler.is_none() {
            return Err(CustosError::internal(
                "auto-revoke requested but no scheduler provider is configured",
            ));
        }

        let requested = parse_duration(duration)?;
        let cap = parse_duration(&policy.default_settings.max_duration).map_err(|_| {
            CustosError::internal(format!(
                "flow '{}' has an invalid max auto-revoke duration '{}'",
                flow.id, policy.default_settings.max_duration
            ))
        })?;

        if requested > cap {
            return Err(CustosError::bad_request(format!(
                "auto-revoke duration '{duration}' exceeds the maximum '{}'",
                policy.default_settings.max_duration
            )));
        }

        Ok(())
    }

    async fn resolve_approver(
        &self,
        input: &SubmitApprovalRequest,
        flow: &ApprovalFlowConfig,
    ) -> CustosResult<Uuid> {
        match &flow.approver {
            ApproverPolicy::ApprovalFlow => {
                let record = self
                    .flow_store
                    .get(&input.catalog_id, &input.approval_flow_id)
                    .await?;
                record
                    .and_then(|record| record.approver_group_id)
                    .ok_or_else(|| {
                        CustosError::internal(format!(
                            "approval flow '{}' has no approver group configured",
                            input.approval_flow_id
                        ))
                    })
            }
            ApproverPolicy::Resource { resource_type_id } => {
                let named = input
                    .input_resources
                    .iter()
                    .find(|resource| resource.resource_type_id == *resource_type_id)
                    .ok_or_else(|| {
                        CustosError::bad_request(format!(
                            "request names no input resource of type '{resource_type_id}'"
                        ))
                    })?;
                let record = self
                    .resources
                    .get_record(&input.catalog_id, resource_type_id, &named.resource_id)
                    .await?
                    .ok_or_else(|| {
                        CustosError::bad_request(format!(
                            "input resource '{}' was not found",
                            named.resource_id
                        ))
                    })?;
                // Approval must be pre-wired before a request naming the
                // resource can be submitted.
                record.approver_group_id.ok_or_else(|| {
                    CustosError::bad_request(format!(
                        "input resource '{}' has no approver group configured",
                        named.resource_id
                    ))
                })
            }
            ApproverPolicy::RequestSpecified => input.approver_group_id.ok_or_else(|| {
                CustosError::bad_request("request must specify an approver group")
            }),
        }
    }

    /// Approve a pending request as `user_id`, running the flow's
    /// `approved` handler before the status flips.
    pub async fn approve(&self, request_id: Uuid, user_id: Uuid) -> CustosResult<ApprovalRequest> {
        let mut request = self.require_open(request_id).await?;
        self.require_approver(&request, user_id).await?;

        let handler = self.flows.require(&request.approval_flow_id)?;
        handler.on_approved(&request).await?;

        request.status = ApprovalRequestStatus::Approved;
        request.approved_date = Some(Utc::now());
        info!(request_id = %request.request_id, approver = %user_id, "approval request approved");
        self.requests.save(request).await
    }

    /// Reject a pending request. No flow handler is involved.
    pub async fn reject(&self, request_id: Uuid, user_id: Uuid) -> CustosResult<ApprovalRequest> {
        let mut request = self.require_open(request_id).await?;
        self.require_approver(&request, user_id).await?;

        request.status = ApprovalRequestStatus::Rejected;
        info!(request_id = %request.request_id, approver = %user_id, "approval request rejected");
        self.requests.save(request).await
    }

    /// Revoke a pending or approved request, running the flow's `revoked`
    /// handler. Only flows with `enable_revoke` allow this.
    pub async fn revoke(&self, request_id: Uuid, user_id: Uuid) -> CustosResult<ApprovalRequest> {
        let mut request = self
            .requests
            .get_by_id(request_id)
            .await?
            .ok_or_else(|| CustosError::not_found("approval request", request_id))?;

        if !matches!(
            request.status,
            ApprovalRequestStatus::Pending | ApprovalRequestStatus::Approved
        ) {
            return Err(CustosError::bad_request(format!(
                "approval request {request_id} cannot be revoked in its current state"
            )));
        }

        let catalog = self
            .config
            .get_config(&request.catalog_id)
            .await?
            .ok_or_else(|| CustosError::not_found("catalog", &request.catalog_id))?;
        let flow = catalog
            .approval_flow(&request.approval_flow_id)
            .ok_or_else(|| {
                CustosError::not_found("approval flow", &request.approval_flow_id)
            })?;
        if !flow.enable_revoke {
            return Err(CustosError::bad_request(format!(
                "flow '{}' does not allow revocation",
                flow.id
            )));
        }

        // The requester may withdraw their own request; approvers may
        // revoke it as well.
        if request.request_user_id != user_id {
            self.require_approver(&request, user_id).await?;
        }

        let handler = self.flows.require(&request.approval_flow_id)?;
        handler.on_revoked(&request).await?;

        request.status = ApprovalRequestStatus::Revoked;
        info!(request_id = %request.request_id, user = %user_id, "approval request revoked");
        self.requests.save(request).await
    }

    pub async fn get(&self, request_id: Uuid) -> CustosResult<ApprovalRequest> {
        self.requests
            .get_by_id(request_id)
            .await?
            .ok_or_else(|| CustosError::not_found("approval request", request_id))
    }

    pub async fn list_by_flow(
        &self,
        catalog_id: &str,
        flow_id: &str,
    ) -> CustosResult<Vec<ApprovalRequest>> {
        self.requests.list_by_flow(catalog_id, flow_id).await
    }

    pub async fn list_by_requester(&self, user_id: Uuid) -> CustosResult<Vec<ApprovalRequest>> {
        self.requests.list_by_requester(user_id).await
    }

    pub async fn list_by_approver(&self, group_id: Uuid) -> CustosResult<Vec<ApprovalRequest>> {
        self.requests.list_by_approver(group_id).await
    }

    async fn require_open(&self, request_id: Uuid) -> CustosResult<ApprovalRequest> {
        let request = self
            .requests
            .get_by_id(request_id)
            .await?
            .ok_or_else(|| CustosError::not_found("approval request", request_id))?;
        if !request.status.is_open() {
            return Err(CustosError::bad_request(format!(
                "approval request {request_id} is no longer pending"
            )));
        }
        Ok(request)
    }

    async fn require_approver(
        &self,
        request: &ApprovalRequest,
        user_id: Uuid,
    ) -> CustosResult<()> {
        let membership = self
            .groups
            .get_membership(request.approver_group_id, user_id)
            .await?;
        if membership.is_none() {
            return Err(CustosError::forbidden(format!(
                "user {user_id} is not in the approver group of request {}",
                request.request_id
            )));
        }
        Ok(())
    }
}
