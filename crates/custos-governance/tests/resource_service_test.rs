//! Integration tests for resource administration and the built-in
//! resource-update approval flow.

mod common;

use std::sync::atomic::Ordering;

use common::*;
use custos_core::error::ErrorKind;
use custos_core::models::approval_request::{
    ApprovalRequestStatus, InputResource, SubmitApprovalRequest,
};
use custos_core::models::group::GroupRole;
use custos_core::store::ResourceStore;
use custos_governance::audit_notification::CreateAuditNotificationInput;
use custos_governance::resources::CreateResourceInput;
use uuid::Uuid;

struct Scenario {
    h: Harness,
    catalog_owner: Uuid,
    resource_owner: Uuid,
    approver: Uuid,
    outsider: Uuid,
    owners: Uuid,
    approvers: Uuid,
}

async fn scenario(enable_revoke: bool) -> Scenario {
    let h = Harness::new(vec![main_catalog(vec![resource_update_flow(enable_revoke)])]).await;

    let catalog_owner = h.user("alice", Vec::new()).await;
    let resource_owner = h.user("bob", Vec::new()).await;
    let approver = h.user("carol", Vec::new()).await;
    let outsider = h.user("dave", Vec::new()).await;

    let catalog_owners = h.group("catalog-owners").await;
    let owners = h.group("owners").await;
    let approvers = h.group("approvers").await;
    h.member(catalog_owners, catalog_owner, GroupRole::Member).await;
    h.member(owners, resource_owner, GroupRole::Member).await;
    h.member(approvers, approver, GroupRole::Member).await;

    h.catalog("main", Some(catalog_owners)).await;
    h.seed_resource_tree(owners, approvers).await;

    Scenario {
        h,
        catalog_owner,
        resource_owner,
        approver,
        outsider,
        owners,
        approvers,
    }
}

#[tokio::test]
async fn create_and_fetch_round_trip_keeps_every_field() {
    let s = scenario(false).await;
    let svc = s.h.resource_service(s.h.resource_update_flows());

    let created = svc
        .create_resource(
            CreateResourceInput {
                catalog_id: "main".into(),
                resource_type_id: "database".into(),
                name: "billing database".into(),
                params: serde_json::json!({ "engine": "postgres" }),
                owner_group_id: Some(s.owners),
                parent_resource_id: None,
            },
            s.catalog_owner,
        )
        .await
        .unwrap();

    let fetched = svc
        .get_resource("main", "database", &created.id)
        .await
        .unwrap();
    assert_eq!(fetched.name, "billing database");
    assert_eq!(fetched.params, serde_json::json!({ "engine": "postgres" }));
    assert_eq!(fetched.owner_group_id, Some(s.owners));
    assert_eq!(fetched.parent_resource_type_id.as_deref(), Some("system"));
    assert!(fetched.audit_notifications.is_empty());
    assert!(fetched.pending_update.is_none());
}

#[tokio::test]
async fn creation_is_gated_by_capability_and_permission() {
    let s = scenario(false).await;
    let svc = s.h.resource_service(s.h.resource_update_flows());

    let input = CreateResourceInput {
        catalog_id: "main".into(),
        resource_type_id: "database".into(),
        name: "scratch".into(),
        params: serde_json::json!({}),
        owner_group_id: None,
        parent_resource_id: None,
    };

    let err = svc
        .create_resource(input.clone(), s.outsider)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    // Parent-resource owners may create children under their resource.
    let mut under_parent = input.clone();
    under_parent.parent_resource_id = Some("sys-1".into());
    svc.create_resource(under_parent, s.resource_owner)
        .await
        .unwrap();

    let mut unknown_type = input;
    unknown_type.resource_type_id = "mainframe".into();
    let err = svc
        .create_resource(unknown_type, s.catalog_owner)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}

#[tokio::test]
async fn request_update_records_the_pending_marker() {
    let s = scenario(false).await;
    let svc = s.h.resource_service(s.h.resource_update_flows());

    let request = svc
        .request_update(
            "main",
            "database",
            "db-1",
            serde_json::json!({ "tier": "gold" }),
            "bump the tier".into(),
            s.resource_owner,
        )
        .await
        .unwrap();

    // The approver is derived from the parent resource's approver group.
    assert_eq!(request.status, ApprovalRequestStatus::Pending);
    assert_eq!(request.approver_group_id, s.approvers);

    let resource = svc.get_resource("main", "database", "db-1").await.unwrap();
    let pending = resource.pending_update.unwrap();
    assert_eq!(pending.approval_request_id, request.request_id);
    assert_eq!(pending.update_params, serde_json::json!({ "tier": "gold" }));
    assert_eq!(pending.request_user_id, s.resource_owner);
}

#[tokio::test]
async fn a_pending_update_blocks_further_requests() {
    let s = scenario(false).await;
    let svc = s.h.resource_service(s.h.resource_update_flows());

    svc.request_update(
        "main",
        "database",
        "db-1",
        serde_json::json!({ "tier": "gold" }),
        String::new(),
        s.resource_owner,
    )
    .await
    .unwrap();

    let err = svc
        .request_update(
            "main",
            "database",
            "db-1",
            serde_json::json!({ "tier": "platinum" }),
            String::new(),
            s.resource_owner,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn approval_applies_the_update_and_clears_the_marker() {
    let s = scenario(false).await;
    let flows = s.h.resource_update_flows();
    let svc = s.h.resource_service(flows.clone());
    let approvals = s.h.approval_service(flows);

    let request = svc
        .request_update(
            "main",
            "database",
            "db-1",
            serde_json::json!({ "tier": "gold" }),
            String::new(),
            s.resource_owner,
        )
        .await
        .unwrap();

    let approved = approvals.approve(request.request_id, s.approver).await.unwrap();
    assert_eq!(approved.status, ApprovalRequestStatus::Approved);

    // The backing system saw the new parameters and the marker is gone.
    let resource = svc.get_resource("main", "database", "db-1").await.unwrap();
    assert_eq!(resource.params, serde_json::json!({ "tier": "gold" }));
    assert!(resource.pending_update.is_none());
}

#[tokio::test]
async fn approval_fails_cleanly_when_the_backing_system_errors() {
    let s = scenario(false).await;
    let flows = s.h.resource_update_flows();
    let svc = s.h.resource_service(flows.clone());
    let approvals = s.h.approval_service(flows);

    let request = svc
        .request_update(
            "main",
            "database",
            "db-1",
            serde_json::json!({ "tier": "gold" }),
            String::new(),
            s.resource_owner,
        )
        .await
        .unwrap();

    s.h.handler.fail_update.store(true, Ordering::SeqCst);
    let err = approvals
        .approve(request.request_id, s.approver)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);

    // The request stays pending and so does the marker.
    let stored = approvals.get(request.request_id).await.unwrap();
    assert_eq!(stored.status, ApprovalRequestStatus::Pending);
    let resource = svc.get_resource("main", "database", "db-1").await.unwrap();
    assert!(resource.pending_update.is_some());
}

#[tokio::test]
async fn mismatched_approver_fails_validation_and_leaves_no_marker() {
    let s = scenario(false).await;
    let flows = s.h.resource_update_flows();
    let approvals = s.h.approval_service(flows);
    let wrong_group = s.h.group("bystanders").await;

    // Submitted directly with an approver group that is not the parent's.
    let request = approvals
        .submit(SubmitApprovalRequest {
            catalog_id: "main".into(),
            approval_flow_id: "resource-update".into(),
            request_user_id: s.resource_owner,
            request_comment: String::new(),
            input_params: serde_json::json!({ "tier": "gold" }),
            input_resources: vec![InputResource {
                resource_type_id: "database".into(),
                resource_id: "db-1".into(),
            }],
            approver_group_id: Some(wrong_group),
            auto_revoke_duration: None,
        })
        .await
        .unwrap();

    assert_eq!(request.status, ApprovalRequestStatus::ValidationFailed);
    let verdict = request.validation_result.unwrap();
    assert!(verdict.message.unwrap().contains("approver group"));

    let record = s
        .h
        .resources
        .get_record("main", "database", "db-1")
        .await
        .unwrap()
        .unwrap();
    assert!(record.pending_update.is_none());
}

#[tokio::test]
async fn revoking_a_resource_update_is_not_implemented() {
    let s = scenario(true).await;
    let flows = s.h.resource_update_flows();
    let svc = s.h.resource_service(flows.clone());
    let approvals = s.h.approval_service(flows);

    let request = svc
        .request_update(
            "main",
            "database",
            "db-1",
            serde_json::json!({ "tier": "gold" }),
            String::new(),
            s.resource_owner,
        )
        .await
        .unwrap();

    let err = approvals
        .revoke(request.request_id, s.resource_owner)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(err.to_string().contains("not implemented"));

    // The failed handler keeps the request pending.
    let stored = approvals.get(request.request_id).await.unwrap();
    assert_eq!(stored.status, ApprovalRequestStatus::Pending);
}

#[tokio::test]
async fn owner_and_approver_reassignment_follow_their_own_rules() {
    let s = scenario(false).await;
    let svc = s.h.resource_service(s.h.resource_update_flows());
    let new_group = s.h.group("new-owners").await;

    // Owning the resource is enough to edit it, but not to re-point its
    // owner or approver group.
    let err = svc
        .update_owner_group("main", "database", "db-1", Some(new_group), s.resource_owner)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let record = svc
        .update_owner_group("main", "database", "db-1", Some(new_group), s.catalog_owner)
        .await
        .unwrap();
    assert_eq!(record.owner_group_id, Some(new_group));

    let record = svc
        .update_approver_group_assignment(
            "main",
            "database",
            "db-1",
            Some(new_group),
            s.catalog_owner,
        )
        .await
        .unwrap();
    assert_eq!(record.approver_group_id, Some(new_group));
}

#[tokio::test]
async fn direct_update_requires_the_capability_and_edit_rights() {
    let s = scenario(false).await;
    let svc = s.h.resource_service(s.h.resource_update_flows());

    let err = svc
        .update_resource(
            "main",
            "database",
            "db-1",
            serde_json::json!({ "tier": "gold" }),
            s.outsider,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let updated = svc
        .update_resource(
            "main",
            "database",
            "db-1",
            serde_json::json!({ "tier": "gold" }),
            s.resource_owner,
        )
        .await
        .unwrap();
    assert_eq!(updated.params, serde_json::json!({ "tier": "gold" }));
    // Governance fields survive the merge.
    assert_eq!(updated.owner_group_id, Some(s.owners));
}

#[tokio::test]
async fn deletion_cascades_best_effort_over_audit_state() {
    let s = scenario(false).await;
    let svc = s.h.resource_service(s.h.resource_update_flows());
    let audit = s.h.audit_service();

    audit
        .create(
            CreateAuditNotificationInput {
                catalog_id: "main".into(),
                resource_type_id: "database".into(),
                resource_id: "db-1".into(),
                notification_type_id: "chat".into(),
                channel_properties: serde_json::json!({ "channel": "#audits" }),
                cron_expression: "0 9 * * 1".into(),
            },
            s.resource_owner,
        )
        .await
        .unwrap();
    assert_eq!(s.h.scheduler.event_count(), 1);
    assert_eq!(s.h.plugin.channel_count(), 1);

    // An unreachable scheduler must not block the deletion.
    s.h.scheduler.fail_delete.store(true, Ordering::SeqCst);
    svc.delete_resource("main", "database", "db-1", s.resource_owner)
        .await
        .unwrap();

    assert!(s.h.handler.get("database", "db-1").is_none());
    assert!(
        s.h.resources
            .get_record("main", "database", "db-1")
            .await
            .unwrap()
            .is_none()
    );
    // The channel was unset after the record went away; the scheduler
    // event survives as a logged orphan.
    assert_eq!(s.h.plugin.channel_count(), 0);
    assert_eq!(s.h.scheduler.event_count(), 1);
}

#[tokio::test]
async fn listings_merge_governance_fields_and_audit_items_pass_through() {
    let s = scenario(false).await;
    let svc = s.h.resource_service(s.h.resource_update_flows());

    let resources = svc.list_resources("main", "database").await.unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].owner_group_id, Some(s.owners));

    let items = svc
        .list_audit_items("main", "database", "db-1")
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "db-1-audit");
}
