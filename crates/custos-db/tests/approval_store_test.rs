//! Integration tests for the approval flow and approval request stores
//! using in-memory SurrealDB.

use chrono::Utc;
use custos_core::models::approval_flow::ApprovalFlowRecord;
use custos_core::models::approval_request::{
    ApprovalRequest, ApprovalRequestStatus, ApproverType, FlowValidationResult, InputResource,
};
use custos_core::store::{ApprovalFlowStore, ApprovalRequestStore};
use custos_db::store::{SurrealApprovalFlowStore, SurrealApprovalRequestStore};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

async fn setup() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    custos_db::run_migrations(&db).await.unwrap();
    db
}

fn request(flow_id: &str, requester: Uuid, approver: Uuid) -> ApprovalRequest {
    ApprovalRequest {
        request_id: Uuid::new_v4(),
        status: ApprovalRequestStatus::Pending,
        catalog_id: "main".into(),
        approval_flow_id: flow_id.into(),
        request_user_id: requester,
        request_comment: "please".into(),
        input_params: serde_json::json!({ "tier": "gold" }),
        input_resources: vec![InputResource {
            resource_type_id: "database".into(),
            resource_id: "db-1".into(),
        }],
        approver_type: ApproverType::Group,
        approver_group_id: approver,
        request_date: Utc::now(),
        validated_date: None,
        approved_date: None,
        validation_result: None,
        auto_revoke_duration: Some("PT12H".into()),
    }
}

#[tokio::test]
async fn flow_record_save_is_an_upsert() {
    let db = setup().await;
    let flows = SurrealApprovalFlowStore::new(db);

    assert!(flows.get("main", "grant-access").await.unwrap().is_none());

    let group_a = Uuid::new_v4();
    flows
        .save(ApprovalFlowRecord {
            catalog_id: "main".into(),
            flow_id: "grant-access".into(),
            approver_group_id: Some(group_a),
        })
        .await
        .unwrap();

    let fetched = flows.get("main", "grant-access").await.unwrap().unwrap();
    assert_eq!(fetched.approver_group_id, Some(group_a));

    // Saving again re-points the approver group instead of duplicating.
    let group_b = Uuid::new_v4();
    flows
        .save(ApprovalFlowRecord {
            catalog_id: "main".into(),
            flow_id: "grant-access".into(),
            approver_group_id: Some(group_b),
        })
        .await
        .unwrap();

    let fetched = flows.get("main", "grant-access").await.unwrap().unwrap();
    assert_eq!(fetched.approver_group_id, Some(group_b));
}

#[tokio::test]
async fn request_round_trip_preserves_every_field() {
    let db = setup().await;
    let requests = SurrealApprovalRequestStore::new(db);

    let requester = Uuid::new_v4();
    let approver = Uuid::new_v4();
    let saved = requests.save(request("grant-access", requester, approver)).await.unwrap();

    let fetched = requests.get_by_id(saved.request_id).await.unwrap().unwrap();
    assert_eq!(fetched.status, ApprovalRequestStatus::Pending);
    assert_eq!(fetched.catalog_id, "main");
    assert_eq!(fetched.approval_flow_id, "grant-access");
    assert_eq!(fetched.request_user_id, requester);
    assert_eq!(fetched.approver_group_id, approver);
    assert_eq!(fetched.input_params, serde_json::json!({ "tier": "gold" }));
    assert_eq!(fetched.input_resources.len(), 1);
    assert_eq!(fetched.input_resources[0].resource_id, "db-1");
    assert_eq!(fetched.auto_revoke_duration, Some("PT12H".into()));
    assert!(fetched.validated_date.is_none());
    assert!(fetched.validation_result.is_none());

    assert!(requests.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn status_transitions_are_persisted() {
    let db = setup().await;
    let requests = SurrealApprovalRequestStore::new(db);

    let mut req = requests
        .save(request("grant-access", Uuid::new_v4(), Uuid::new_v4()))
        .await
        .unwrap();

    req.validated_date = Some(Utc::now());
    req.validation_result = Some(FlowValidationResult::fail("approver mismatch"));
    req.status = ApprovalRequestStatus::ValidationFailed;
    requests.save(req.clone()).await.unwrap();

    let fetched = requests.get_by_id(req.request_id).await.unwrap().unwrap();
    assert_eq!(fetched.status, ApprovalRequestStatus::ValidationFailed);
    let result = fetched.validation_result.unwrap();
    assert!(!result.passed);
    assert_eq!(result.message.as_deref(), Some("approver mismatch"));
    assert!(fetched.validated_date.is_some());
}

#[tokio::test]
async fn list_queries_partition_requests() {
    let db = setup().await;
    let requests = SurrealApprovalRequestStore::new(db);

    let requester = Uuid::new_v4();
    let approver = Uuid::new_v4();

    requests
        .save(request("grant-access", requester, approver))
        .await
        .unwrap();
    requests
        .save(request("grant-access", Uuid::new_v4(), approver))
        .await
        .unwrap();
    requests
        .save(request("other-flow", requester, Uuid::new_v4()))
        .await
        .unwrap();

    assert_eq!(
        requests.list_by_flow("main", "grant-access").await.unwrap().len(),
        2
    );
    assert_eq!(requests.list_by_requester(requester).await.unwrap().len(), 2);
    assert_eq!(requests.list_by_approver(approver).await.unwrap().len(), 2);
    assert!(requests.list_by_flow("main", "unknown").await.unwrap().is_empty());
}
