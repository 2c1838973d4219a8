//! Store trait contracts for data access abstraction.
//!
//! All operations are async and fallible. Production implementations live
//! in `custos-db`; callers inject the instances they want (process- or
//! test-scoped) — there are no global stores.
//!
//! `get`-style operations return `Option` rather than a not-found error:
//! several workflows (resolver merging, ownership short-circuits) treat an
//! absent record as a normal answer, and the callers that do require
//! existence map `None` to their own error.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::CustosResult;
use crate::models::approval_flow::ApprovalFlowRecord;
use crate::models::approval_request::ApprovalRequest;
use crate::models::catalog::{Catalog, CatalogConfig, CreateCatalog};
use crate::models::group::{
    CreateGroup, Group, GroupMembership, GroupRole, UpdateGroup,
};
use crate::models::resource::{
    AuditNotificationBinding, PendingUpdateParams, ResourceRecord,
};
use crate::models::user::{CreateUser, UpdateUser, User};

pub trait UserStore: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = CustosResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CustosResult<Option<User>>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = CustosResult<User>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = CustosResult<()>> + Send;
    fn list(&self) -> impl Future<Output = CustosResult<Vec<User>>> + Send;
}

pub trait GroupStore: Send + Sync {
    fn create(&self, input: CreateGroup) -> impl Future<Output = CustosResult<Group>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CustosResult<Option<Group>>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateGroup,
    ) -> impl Future<Output = CustosResult<Group>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = CustosResult<()>> + Send;
    fn list(&self) -> impl Future<Output = CustosResult<Vec<Group>>> + Send;

    /// Create a membership edge. Uniqueness per (group, user) is the
    /// caller's concern; see `get_membership`.
    fn add_member(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        role: GroupRole,
    ) -> impl Future<Output = CustosResult<()>> + Send;

    fn remove_member(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = CustosResult<()>> + Send;

    fn get_membership(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = CustosResult<Option<GroupMembership>>> + Send;

    fn count_members(&self, group_id: Uuid) -> impl Future<Output = CustosResult<u64>> + Send;

    fn list_members(
        &self,
        group_id: Uuid,
    ) -> impl Future<Output = CustosResult<Vec<GroupMembership>>> + Send;
}

pub trait CatalogStore: Send + Sync {
    fn create(
        &self,
        input: CreateCatalog,
    ) -> impl Future<Output = CustosResult<Catalog>> + Send;
    fn get_by_id(
        &self,
        id: &str,
    ) -> impl Future<Output = CustosResult<Option<Catalog>>> + Send;
    fn list(&self) -> impl Future<Output = CustosResult<Vec<Catalog>>> + Send;
}

/// Source of catalog configuration (resource types, approval flows).
/// Typically backed by configuration loaded at startup.
pub trait CatalogConfigStore: Send + Sync {
    fn get_config(
        &self,
        catalog_id: &str,
    ) -> impl Future<Output = CustosResult<Option<Arc<CatalogConfig>>>> + Send;
}

pub trait ResourceStore: Send + Sync {
    /// Create or replace the governance record for a resource.
    fn save_record(
        &self,
        record: ResourceRecord,
    ) -> impl Future<Output = CustosResult<ResourceRecord>> + Send;

    fn get_record(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
    ) -> impl Future<Output = CustosResult<Option<ResourceRecord>>> + Send;

    /// Remove the governance record. Removing an absent record is a no-op.
    fn delete_record(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
    ) -> impl Future<Output = CustosResult<()>> + Send;

    fn list_records(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
    ) -> impl Future<Output = CustosResult<Vec<ResourceRecord>>> + Send;

    /// Set or clear the pending approval-gated update marker.
    fn set_pending_update(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
        pending: Option<PendingUpdateParams>,
    ) -> impl Future<Output = CustosResult<ResourceRecord>> + Send;

    /// Attach an audit-notification binding. The read and the write are
    /// not atomic; the capacity-of-one invariant is enforced by the
    /// calling workflow.
    fn add_audit_notification(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
        binding: AuditNotificationBinding,
    ) -> impl Future<Output = CustosResult<ResourceRecord>> + Send;

    /// Replace the binding with the same id.
    fn update_audit_notification(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
        binding: AuditNotificationBinding,
    ) -> impl Future<Output = CustosResult<ResourceRecord>> + Send;

    fn delete_audit_notification(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
        binding_id: Uuid,
    ) -> impl Future<Output = CustosResult<ResourceRecord>> + Send;
}

pub trait ApprovalFlowStore: Send + Sync {
    fn save(
        &self,
        record: ApprovalFlowRecord,
    ) -> impl Future<Output = CustosResult<ApprovalFlowRecord>> + Send;
    fn get(
        &self,
        catalog_id: &str,
        flow_id: &str,
    ) -> impl Future<Output = CustosResult<Option<ApprovalFlowRecord>>> + Send;
}

pub trait ApprovalRequestStore: Send + Sync {
    /// Create or update a request. Requests are never deleted.
    fn save(
        &self,
        request: ApprovalRequest,
    ) -> impl Future<Output = CustosResult<ApprovalRequest>> + Send;
    fn get_by_id(
        &self,
        request_id: Uuid,
    ) -> impl Future<Output = CustosResult<Option<ApprovalRequest>>> + Send;
    fn list_by_flow(
        &self,
        catalog_id: &str,
        flow_id: &str,
    ) -> impl Future<Output = CustosResult<Vec<ApprovalRequest>>> + Send;
    fn list_by_requester(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = CustosResult<Vec<ApprovalRequest>>> + Send;
    fn list_by_approver(
        &self,
        group_id: Uuid,
    ) -> impl Future<Output = CustosResult<Vec<ApprovalRequest>>> + Send;
}
