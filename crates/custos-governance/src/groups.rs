//! Group administration: CRUD and membership management.

use std::sync::Arc;

use custos_authz::PermissionEvaluator;
use custos_core::error::{CustosError, CustosResult};
use custos_core::models::group::{
    CreateGroup, Group, GroupMembership, GroupRole, MAX_GROUP_MEMBERS, UpdateGroup,
};
use custos_core::registry::NotificationPluginRegistry;
use custos_core::store::{CatalogStore, GroupStore, ResourceStore, UserStore};
use tracing::info;
use uuid::Uuid;

use crate::notify;

pub struct GroupService<U, G, C, R> {
    evaluator: PermissionEvaluator<U, G, C, R>,
    users: U,
    groups: G,
    plugins: Arc<NotificationPluginRegistry>,
}

impl<U, G, C, R> GroupService<U, G, C, R>
where
    U: UserStore,
    G: GroupStore,
    C: CatalogStore,
    R: ResourceStore,
{
    pub fn new(
        evaluator: PermissionEvaluator<U, G, C, R>,
        users: U,
        groups: G,
        plugins: Arc<NotificationPluginRegistry>,
    ) -> Self {
        Self {
            evaluator,
            users,
            groups,
            plugins,
        }
    }

    /// Create a group. The creator becomes its sole Owner member.
    pub async fn create_group(&self, input: CreateGroup, creator: Uuid) -> CustosResult<Group> {
        self.users
            .get_by_id(creator)
            .await?
            .ok_or_else(|| CustosError::bad_request(format!("user {creator} does not exist")))?;

        let group = self.groups.create(input).await?;
        self.groups
            .add_member(group.id, creator, GroupRole::Owner)
            .await?;

        info!(group_id = %group.id, %creator, "group created");
        Ok(group)
    }

    pub async fn get_group(&self, group_id: Uuid) -> CustosResult<Group> {
        self.groups
            .get_by_id(group_id)
            .await?
            .ok_or_else(|| CustosError::not_found("group", group_id))
    }

    pub async fn list_groups(&self) -> CustosResult<Vec<Group>> {
        self.groups.list().await
    }

    pub async fn update_group(
        &self,
        group_id: Uuid,
        input: UpdateGroup,
        user_id: Uuid,
    ) -> CustosResult<Group> {
        self.evaluator.check_can_edit_group(group_id, user_id).await?;
        self.groups.update(group_id, input).await
    }

    /// Delete a group. Only allowed while the group has at most one
    /// membership, so nobody silently loses access.
    pub async fn delete_group(&self, group_id: Uuid, user_id: Uuid) -> CustosResult<()> {
        self.evaluator.check_can_edit_group(group_id, user_id).await?;

        let members = self.groups.count_members(group_id).await?;
        if members > 1 {
            return Err(CustosError::bad_request(format!(
                "group {group_id} still has {members} members; remove them first"
            )));
        }

        self.groups.delete(group_id).await?;
        info!(%group_id, "group deleted");
        Ok(())
    }

    /// Add a member. Rejected when the user is already a member or the
    /// group is at the membership cap.
    pub async fn add_member(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        role: GroupRole,
        acting_user: Uuid,
    ) -> CustosResult<()> {
        self.evaluator
            .check_can_edit_group(group_id, acting_user)
            .await?;

        let group = self
            .groups
            .get_by_id(group_id)
            .await?
            .ok_or_else(|| CustosError::not_found("group", group_id))?;
        let member = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| CustosError::bad_request(format!("user {user_id} does not exist")))?;

        if self.groups.get_membership(group_id, user_id).await?.is_some() {
            return Err(CustosError::bad_request(format!(
                "user {user_id} is already a member of group {group_id}"
            )));
        }

        let members = self.groups.count_members(group_id).await?;
        if members >= MAX_GROUP_MEMBERS {
            return Err(CustosError::bad_request(format!(
                "group {group_id} has reached the membership limit of {MAX_GROUP_MEMBERS}"
            )));
        }

        self.groups.add_member(group_id, user_id, role).await?;
        info!(%group_id, %user_id, "member added");

        // Best-effort; membership is already persisted.
        notify::send_member_added_notifications(&self.plugins, &group, &member).await;
        Ok(())
    }

    pub async fn remove_member(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        acting_user: Uuid,
    ) -> CustosResult<()> {
        self.evaluator
            .check_can_edit_group(group_id, acting_user)
            .await?;
        self.groups.remove_member(group_id, user_id).await?;
        info!(%group_id, %user_id, "member removed");
        Ok(())
    }

    pub async fn list_members(&self, group_id: Uuid) -> CustosResult<Vec<GroupMembership>> {
        self.groups.list_members(group_id).await
    }
}
