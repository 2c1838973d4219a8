//! Permission evaluation: concurrent OR-composition of ownership checks.

use custos_core::error::{CustosError, CustosResult};
use custos_core::models::catalog::ResourceTypeConfig;
use custos_core::models::resource::ResourceInfo;
use custos_core::store::{CatalogStore, GroupStore, ResourceStore, UserStore};
use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};
use uuid::Uuid;

use crate::checks;

/// Evaluate independent boolean checks concurrently and reduce with OR.
///
/// The whole evaluation fails if any check fails; a check error is never
/// downgraded to a denial.
pub async fn any_granted(checks: Vec<BoxFuture<'_, CustosResult<bool>>>) -> CustosResult<bool> {
    let results = try_join_all(checks).await?;
    Ok(results.into_iter().any(|granted| granted))
}

/// Answers "may this user perform this action on this entity" by
/// OR-composing the ownership checks configured for the action.
#[derive(Clone)]
pub struct PermissionEvaluator<U, G, C, R> {
    users: U,
    groups: G,
    catalogs: C,
    resources: R,
}

impl<U, G, C, R> PermissionEvaluator<U, G, C, R>
where
    U: UserStore,
    G: GroupStore,
    C: CatalogStore,
    R: ResourceStore,
{
    pub fn new(users: U, groups: G, catalogs: C, resources: R) -> Self {
        Self {
            users,
            groups,
            catalogs,
            resources,
        }
    }

    /// `edit-group`: group owner or administrator.
    pub async fn check_can_edit_group(&self, group_id: Uuid, user_id: Uuid) -> CustosResult<()> {
        let granted = any_granted(vec![
            checks::is_group_owner(&self.groups, group_id, user_id).boxed(),
            checks::is_admin(&self.users, user_id).boxed(),
        ])
        .await?;

        if granted {
            Ok(())
        } else {
            Err(CustosError::forbidden(format!(
                "user {user_id} may not edit group {group_id}"
            )))
        }
    }

    /// `create-resource`: open creation, catalog ownership or parent
    /// resource ownership.
    pub async fn check_can_create_resource(
        &self,
        resource_type: &ResourceTypeConfig,
        catalog_id: &str,
        parent_resource_id: Option<&str>,
        user_id: Uuid,
    ) -> CustosResult<()> {
        if resource_type.capabilities.anyone_can_create {
            return Ok(());
        }

        let granted = any_granted(vec![
            checks::is_catalog_owner(&self.groups, &self.catalogs, catalog_id, user_id).boxed(),
            checks::is_parent_resource_owner(
                &self.groups,
                &self.resources,
                catalog_id,
                resource_type.parent_resource_type_id.as_deref(),
                parent_resource_id,
                user_id,
            )
            .boxed(),
        ])
        .await?;

        if granted {
            Ok(())
        } else {
            Err(CustosError::forbidden(format!(
                "user {user_id} may not create {} resources in catalog {catalog_id}",
                resource_type.id
            )))
        }
    }

    /// `edit-resource`: catalog ownership, resource ownership or parent
    /// resource ownership.
    pub async fn check_can_edit_resource(
        &self,
        resource: &ResourceInfo,
        user_id: Uuid,
    ) -> CustosResult<()> {
        let granted = any_granted(vec![
            checks::is_catalog_owner(&self.groups, &self.catalogs, &resource.catalog_id, user_id)
                .boxed(),
            checks::is_resource_owner(&self.groups, resource.owner_group_id, user_id).boxed(),
            checks::is_parent_resource_owner(
                &self.groups,
                &self.resources,
                &resource.catalog_id,
                resource.parent_resource_type_id.as_deref(),
                resource.parent_resource_id.as_deref(),
                user_id,
            )
            .boxed(),
        ])
        .await?;

        if granted {
            Ok(())
        } else {
            Err(CustosError::forbidden(format!(
                "user {user_id} may not edit resource {}",
                resource.id
            )))
        }
    }

    /// `update-resource-approver`: catalog ownership or parent resource
    /// ownership. Owning the resource itself is deliberately not enough —
    /// an owner must not re-point who approves their own changes.
    pub async fn check_can_update_resource_approver(
        &self,
        resource: &ResourceInfo,
        user_id: Uuid,
    ) -> CustosResult<()> {
        self.check_catalog_or_parent_owner(resource, user_id, "change the approver of")
            .await
    }

    /// `update-resource-owner`: catalog ownership or parent resource
    /// ownership.
    pub async fn check_can_update_resource_owner(
        &self,
        resource: &ResourceInfo,
        user_id: Uuid,
    ) -> CustosResult<()> {
        self.check_catalog_or_parent_owner(resource, user_id, "change the owner of")
            .await
    }

    async fn check_catalog_or_parent_owner(
        &self,
        resource: &ResourceInfo,
        user_id: Uuid,
        verb: &str,
    ) -> CustosResult<()> {
        let granted = any_granted(vec![
            checks::is_catalog_owner(&self.groups, &self.catalogs, &resource.catalog_id, user_id)
                .boxed(),
            checks::is_parent_resource_owner(
                &self.groups,
                &self.resources,
                &resource.catalog_id,
                resource.parent_resource_type_id.as_deref(),
                resource.parent_resource_id.as_deref(),
                user_id,
            )
            .boxed(),
        ])
        .await?;

        if granted {
            Ok(())
        } else {
            Err(CustosError::forbidden(format!(
                "user {user_id} may not {verb} resource {}",
                resource.id
            )))
        }
    }

    /// `approve-resource-update`: not an ownership OR. The target
    /// resource's parent must exist, carry an approver group, and that
    /// group must equal the one the request was addressed to.
    pub async fn check_can_approve_resource_update(
        &self,
        resource: &ResourceInfo,
        declared_approver_group_id: Uuid,
    ) -> CustosResult<()> {
        let (Some(parent_type), Some(parent_id)) = (
            resource.parent_resource_type_id.as_deref(),
            resource.parent_resource_id.as_deref(),
        ) else {
            return Err(CustosError::forbidden(format!(
                "resource {} has no parent to approve updates through",
                resource.id
            )));
        };

        let parent = self
            .resources
            .get_record(&resource.catalog_id, parent_type, parent_id)
            .await?
            .ok_or_else(|| {
                CustosError::forbidden(format!(
                    "parent resource {parent_id} of {} has no governance record",
                    resource.id
                ))
            })?;

        match parent.approver_group_id {
            Some(approver) if approver == declared_approver_group_id => Ok(()),
            Some(_) => Err(CustosError::forbidden(format!(
                "approver group does not match the one configured on parent resource {parent_id}"
            ))),
            None => Err(CustosError::forbidden(format!(
                "parent resource {parent_id} has no approver group configured"
            ))),
        }
    }
}
