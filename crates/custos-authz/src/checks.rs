//! Ownership predicates.
//!
//! Each predicate answers one independent question about a user and an
//! entity. A missing optional link short-circuits to `false` without a
//! lookup; store failures propagate — they are never treated as "false".

use custos_core::error::CustosResult;
use custos_core::models::group::GroupRole;
use custos_core::store::{CatalogStore, GroupStore, ResourceStore, UserStore};
use uuid::Uuid;

/// The user carries the administrator role.
pub async fn is_admin<U: UserStore>(users: &U, user_id: Uuid) -> CustosResult<bool> {
    Ok(users
        .get_by_id(user_id)
        .await?
        .map(|user| user.is_admin())
        .unwrap_or(false))
}

/// A membership with role Owner exists for (group, user).
pub async fn is_group_owner<G: GroupStore>(
    groups: &G,
    group_id: Uuid,
    user_id: Uuid,
) -> CustosResult<bool> {
    Ok(groups
        .get_membership(group_id, user_id)
        .await?
        .map(|membership| membership.role == GroupRole::Owner)
        .unwrap_or(false))
}

/// A membership with any role exists for (group, user).
pub async fn is_group_member<G: GroupStore>(
    groups: &G,
    group_id: Uuid,
    user_id: Uuid,
) -> CustosResult<bool> {
    Ok(groups.get_membership(group_id, user_id).await?.is_some())
}

/// The catalog has an owner group and the user is in it.
pub async fn is_catalog_owner<G: GroupStore, C: CatalogStore>(
    groups: &G,
    catalogs: &C,
    catalog_id: &str,
    user_id: Uuid,
) -> CustosResult<bool> {
    let Some(catalog) = catalogs.get_by_id(catalog_id).await? else {
        return Ok(false);
    };
    let Some(owner_group_id) = catalog.owner_group_id else {
        return Ok(false);
    };
    is_group_member(groups, owner_group_id, user_id).await
}

/// The resource has an owner group and the user is in it.
pub async fn is_resource_owner<G: GroupStore>(
    groups: &G,
    owner_group_id: Option<Uuid>,
    user_id: Uuid,
) -> CustosResult<bool> {
    match owner_group_id {
        Some(group_id) => is_group_member(groups, group_id, user_id).await,
        None => Ok(false),
    }
}

/// The resource links to a parent (both type and id present), the parent
/// record exists with an owner group, and the user is in it.
pub async fn is_parent_resource_owner<G: GroupStore, R: ResourceStore>(
    groups: &G,
    resources: &R,
    catalog_id: &str,
    parent_resource_type_id: Option<&str>,
    parent_resource_id: Option<&str>,
    user_id: Uuid,
) -> CustosResult<bool> {
    let (Some(parent_type), Some(parent_id)) = (parent_resource_type_id, parent_resource_id)
    else {
        return Ok(false);
    };
    let Some(parent) = resources
        .get_record(catalog_id, parent_type, parent_id)
        .await?
    else {
        return Ok(false);
    };
    is_resource_owner(groups, parent.owner_group_id, user_id).await
}
