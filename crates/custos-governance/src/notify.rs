//! Best-effort notification dispatch helpers.
//!
//! Dispatch never fails the calling workflow: a plugin lookup miss or a
//! send failure is logged and absorbed. The persisted state the workflow
//! produced remains the source of truth either way.

use custos_core::models::approval_request::ApprovalRequest;
use custos_core::models::group::{Group, GroupNotificationBinding};
use custos_core::models::notification::NotificationChannel;
use custos_core::models::user::User;
use custos_core::registry::NotificationPluginRegistry;
use custos_core::store::GroupStore;
use futures::future::join_all;
use tracing::warn;
use uuid::Uuid;

/// Notify every approval-request channel of the approver group. Each
/// channel is dispatched independently and concurrently.
pub async fn send_approval_request_notifications<G: GroupStore>(
    groups: &G,
    plugins: &NotificationPluginRegistry,
    approver_group_id: Uuid,
    request: &ApprovalRequest,
) {
    let group = match groups.get_by_id(approver_group_id).await {
        Ok(Some(group)) => group,
        Ok(None) => {
            warn!(%approver_group_id, "approver group not found, skipping notifications");
            return;
        }
        Err(e) => {
            warn!(%approver_group_id, error = %e, "failed to load approver group, skipping notifications");
            return;
        }
    };

    let message = format!(
        "Approval request {} for flow '{}' is waiting for review",
        request.request_id, request.approval_flow_id
    );
    dispatch(plugins, &group.approval_request_notifications, &message).await;
}

/// Notify every member-added channel of the group.
pub async fn send_member_added_notifications(
    plugins: &NotificationPluginRegistry,
    group: &Group,
    member: &User,
) {
    let message = format!("{} joined group {}", member.name, group.name);
    dispatch(plugins, &group.member_added_notifications, &message).await;
}

async fn dispatch(
    plugins: &NotificationPluginRegistry,
    bindings: &[GroupNotificationBinding],
    message: &str,
) {
    let sends = bindings.iter().map(|binding| async move {
        let Some(plugin) = plugins.get(&binding.type_id) else {
            warn!(
                channel = %binding.id,
                type_id = %binding.type_id,
                "no notification plugin registered, skipping channel"
            );
            return;
        };
        let channel = NotificationChannel {
            id: binding.id,
            type_id: binding.type_id.clone(),
            properties: binding.properties.clone(),
        };
        if let Err(e) = plugin.send_notification(message, &channel).await {
            warn!(channel = %binding.id, error = %e, "notification dispatch failed");
        }
    });

    join_all(sends).await;
}
