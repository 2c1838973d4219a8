//! Group domain model and membership.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hard cap on memberships per group.
pub const MAX_GROUP_MEMBERS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupRole {
    Owner,
    Member,
}

/// A notification channel bound to a group event. Each binding is uniquely
/// identified so a group can carry several channels of the same type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupNotificationBinding {
    pub id: Uuid,
    /// Notification plugin type id, resolved through the plugin registry.
    pub type_id: String,
    pub properties: serde_json::Value,
}

/// A group of users that can own catalogs and resources and act as the
/// approver of approval requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Channels notified when a member joins the group.
    pub member_added_notifications: Vec<GroupNotificationBinding>,
    /// Channels notified when an approval request targets the group.
    pub approval_request_notifications: Vec<GroupNotificationBinding>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroup {
    pub name: String,
    pub description: String,
    pub member_added_notifications: Vec<GroupNotificationBinding>,
    pub approval_request_notifications: Vec<GroupNotificationBinding>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateGroup {
    pub name: Option<String>,
    pub description: Option<String>,
    pub member_added_notifications: Option<Vec<GroupNotificationBinding>>,
    pub approval_request_notifications: Option<Vec<GroupNotificationBinding>>,
}

/// Membership edge between a user and a group. Unique per (group, user).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMembership {
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub role: GroupRole,
}
