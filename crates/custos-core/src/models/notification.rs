//! Notification channel model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered notification channel, as returned by a notification
/// plugin's `set_channel`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationChannel {
    pub id: Uuid,
    /// Notification plugin type id the channel belongs to.
    pub type_id: String,
    pub properties: serde_json::Value,
}
