//! Scheduler event model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type under which periodic resource audits are scheduled.
pub const RESOURCE_AUDIT_EVENT_TYPE: &str = "resource-audit";

/// Typed payload categories carried by scheduler events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category")]
pub enum SchedulerEventProperty {
    ResourceAudit {
        catalog_id: String,
        resource_type_id: String,
        resource_id: String,
        notification_type_id: String,
        /// Channel properties serialized to a string so the payload stays
        /// flat for the scheduler backend.
        channel_properties: String,
    },
}

/// A cron-triggered event owned by the scheduler collaborator. The hub
/// only creates, reads, updates and deletes events by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerEvent {
    pub id: Uuid,
    pub event_type: String,
    pub property: SchedulerEventProperty,
    /// Cron expression.
    pub schedule_pattern: String,
}
