//! Scheduler and notification collaborator contracts.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::CustosResult;
use crate::models::notification::NotificationChannel;
use crate::models::scheduler::{SchedulerEvent, SchedulerEventProperty};

/// External cron-like event trigger. The scheduler owns its events; the
/// hub only creates, reads, updates and deletes them by id.
#[async_trait]
pub trait SchedulerProvider: Send + Sync {
    async fn create_scheduler_event(
        &self,
        event_type: &str,
        property: SchedulerEventProperty,
        schedule_pattern: &str,
    ) -> CustosResult<SchedulerEvent>;

    async fn get_scheduler_event(&self, id: Uuid) -> CustosResult<Option<SchedulerEvent>>;

    /// Replace an event wholesale, keyed by `event.id`.
    async fn update_scheduler_event(
        &self,
        event: SchedulerEvent,
    ) -> CustosResult<SchedulerEvent>;

    async fn delete_scheduler_event(&self, id: Uuid) -> CustosResult<()>;
}

/// One notification backend (chat channel, mail list, webhook, ...),
/// registered under a type id.
#[async_trait]
pub trait NotificationPlugin: Send + Sync {
    /// Register a channel for the given properties, announcing it with a
    /// human-readable message.
    async fn set_channel(
        &self,
        properties: &serde_json::Value,
        message: &str,
    ) -> CustosResult<NotificationChannel>;

    async fn unset_channel(&self, channel_id: Uuid, message: &str) -> CustosResult<()>;

    async fn send_notification(
        &self,
        message: &str,
        channel: &NotificationChannel,
    ) -> CustosResult<()>;
}
