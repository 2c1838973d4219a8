//! Audit-notification lifecycle.
//!
//! Keeps three systems consistent for every binding: the scheduler (a
//! cron event that fires the periodic audit), the notification channel
//! (where audit results go) and the persisted resource record. Create and
//! update are sagas — forward steps ordered from least to most
//! destructive, each successful step registering a compensation. Delete
//! is deliberately best-effort: a user's intent to remove a binding must
//! not be blocked by an unreachable scheduler or notification backend.

use std::sync::Arc;

use custos_authz::{PermissionEvaluator, ResourceInfoResolver};
use custos_core::error::{CustosError, CustosResult};
use custos_core::models::notification::NotificationChannel;
use custos_core::models::resource::{AuditNotificationBinding, ResourceInfo, ResourceRecord};
use custos_core::models::scheduler::{
    RESOURCE_AUDIT_EVENT_TYPE, SchedulerEvent, SchedulerEventProperty,
};
use custos_core::models::user::User;
use custos_core::plugin::{NotificationPlugin, SchedulerProvider};
use custos_core::registry::{NotificationPluginRegistry, ResourceTypeHandlerRegistry};
use custos_core::store::{CatalogStore, GroupStore, ResourceStore, UserStore};
use futures::future::join_all;
use tracing::{info, warn};
use uuid::Uuid;

use crate::saga::CompensationStack;

#[derive(Debug, Clone)]
pub struct CreateAuditNotificationInput {
    pub catalog_id: String,
    pub resource_type_id: String,
    pub resource_id: String,
    pub notification_type_id: String,
    pub channel_properties: serde_json::Value,
    pub cron_expression: String,
}

#[derive(Debug, Clone)]
pub struct UpdateAuditNotificationInput {
    pub binding_id: Uuid,
    pub catalog_id: String,
    pub resource_type_id: String,
    pub resource_id: String,
    pub notification_type_id: String,
    pub channel_properties: serde_json::Value,
    pub cron_expression: String,
}

pub struct AuditNotificationService<U, G, C, R> {
    evaluator: PermissionEvaluator<U, G, C, R>,
    resolver: ResourceInfoResolver<R>,
    users: U,
    resources: R,
    handlers: Arc<ResourceTypeHandlerRegistry>,
    plugins: Arc<NotificationPluginRegistry>,
    scheduler: Arc<dyn SchedulerProvider>,
}

impl<U, G, C, R> AuditNotificationService<U, G, C, R>
where
    U: UserStore,
    G: GroupStore,
    C: CatalogStore,
    R: ResourceStore,
{
    pub fn new(
        evaluator: PermissionEvaluator<U, G, C, R>,
        resolver: ResourceInfoResolver<R>,
        users: U,
        resources: R,
        handlers: Arc<ResourceTypeHandlerRegistry>,
        plugins: Arc<NotificationPluginRegistry>,
        scheduler: Arc<dyn SchedulerProvider>,
    ) -> Self {
        Self {
            evaluator,
            resolver,
            users,
            resources,
            handlers,
            plugins,
            scheduler,
        }
    }

    /// Create the audit-notification binding for a resource.
    pub async fn create(
        &self,
        input: CreateAuditNotificationInput,
        user_id: Uuid,
    ) -> CustosResult<ResourceRecord> {
        // 1. Authorize and check the capacity-of-one invariant. The check
        //    and the final write are not atomic; see the service docs.
        let resource = self
            .resolve_resource(&input.catalog_id, &input.resource_type_id, &input.resource_id)
            .await?;
        self.evaluator
            .check_can_edit_resource(&resource, user_id)
            .await?;
        if !resource.audit_notifications.is_empty() {
            return Err(CustosError::bad_request(format!(
                "resource '{}' already has an audit notification",
                resource.id
            )));
        }

        // 2. Resolve the collaborators named by the request.
        let (plugin, user) = self
            .plugin_and_user(&input.notification_type_id, user_id)
            .await?;

        let mut saga = CompensationStack::new();

        // 3. Scheduler event first: it is the cheapest to undo. On
        //    failure there is nothing to roll back yet.
        let property = resource_audit_property(&input, &resource)?;
        let event = self
            .scheduler
            .create_scheduler_event(RESOURCE_AUDIT_EVENT_TYPE, property, &input.cron_expression)
            .await?;
        {
            let scheduler = self.scheduler.clone();
            let event_id = event.id;
            saga.push("delete scheduler event", move || async move {
                scheduler.delete_scheduler_event(event_id).await
            });
        }

        // 4. Register the notification channel.
        let message = format!(
            "Audit notifications for resource '{}' enabled by {}",
            resource.name, user.name
        );
        let channel = saga
            .run(
                "Failed to set notification channel",
                plugin.set_channel(&input.channel_properties, &message),
            )
            .await?;
        {
            let plugin = plugin.clone();
            let channel_id = channel.id;
            let message = format!(
                "Audit notification setup for resource '{}' was rolled back",
                resource.name
            );
            saga.push("unset notification channel", move || async move {
                plugin.unset_channel(channel_id, &message).await
            });
        }

        // 5. Persist the binding on the resource record.
        let binding = AuditNotificationBinding {
            id: Uuid::new_v4(),
            channel,
            scheduler_event_id: event.id,
            cron_expression: input.cron_expression.clone(),
        };
        let record = saga
            .run(
                "Failed to persist audit notification",
                self.resources.add_audit_notification(
                    &input.catalog_id,
                    &input.resource_type_id,
                    &input.resource_id,
                    binding,
                ),
            )
            .await?;

        info!(
            resource_id = %input.resource_id,
            scheduler_event = %event.id,
            "audit notification created"
        );
        Ok(record)
    }

    /// Replace the binding's schedule and channel. The prior scheduler
    /// event is fetched first so a later failure can restore it instead
    /// of deleting it.
    pub async fn update(
        &self,
        input: UpdateAuditNotificationInput,
        user_id: Uuid,
    ) -> CustosResult<ResourceRecord> {
        // 1. Authorize and locate the binding being replaced.
        let resource = self
            .resolve_resource(&input.catalog_id, &input.resource_type_id, &input.resource_id)
            .await?;
        self.evaluator
            .check_can_edit_resource(&resource, user_id)
            .await?;
        let existing = resource
            .audit_notifications
            .iter()
            .find(|binding| binding.id == input.binding_id)
            .ok_or_else(|| CustosError::not_found("audit notification", input.binding_id))?
            .clone();

        // 2. Resolve the collaborators named by the request.
        let (plugin, user) = self
            .plugin_and_user(&input.notification_type_id, user_id)
            .await?;

        let mut saga = CompensationStack::new();

        // 3. Replace the scheduler event, keeping the prior value as the
        //    rollback target.
        let prior = self
            .scheduler
            .get_scheduler_event(existing.scheduler_event_id)
            .await?
            .ok_or_else(|| {
                CustosError::internal(format!(
                    "scheduler event {} backing the audit notification is missing",
                    existing.scheduler_event_id
                ))
            })?;

        let create_input = CreateAuditNotificationInput {
            catalog_id: input.catalog_id.clone(),
            resource_type_id: input.resource_type_id.clone(),
            resource_id: input.resource_id.clone(),
            notification_type_id: input.notification_type_id.clone(),
            channel_properties: input.channel_properties.clone(),
            cron_expression: input.cron_expression.clone(),
        };
        let replacement = SchedulerEvent {
            id: prior.id,
            event_type: prior.event_type.clone(),
            property: resource_audit_property(&create_input, &resource)?,
            schedule_pattern: input.cron_expression.clone(),
        };
        let event = self.scheduler.update_scheduler_event(replacement).await?;
        {
            let scheduler = self.scheduler.clone();
            let prior = prior.clone();
            saga.push("restore prior scheduler event", move || async move {
                scheduler.update_scheduler_event(prior).await.map(|_| ())
            });
        }

        // 4. Re-register the notification channel.
        let message = format!(
            "Audit notifications for resource '{}' updated by {}",
            resource.name, user.name
        );
        let channel = saga
            .run(
                "Failed to set notification channel",
                plugin.set_channel(&input.channel_properties, &message),
            )
            .await?;
        {
            let plugin = plugin.clone();
            let channel_id = channel.id;
            let message = format!(
                "Audit notification update for resource '{}' was rolled back",
                resource.name
            );
            saga.push("unset notification channel", move || async move {
                plugin.unset_channel(channel_id, &message).await
            });
        }

        // 5. Persist the replaced binding.
        let binding = AuditNotificationBinding {
            id: existing.id,
            channel,
            scheduler_event_id: event.id,
            cron_expression: input.cron_expression.clone(),
        };
        let record = saga
            .run(
                "Failed to persist audit notification",
                self.resources.update_audit_notification(
                    &input.catalog_id,
                    &input.resource_type_id,
                    &input.resource_id,
                    binding,
                ),
            )
            .await?;

        info!(
            resource_id = %input.resource_id,
            scheduler_event = %event.id,
            "audit notification updated"
        );
        Ok(record)
    }

    /// Remove a binding. Scheduler and channel cleanup are best-effort;
    /// only the persisted-record removal is a hard failure point.
    pub async fn delete(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
        binding_id: Uuid,
        user_id: Uuid,
    ) -> CustosResult<ResourceRecord> {
        let resource = self
            .resolve_resource(catalog_id, resource_type_id, resource_id)
            .await?;
        self.evaluator
            .check_can_edit_resource(&resource, user_id)
            .await?;
        let binding = resource
            .audit_notifications
            .iter()
            .find(|binding| binding.id == binding_id)
            .ok_or_else(|| CustosError::not_found("audit notification", binding_id))?
            .clone();

        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| CustosError::bad_request(format!("user {user_id} does not exist")))?;

        self.delete_scheduler_event_best_effort(binding.scheduler_event_id)
            .await;

        let message = format!(
            "Audit notifications for resource '{}' disabled by {}",
            resource.name, user.name
        );
        self.unset_channel_best_effort(&binding.channel, &message)
            .await;

        let record = self
            .resources
            .delete_audit_notification(catalog_id, resource_type_id, resource_id, binding_id)
            .await?;

        info!(resource_id = %resource_id, binding = %binding_id, "audit notification deleted");
        Ok(record)
    }

    /// Best-effort removal of every audit scheduler event of a resource.
    /// Used by resource deletion before the type handler runs. Every
    /// event is attempted independently; failures are logged one by one
    /// and never propagate.
    pub async fn delete_scheduler_events_for(&self, resource: &ResourceInfo) {
        let deletes = resource
            .audit_notifications
            .iter()
            .map(|binding| self.delete_scheduler_event_best_effort(binding.scheduler_event_id));
        join_all(deletes).await;
    }

    /// Best-effort unset of every audit channel of a resource. Used by
    /// resource deletion after the record is gone.
    pub async fn unset_channels_for(&self, resource: &ResourceInfo, message: &str) {
        let unsets = resource
            .audit_notifications
            .iter()
            .map(|binding| self.unset_channel_best_effort(&binding.channel, message));
        join_all(unsets).await;
    }

    async fn delete_scheduler_event_best_effort(&self, event_id: Uuid) {
        match self.scheduler.get_scheduler_event(event_id).await {
            Ok(Some(event)) => {
                if let Err(e) = self.scheduler.delete_scheduler_event(event.id).await {
                    warn!(%event_id, error = %e, "failed to delete audit scheduler event, continuing");
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(%event_id, error = %e, "failed to look up audit scheduler event, continuing");
            }
        }
    }

    async fn unset_channel_best_effort(&self, channel: &NotificationChannel, message: &str) {
        let Some(plugin) = self.plugins.get(&channel.type_id) else {
            warn!(
                channel = %channel.id,
                type_id = %channel.type_id,
                "no notification plugin registered, skipping channel unset"
            );
            return;
        };
        if let Err(e) = plugin.unset_channel(channel.id, message).await {
            warn!(channel = %channel.id, error = %e, "failed to unset notification channel, continuing");
        }
    }

    async fn resolve_resource(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
    ) -> CustosResult<ResourceInfo> {
        let handler = self.handlers.require(resource_type_id)?;
        self.resolver
            .resolve(handler.as_ref(), catalog_id, resource_type_id, resource_id)
            .await?
            .ok_or_else(|| CustosError::not_found("resource", resource_id))
    }

    async fn plugin_and_user(
        &self,
        notification_type_id: &str,
        user_id: Uuid,
    ) -> CustosResult<(Arc<dyn NotificationPlugin>, User)> {
        let plugin = self.plugins.get(notification_type_id).ok_or_else(|| {
            CustosError::bad_request(format!(
                "unknown notification type '{notification_type_id}'"
            ))
        })?;
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| CustosError::bad_request(format!("user {user_id} does not exist")))?;
        Ok((plugin, user))
    }
}

fn resource_audit_property(
    input: &CreateAuditNotificationInput,
    resource: &ResourceInfo,
) -> CustosResult<SchedulerEventProperty> {
    let channel_properties = serde_json::to_string(&input.channel_properties)
        .map_err(|e| CustosError::internal(format!("channel properties: {e}")))?;
    Ok(SchedulerEventProperty::ResourceAudit {
        catalog_id: input.catalog_id.clone(),
        resource_type_id: input.resource_type_id.clone(),
        resource_id: resource.id.clone(),
        notification_type_id: input.notification_type_id.clone(),
        channel_properties,
    })
}
