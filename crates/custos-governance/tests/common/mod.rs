//! Shared test fixtures: fake collaborators with failure injection and a
//! wiring harness over in-memory SurrealDB.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use custos_authz::{PermissionEvaluator, ResourceInfoResolver};
use custos_core::error::{CustosError, CustosResult};
use custos_core::flow::ApprovalFlowHandler;
use custos_core::handler::ResourceTypeHandler;
use custos_core::models::approval_flow::{
    ApprovalFlowConfig, ApproverPolicy, AutoRevokePolicy, AutoRevokeSettings,
};
use custos_core::models::catalog::{
    CatalogConfig, CreateCatalog, ResourceTypeCapabilities, ResourceTypeConfig,
    UpdateApproverPolicy,
};
use custos_core::models::group::{CreateGroup, GroupNotificationBinding, GroupRole};
use custos_core::models::notification::NotificationChannel;
use custos_core::models::resource::{
    AuditNotificationBinding, HandlerResource, PendingUpdateParams, ResourceAuditItem,
    ResourceRecord,
};
use custos_core::models::scheduler::{SchedulerEvent, SchedulerEventProperty};
use custos_core::models::user::CreateUser;
use custos_core::plugin::{NotificationPlugin, SchedulerProvider};
use custos_core::registry::{
    ApprovalFlowHandlerRegistry, NotificationPluginRegistry, ResourceTypeHandlerRegistry,
};
use custos_core::store::{CatalogStore, GroupStore, ResourceStore, UserStore};
use custos_db::store::{
    SurrealApprovalFlowStore, SurrealApprovalRequestStore, SurrealCatalogStore,
    SurrealGroupStore, SurrealResourceStore, SurrealUserStore,
};
use custos_governance::flows::{RESOURCE_UPDATE_FLOW_ID, ResourceUpdateFlow};
use custos_governance::{
    ApprovalRequestService, AuditNotificationService, GroupService, ResourceService,
    StaticCatalogConfigStore,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

pub type Users = SurrealUserStore<Db>;
pub type Groups = SurrealGroupStore<Db>;
pub type Catalogs = SurrealCatalogStore<Db>;
pub type Resources = SurrealResourceStore<Db>;
pub type FlowStore = SurrealApprovalFlowStore<Db>;
pub type Requests = SurrealApprovalRequestStore<Db>;

pub type Evaluator = PermissionEvaluator<Users, Groups, Catalogs, Resources>;
pub type ApprovalSvc =
    ApprovalRequestService<Groups, StaticCatalogConfigStore, FlowStore, Requests, Resources>;
pub type AuditSvc = AuditNotificationService<Users, Groups, Catalogs, Resources>;
pub type ResourceSvc = ResourceService<
    Users,
    Groups,
    Catalogs,
    StaticCatalogConfigStore,
    FlowStore,
    Requests,
    Resources,
>;
pub type GroupSvc = GroupService<Users, Groups, Catalogs, Resources>;

// -----------------------------------------------------------------------
// Fake collaborators
// -----------------------------------------------------------------------

/// Resource-type handler backed by a map, standing in for a backing
/// system. Keyed by (resource type, resource id).
#[derive(Default)]
pub struct TestResourceHandler {
    resources: Mutex<HashMap<(String, String), HandlerResource>>,
    pub fail_update: AtomicBool,
}

impl TestResourceHandler {
    pub fn seed(&self, resource_type_id: &str, resource: HandlerResource) {
        self.resources
            .lock()
            .unwrap()
            .insert((resource_type_id.into(), resource.id.clone()), resource);
    }

    pub fn get(&self, resource_type_id: &str, resource_id: &str) -> Option<HandlerResource> {
        self.resources
            .lock()
            .unwrap()
            .get(&(resource_type_id.into(), resource_id.into()))
            .cloned()
    }
}

#[async_trait]
impl ResourceTypeHandler for TestResourceHandler {
    async fn create_resource(
        &self,
        _catalog_id: &str,
        resource_type_id: &str,
        name: &str,
        params: &serde_json::Value,
    ) -> CustosResult<HandlerResource> {
        let resource = HandlerResource {
            id: name.to_string(),
            name: name.to_string(),
            params: params.clone(),
            parent_resource_id: None,
        };
        self.seed(resource_type_id, resource.clone());
        Ok(resource)
    }

    async fn get_resource(
        &self,
        _catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
    ) -> CustosResult<Option<HandlerResource>> {
        Ok(self.get(resource_type_id, resource_id))
    }

    async fn update_resource(
        &self,
        _catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
        params: &serde_json::Value,
    ) -> CustosResult<HandlerResource> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(CustosError::internal("backing system update failed"));
        }
        let mut resources = self.resources.lock().unwrap();
        let resource = resources
            .get_mut(&(resource_type_id.into(), resource_id.into()))
            .ok_or_else(|| CustosError::not_found("resource", resource_id))?;
        resource.params = params.clone();
        Ok(resource.clone())
    }

    async fn delete_resource(
        &self,
        _catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
    ) -> CustosResult<()> {
        self.resources
            .lock()
            .unwrap()
            .remove(&(resource_type_id.into(), resource_id.into()));
        Ok(())
    }

    async fn list_resources(
        &self,
        _catalog_id: &str,
        resource_type_id: &str,
    ) -> CustosResult<Vec<HandlerResource>> {
        Ok(self
            .resources
            .lock()
            .unwrap()
            .iter()
            .filter(|((rt, _), _)| rt == resource_type_id)
            .map(|(_, resource)| resource.clone())
            .collect())
    }

    async fn list_resource_audit_items(
        &self,
        _catalog_id: &str,
        _resource_type_id: &str,
        resource_id: &str,
    ) -> CustosResult<Vec<ResourceAuditItem>> {
        Ok(vec![ResourceAuditItem {
            id: format!("{resource_id}-audit"),
            name: "last access review".into(),
            detail: serde_json::json!({}),
        }])
    }
}

/// Scheduler fake with per-operation failure injection.
#[derive(Default)]
pub struct FakeScheduler {
    pub events: Mutex<HashMap<Uuid, SchedulerEvent>>,
    pub fail_create: AtomicBool,
    pub fail_update: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl FakeScheduler {
    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn single_event(&self) -> SchedulerEvent {
        let events = self.events.lock().unwrap();
        assert_eq!(events.len(), 1, "expected exactly one scheduler event");
        events.values().next().unwrap().clone()
    }
}

#[async_trait]
impl SchedulerProvider for FakeScheduler {
    async fn create_scheduler_event(
        &self,
        event_type: &str,
        property: SchedulerEventProperty,
        schedule_pattern: &str,
    ) -> CustosResult<SchedulerEvent> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(CustosError::internal("scheduler unavailable"));
        }
        let event = SchedulerEvent {
            id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            property,
            schedule_pattern: schedule_pattern.to_string(),
        };
        self.events.lock().unwrap().insert(event.id, event.clone());
        Ok(event)
    }

    async fn get_scheduler_event(&self, id: Uuid) -> CustosResult<Option<SchedulerEvent>> {
        Ok(self.events.lock().unwrap().get(&id).cloned())
    }

    async fn update_scheduler_event(&self, event: SchedulerEvent) -> CustosResult<SchedulerEvent> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(CustosError::internal("scheduler unavailable"));
        }
        self.events.lock().unwrap().insert(event.id, event.clone());
        Ok(event)
    }

    async fn delete_scheduler_event(&self, id: Uuid) -> CustosResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(CustosError::internal("scheduler unavailable"));
        }
        self.events.lock().unwrap().remove(&id);
        Ok(())
    }
}

/// Notification plugin fake recording channels and sent messages.
pub struct RecordingPlugin {
    type_id: String,
    pub channels: Mutex<HashMap<Uuid, serde_json::Value>>,
    pub sent: Mutex<Vec<String>>,
    pub fail_set_channel: AtomicBool,
    pub fail_send: AtomicBool,
}

impl RecordingPlugin {
    pub fn new(type_id: &str) -> Self {
        Self {
            type_id: type_id.into(),
            channels: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            fail_set_channel: AtomicBool::new(false),
            fail_send: AtomicBool::new(false),
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.lock().unwrap().len()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationPlugin for RecordingPlugin {
    async fn set_channel(
        &self,
        properties: &serde_json::Value,
        _message: &str,
    ) -> CustosResult<NotificationChannel> {
        if self.fail_set_channel.load(Ordering::SeqCst) {
            return Err(CustosError::internal("notification backend unavailable"));
        }
        let channel = NotificationChannel {
            id: Uuid::new_v4(),
            type_id: self.type_id.clone(),
            properties: properties.clone(),
        };
        self.channels
            .lock()
            .unwrap()
            .insert(channel.id, properties.clone());
        Ok(channel)
    }

    async fn unset_channel(&self, channel_id: Uuid, _message: &str) -> CustosResult<()> {
        self.channels.lock().unwrap().remove(&channel_id);
        Ok(())
    }

    async fn send_notification(
        &self,
        message: &str,
        _channel: &NotificationChannel,
    ) -> CustosResult<()> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(CustosError::internal("notification backend unavailable"));
        }
        self.sent.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Resource-store decorator that fails selected write operations, for
/// exercising the saga's rollback paths against a real store underneath.
#[derive(Clone)]
pub struct FailingResourceStore {
    inner: Resources,
    pub fail_add_audit: Arc<AtomicBool>,
    pub fail_update_audit: Arc<AtomicBool>,
}

impl FailingResourceStore {
    pub fn new(inner: Resources) -> Self {
        Self {
            inner,
            fail_add_audit: Arc::new(AtomicBool::new(false)),
            fail_update_audit: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl ResourceStore for FailingResourceStore {
    async fn save_record(&self, record: ResourceRecord) -> CustosResult<ResourceRecord> {
        self.inner.save_record(record).await
    }

    async fn get_record(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
    ) -> CustosResult<Option<ResourceRecord>> {
        self.inner
            .get_record(catalog_id, resource_type_id, resource_id)
            .await
    }

    async fn delete_record(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
    ) -> CustosResult<()> {
        self.inner
            .delete_record(catalog_id, resource_type_id, resource_id)
            .await
    }

    async fn list_records(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
    ) -> CustosResult<Vec<ResourceRecord>> {
        self.inner.list_records(catalog_id, resource_type_id).await
    }

    async fn set_pending_update(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
        pending: Option<PendingUpdateParams>,
    ) -> CustosResult<ResourceRecord> {
        self.inner
            .set_pending_update(catalog_id, resource_type_id, resource_id, pending)
            .await
    }

    async fn add_audit_notification(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
        binding: AuditNotificationBinding,
    ) -> CustosResult<ResourceRecord> {
        if self.fail_add_audit.load(Ordering::SeqCst) {
            return Err(CustosError::Database("resource record write failed".into()));
        }
        self.inner
            .add_audit_notification(catalog_id, resource_type_id, resource_id, binding)
            .await
    }

    async fn update_audit_notification(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
        binding: AuditNotificationBinding,
    ) -> CustosResult<ResourceRecord> {
        if self.fail_update_audit.load(Ordering::SeqCst) {
            return Err(CustosError::Database("resource record write failed".into()));
        }
        self.inner
            .update_audit_notification(catalog_id, resource_type_id, resource_id, binding)
            .await
    }

    async fn delete_audit_notification(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
        binding_id: Uuid,
    ) -> CustosResult<ResourceRecord> {
        self.inner
            .delete_audit_notification(catalog_id, resource_type_id, resource_id, binding_id)
            .await
    }
}

// -----------------------------------------------------------------------
// Catalog configuration fixtures
// -----------------------------------------------------------------------

pub fn system_type() -> ResourceTypeConfig {
    ResourceTypeConfig {
        id: "system".into(),
        capabilities: ResourceTypeCapabilities {
            is_creatable: true,
            is_updatable: true,
            is_deletable: true,
            owner_management: true,
            approver_management: true,
            anyone_can_create: false,
        },
        parent_resource_type_id: None,
        update_approver: None,
    }
}

pub fn database_type() -> ResourceTypeConfig {
    ResourceTypeConfig {
        id: "database".into(),
        capabilities: ResourceTypeCapabilities {
            is_creatable: true,
            is_updatable: true,
            is_deletable: true,
            owner_management: true,
            approver_management: true,
            anyone_can_create: false,
        },
        parent_resource_type_id: Some("system".into()),
        update_approver: Some(UpdateApproverPolicy::ParentResource),
    }
}

pub fn resource_update_flow(enable_revoke: bool) -> ApprovalFlowConfig {
    ApprovalFlowConfig {
        id: RESOURCE_UPDATE_FLOW_ID.into(),
        input_schema: None,
        approver: ApproverPolicy::RequestSpecified,
        auto_revoke: None,
        enable_revoke,
    }
}

pub fn simple_flow(id: &str, approver: ApproverPolicy, enable_revoke: bool) -> ApprovalFlowConfig {
    ApprovalFlowConfig {
        id: id.into(),
        input_schema: None,
        approver,
        auto_revoke: None,
        enable_revoke,
    }
}

pub fn auto_revoke_flow(id: &str, max_duration: &str, required: bool) -> ApprovalFlowConfig {
    ApprovalFlowConfig {
        id: id.into(),
        input_schema: None,
        approver: ApproverPolicy::RequestSpecified,
        auto_revoke: Some(AutoRevokePolicy {
            enabled: true,
            default_settings: AutoRevokeSettings {
                required,
                max_duration: max_duration.into(),
            },
        }),
        enable_revoke: false,
    }
}

pub fn main_catalog(flows: Vec<ApprovalFlowConfig>) -> CatalogConfig {
    CatalogConfig {
        id: "main".into(),
        resource_types: vec![system_type(), database_type()],
        approval_flows: flows,
    }
}

// -----------------------------------------------------------------------
// Harness
// -----------------------------------------------------------------------

pub struct Harness {
    pub db: Surreal<Db>,
    pub users: Users,
    pub groups: Groups,
    pub catalogs: Catalogs,
    pub resources: Resources,
    pub flow_store: FlowStore,
    pub requests: Requests,
    pub config: StaticCatalogConfigStore,
    pub handler: Arc<TestResourceHandler>,
    pub scheduler: Arc<FakeScheduler>,
    pub plugin: Arc<RecordingPlugin>,
    pub handlers: Arc<ResourceTypeHandlerRegistry>,
    pub plugins: Arc<NotificationPluginRegistry>,
}

impl Harness {
    pub async fn new(configs: Vec<CatalogConfig>) -> Self {
        let db = Surreal::new::<Mem>(()).await.unwrap();
        db.use_ns("test").use_db("test").await.unwrap();
        custos_db::run_migrations(&db).await.unwrap();

        let handler = Arc::new(TestResourceHandler::default());
        let mut handlers = ResourceTypeHandlerRegistry::new();
        handlers.register("system", handler.clone());
        handlers.register("database", handler.clone());

        let plugin = Arc::new(RecordingPlugin::new("chat"));
        let mut plugins = NotificationPluginRegistry::new();
        plugins.register("chat", plugin.clone());

        Self {
            users: SurrealUserStore::new(db.clone()),
            groups: SurrealGroupStore::new(db.clone()),
            catalogs: SurrealCatalogStore::new(db.clone()),
            resources: SurrealResourceStore::new(db.clone()),
            flow_store: SurrealApprovalFlowStore::new(db.clone()),
            requests: SurrealApprovalRequestStore::new(db.clone()),
            config: StaticCatalogConfigStore::new(configs),
            handler,
            scheduler: Arc::new(FakeScheduler::default()),
            plugin,
            handlers: Arc::new(handlers),
            plugins: Arc::new(plugins),
            db,
        }
    }

    pub fn evaluator(&self) -> Evaluator {
        PermissionEvaluator::new(
            self.users.clone(),
            self.groups.clone(),
            self.catalogs.clone(),
            self.resources.clone(),
        )
    }

    pub fn resolver(&self) -> ResourceInfoResolver<Resources> {
        ResourceInfoResolver::new(self.resources.clone())
    }

    /// Registry containing only the built-in resource-update flow.
    pub fn resource_update_flows(&self) -> Arc<ApprovalFlowHandlerRegistry> {
        let mut flows = ApprovalFlowHandlerRegistry::new();
        flows.register(
            RESOURCE_UPDATE_FLOW_ID,
            Arc::new(ResourceUpdateFlow::new(
                self.handlers.clone(),
                self.resolver(),
                self.resources.clone(),
            )) as Arc<dyn ApprovalFlowHandler>,
        );
        Arc::new(flows)
    }

    pub fn approval_service(&self, flows: Arc<ApprovalFlowHandlerRegistry>) -> ApprovalSvc {
        let scheduler: Arc<dyn SchedulerProvider> = self.scheduler.clone();
        ApprovalRequestService::new(
            self.groups.clone(),
            self.config.clone(),
            self.flow_store.clone(),
            self.requests.clone(),
            self.resources.clone(),
            flows,
            self.plugins.clone(),
            Some(scheduler),
        )
    }

    pub fn approval_service_without_scheduler(
        &self,
        flows: Arc<ApprovalFlowHandlerRegistry>,
    ) -> ApprovalSvc {
        ApprovalRequestService::new(
            self.groups.clone(),
            self.config.clone(),
            self.flow_store.clone(),
            self.requests.clone(),
            self.resources.clone(),
            flows,
            self.plugins.clone(),
            None,
        )
    }

    pub fn audit_service(&self) -> AuditSvc {
        AuditNotificationService::new(
            self.evaluator(),
            self.resolver(),
            self.users.clone(),
            self.resources.clone(),
            self.handlers.clone(),
            self.plugins.clone(),
            self.scheduler.clone(),
        )
    }

    pub fn group_service(&self) -> GroupSvc {
        GroupService::new(
            self.evaluator(),
            self.users.clone(),
            self.groups.clone(),
            self.plugins.clone(),
        )
    }

    pub fn resource_service(&self, flows: Arc<ApprovalFlowHandlerRegistry>) -> ResourceSvc {
        ResourceService::new(
            self.evaluator(),
            self.resolver(),
            self.config.clone(),
            self.resources.clone(),
            self.handlers.clone(),
            self.approval_service(flows),
            self.audit_service(),
        )
    }

    pub async fn user(&self, name: &str, roles: Vec<String>) -> Uuid {
        self.users
            .create(CreateUser {
                name: name.into(),
                email: format!("{name}@example.com"),
                roles,
            })
            .await
            .unwrap()
            .id
    }

    pub async fn group(&self, name: &str) -> Uuid {
        self.group_with_bindings(name, Vec::new(), Vec::new()).await
    }

    pub async fn group_with_bindings(
        &self,
        name: &str,
        member_added: Vec<GroupNotificationBinding>,
        approval_request: Vec<GroupNotificationBinding>,
    ) -> Uuid {
        self.groups
            .create(CreateGroup {
                name: name.into(),
                description: String::new(),
                member_added_notifications: member_added,
                approval_request_notifications: approval_request,
            })
            .await
            .unwrap()
            .id
    }

    pub async fn member(&self, group: Uuid, user: Uuid, role: GroupRole) {
        self.groups.add_member(group, user, role).await.unwrap();
    }

    pub async fn catalog(&self, id: &str, owner_group_id: Option<Uuid>) {
        self.catalogs
            .create(CreateCatalog {
                id: id.into(),
                name: id.into(),
                description: String::new(),
                owner_group_id,
            })
            .await
            .unwrap();
    }

    pub async fn record(&self, record: ResourceRecord) {
        self.resources.save_record(record).await.unwrap();
    }

    /// Seed the standard scenario: a `system` resource `sys-1` owned by
    /// `owners` and approved by `approvers`, plus a child `database`
    /// resource `db-1` owned by `owners`.
    pub async fn seed_resource_tree(&self, owners: Uuid, approvers: Uuid) {
        self.handler.seed(
            "system",
            HandlerResource {
                id: "sys-1".into(),
                name: "payments system".into(),
                params: serde_json::json!({}),
                parent_resource_id: None,
            },
        );
        self.record(ResourceRecord {
            catalog_id: "main".into(),
            resource_type_id: "system".into(),
            resource_id: "sys-1".into(),
            owner_group_id: Some(owners),
            approver_group_id: Some(approvers),
            parent_resource_type_id: None,
            pending_update: None,
            audit_notifications: Vec::new(),
        })
        .await;

        self.handler.seed(
            "database",
            HandlerResource {
                id: "db-1".into(),
                name: "orders database".into(),
                params: serde_json::json!({ "tier": "bronze" }),
                parent_resource_id: Some("sys-1".into()),
            },
        );
        self.record(ResourceRecord {
            catalog_id: "main".into(),
            resource_type_id: "database".into(),
            resource_id: "db-1".into(),
            owner_group_id: Some(owners),
            approver_group_id: None,
            parent_resource_type_id: Some("system".into()),
            pending_update: None,
            audit_notifications: Vec::new(),
        })
        .await;
    }
}

pub fn chat_binding() -> GroupNotificationBinding {
    GroupNotificationBinding {
        id: Uuid::new_v4(),
        type_id: "chat".into(),
        properties: serde_json::json!({ "channel": "#approvals" }),
    }
}

pub fn unknown_plugin_binding() -> GroupNotificationBinding {
    GroupNotificationBinding {
        id: Uuid::new_v4(),
        type_id: "carrier-pigeon".into(),
        properties: serde_json::json!({}),
    }
}
