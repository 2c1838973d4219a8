//! Registries mapping config-space ids to collaborator implementations.
//!
//! Registries are plain maps, built once at startup and injected where
//! needed; there are no module-level singletons. A configured id with no
//! registered implementation is an operator misconfiguration, which is why
//! the `require` accessors report it as an internal error rather than a
//! caller fault.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CustosError, CustosResult};
use crate::flow::ApprovalFlowHandler;
use crate::handler::ResourceTypeHandler;
use crate::plugin::NotificationPlugin;

#[derive(Default)]
pub struct ResourceTypeHandlerRegistry {
    handlers: HashMap<String, Arc<dyn ResourceTypeHandler>>,
}

impl ResourceTypeHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        resource_type_id: impl Into<String>,
        handler: Arc<dyn ResourceTypeHandler>,
    ) {
        self.handlers.insert(resource_type_id.into(), handler);
    }

    pub fn get(&self, resource_type_id: &str) -> Option<Arc<dyn ResourceTypeHandler>> {
        self.handlers.get(resource_type_id).cloned()
    }

    pub fn require(&self, resource_type_id: &str) -> CustosResult<Arc<dyn ResourceTypeHandler>> {
        self.get(resource_type_id).ok_or_else(|| {
            CustosError::internal(format!(
                "no handler registered for resource type '{resource_type_id}'"
            ))
        })
    }
}

#[derive(Default)]
pub struct NotificationPluginRegistry {
    plugins: HashMap<String, Arc<dyn NotificationPlugin>>,
}

impl NotificationPluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, type_id: impl Into<String>, plugin: Arc<dyn NotificationPlugin>) {
        self.plugins.insert(type_id.into(), plugin);
    }

    /// Lookup by notification type id. Misses are left to the caller:
    /// they are a caller fault on the audit path and skip-and-log on the
    /// best-effort dispatch path.
    pub fn get(&self, type_id: &str) -> Option<Arc<dyn NotificationPlugin>> {
        self.plugins.get(type_id).cloned()
    }
}

#[derive(Default)]
pub struct ApprovalFlowHandlerRegistry {
    flows: HashMap<String, Arc<dyn ApprovalFlowHandler>>,
}

impl ApprovalFlowHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, flow_id: impl Into<String>, handler: Arc<dyn ApprovalFlowHandler>) {
        self.flows.insert(flow_id.into(), handler);
    }

    pub fn get(&self, flow_id: &str) -> Option<Arc<dyn ApprovalFlowHandler>> {
        self.flows.get(flow_id).cloned()
    }

    pub fn require(&self, flow_id: &str) -> CustosResult<Arc<dyn ApprovalFlowHandler>> {
        self.get(flow_id).ok_or_else(|| {
            CustosError::internal(format!(
                "no handler registered for approval flow '{flow_id}'"
            ))
        })
    }
}
