//! Resource-type handler contract.
//!
//! Each resource type supplies its own handler at catalog configuration
//! time; the hub selects one through
//! [`ResourceTypeHandlerRegistry`](crate::registry::ResourceTypeHandlerRegistry)
//! keyed by resource type id. The handler's backing system is
//! authoritative for a resource's existence; the hub only layers
//! governance metadata on top.

use async_trait::async_trait;

use crate::error::CustosResult;
use crate::models::resource::{HandlerResource, ResourceAuditItem};

#[async_trait]
pub trait ResourceTypeHandler: Send + Sync {
    async fn create_resource(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        name: &str,
        params: &serde_json::Value,
    ) -> CustosResult<HandlerResource>;

    async fn get_resource(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
    ) -> CustosResult<Option<HandlerResource>>;

    async fn update_resource(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
        params: &serde_json::Value,
    ) -> CustosResult<HandlerResource>;

    async fn delete_resource(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
    ) -> CustosResult<()>;

    async fn list_resources(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
    ) -> CustosResult<Vec<HandlerResource>>;

    async fn list_resource_audit_items(
        &self,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
    ) -> CustosResult<Vec<ResourceAuditItem>>;
}
