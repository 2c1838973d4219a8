//! Resource info resolution: merge a handler's live view of a resource
//! with the persisted governance record.

use std::collections::HashMap;

use custos_core::error::CustosResult;
use custos_core::handler::ResourceTypeHandler;
use custos_core::models::resource::ResourceInfo;
use custos_core::store::ResourceStore;

/// Merges the two views of a resource: the type handler's backing system
/// (authoritative for existence) and the hub's governance record
/// (authoritative for ownership, approver and audit metadata).
#[derive(Clone)]
pub struct ResourceInfoResolver<R> {
    resources: R,
}

impl<R: ResourceStore> ResourceInfoResolver<R> {
    pub fn new(resources: R) -> Self {
        Self { resources }
    }

    /// Both reads are issued concurrently. A handler miss is an overall
    /// miss even when a governance record is still around; a record miss
    /// yields the handler's fields with empty governance fields.
    pub async fn resolve(
        &self,
        handler: &dyn ResourceTypeHandler,
        catalog_id: &str,
        resource_type_id: &str,
        resource_id: &str,
    ) -> CustosResult<Option<ResourceInfo>> {
        let (live, record) = futures::try_join!(
            handler.get_resource(catalog_id, resource_type_id, resource_id),
            self.resources
                .get_record(catalog_id, resource_type_id, resource_id),
        )?;

        let Some(live) = live else {
            return Ok(None);
        };

        Ok(Some(match record {
            Some(record) => ResourceInfo::merge(live, record),
            None => ResourceInfo::from_handler(catalog_id, resource_type_id, live),
        }))
    }

    /// Resolve every resource the handler lists, merging governance
    /// fields for the ones that have a record.
    pub async fn resolve_all(
        &self,
        handler: &dyn ResourceTypeHandler,
        catalog_id: &str,
        resource_type_id: &str,
    ) -> CustosResult<Vec<ResourceInfo>> {
        let (live, records) = futures::try_join!(
            handler.list_resources(catalog_id, resource_type_id),
            self.resources.list_records(catalog_id, resource_type_id),
        )?;

        let mut by_id: HashMap<String, _> = records
            .into_iter()
            .map(|record| (record.resource_id.clone(), record))
            .collect();

        Ok(live
            .into_iter()
            .map(|resource| match by_id.remove(&resource.id) {
                Some(record) => ResourceInfo::merge(resource, record),
                None => ResourceInfo::from_handler(catalog_id, resource_type_id, resource),
            })
            .collect())
    }
}
