//! Static catalog configuration store.

use std::collections::HashMap;
use std::sync::Arc;

use custos_core::error::CustosResult;
use custos_core::models::catalog::CatalogConfig;
use custos_core::store::CatalogConfigStore;

/// Immutable [`CatalogConfigStore`] backed by configuration loaded at
/// startup. Injected explicitly wherever catalog configuration is needed.
#[derive(Clone, Default)]
pub struct StaticCatalogConfigStore {
    configs: HashMap<String, Arc<CatalogConfig>>,
}

impl StaticCatalogConfigStore {
    pub fn new(configs: impl IntoIterator<Item = CatalogConfig>) -> Self {
        Self {
            configs: configs
                .into_iter()
                .map(|config| (config.id.clone(), Arc::new(config)))
                .collect(),
        }
    }
}

impl CatalogConfigStore for StaticCatalogConfigStore {
    fn get_config(
        &self,
        catalog_id: &str,
    ) -> impl Future<Output = CustosResult<Option<Arc<CatalogConfig>>>> + Send {
        let config = self.configs.get(catalog_id).cloned();
        async move { Ok(config) }
    }
}
