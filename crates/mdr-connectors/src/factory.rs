//! Single entry point for obtaining tenant-bound adapters.

use crate::config::PackConfig;
use crate::registry::{PackError, PackRegistry, PackResult};
use crate::traits::EndpointAdapter;
use std::sync::Arc;
use tracing::{info, instrument};

/// Turns `(vendor, tenant, config)` into a ready adapter.
///
/// Configuration is validated before any constructor runs. Instances are not
/// cached: every call builds a fresh adapter owned by the caller.
#[derive(Debug, Clone)]
pub struct AdapterFactory {
    packs: Arc<PackRegistry>,
}

impl AdapterFactory {
    pub fn new(packs: Arc<PackRegistry>) -> Self {
        Self { packs }
    }

    /// The registry this factory resolves against.
    pub fn packs(&self) -> &PackRegistry {
        &self.packs
    }

    /// Builds an adapter for one tenant.
    #[instrument(skip(self, config))]
    pub fn get(
        &self,
        vendor: &str,
        tenant_id: &str,
        config: &PackConfig,
    ) -> PackResult<Arc<dyn EndpointAdapter>> {
        let missing = self.packs.missing_config_keys(vendor, config)?;
        if !missing.is_empty() {
            return Err(PackError::ConfigValidation {
                vendor: vendor.to_string(),
                missing,
            });
        }

        let constructor = self.packs.resolve_implementation(vendor)?;
        let adapter = constructor(tenant_id, config).map_err(|e| PackError::Load {
            vendor: vendor.to_string(),
            message: e.to_string(),
        })?;

        info!("Created {} adapter for tenant {}", adapter.vendor(), tenant_id);
        Ok(adapter)
    }

    /// Installed vendor ids.
    pub fn list_vendors(&self) -> Vec<String> {
        self.packs.discover()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        as_record, mock_pack_metadata, sample_fidelis_alert, sample_trendmicro_alert,
        write_pack_metadata,
    };
    use crate::{transform_alert, MockAdapter};
    use mdr_core::EntityType;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn counting_registry(root: &std::path::Path, counter: Arc<AtomicUsize>) -> PackRegistry {
        let mut metadata = mock_pack_metadata();
        metadata.required_config = vec!["api_key".into()];
        write_pack_metadata(root, "mock", &metadata).unwrap();

        let mut registry = PackRegistry::new(root);
        registry.register_pack("mock", move |tenant, _config| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(MockAdapter::new(tenant)) as Arc<dyn EndpointAdapter>)
        });
        registry
    }

    #[test]
    fn test_missing_key_never_constructs() {
        let root = TempDir::new().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let factory = AdapterFactory::new(Arc::new(counting_registry(
            root.path(),
            Arc::clone(&counter),
        )));

        let Err(err) = factory.get("mock", "tenant-a", &PackConfig::new()) else {
            panic!("expected a config validation error");
        };
        match err {
            PackError::ConfigValidation { vendor, missing } => {
                assert_eq!(vendor, "mock");
                assert_eq!(missing, vec!["api_key"]);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_no_instance_caching() {
        let root = TempDir::new().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let factory = AdapterFactory::new(Arc::new(counting_registry(
            root.path(),
            Arc::clone(&counter),
        )));
        let mut config = PackConfig::new();
        config.insert("api_key".into(), json!("k"));

        let a = factory.get("mock", "tenant-a", &config).unwrap();
        let b = factory.get("mock", "tenant-b", &config).unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(a.tenant_id(), "tenant-a");
        assert_eq!(b.tenant_id(), "tenant-b");
    }

    #[test]
    fn test_unknown_vendor() {
        let factory = AdapterFactory::new(Arc::new(PackRegistry::bundled()));
        assert!(matches!(
            factory.get("acme", "t", &PackConfig::new()),
            Err(PackError::NotFound(_))
        ));
        assert_eq!(factory.list_vendors(), vec!["fidelis", "trendmicro"]);
    }

    #[test]
    fn test_scenario_b_two_tenants_two_vendors() {
        let factory = AdapterFactory::new(Arc::new(PackRegistry::bundled()));

        let mut fidelis_config = PackConfig::new();
        fidelis_config.insert("server_url".into(), json!("https://fidelis.example"));
        fidelis_config.insert("username".into(), json!("svc"));
        fidelis_config.insert("password".into(), json!("secret"));

        let mut trend_config = PackConfig::new();
        trend_config.insert("api_url".into(), json!("https://api.xdr.trendmicro.com"));
        trend_config.insert("api_key".into(), json!("token"));

        let fidelis = factory.get("fidelis", "tenant-a", &fidelis_config).unwrap();
        let trend = factory.get("trendmicro", "tenant-b", &trend_config).unwrap();

        let a = transform_alert(fidelis.as_ref(), &sample_fidelis_alert(), None).unwrap();
        let b = transform_alert(trend.as_ref(), &sample_trendmicro_alert(), None).unwrap();

        assert_eq!(a.vendor, "Fidelis Endpoint");
        assert_eq!(a.tenant_id, "tenant-a");
        assert_eq!(a.entity_values(EntityType::Host), vec!["PC-01"]);

        assert_eq!(b.vendor, "Trend Micro Vision One");
        assert_eq!(b.tenant_id, "tenant-b");
        assert_eq!(b.entity_values(EntityType::Host), vec!["WS-042"]);
        assert_eq!(b.entity_values(EntityType::File).len(), 1);

        // Each vendor's shape is ignored by the other mapper.
        let crossed = transform_alert(trend.as_ref(), &sample_fidelis_alert(), None).unwrap();
        assert!(crossed.entities().is_empty());
        let crossed = transform_alert(
            fidelis.as_ref(),
            &as_record(json!({"id": "x", "name": "t", "entities": [{"entityType": "host", "entityValue": "WS-042"}]})),
            None,
        )
        .unwrap();
        assert!(crossed.entities().is_empty());
    }
}
