//! Endpoint vendor packs.

pub mod fidelis;
pub mod mock;
pub mod trendmicro;

pub use fidelis::FidelisAdapter;
pub use mock::{MockAdapter, MockBehavior};
pub use trendmicro::TrendMicroAdapter;

use crate::registry::PackRegistry;
use crate::traits::EndpointAdapter;
use std::sync::Arc;

/// Registers the production packs shipped with this crate.
pub fn register_builtin_packs(registry: &mut PackRegistry) {
    registry.register_pack(fidelis::PACK_ID, |tenant_id, config| {
        Ok(Arc::new(FidelisAdapter::new(tenant_id, config)?) as Arc<dyn EndpointAdapter>)
    });
    registry.register_pack(trendmicro::PACK_ID, |tenant_id, config| {
        Ok(Arc::new(TrendMicroAdapter::new(tenant_id, config)?) as Arc<dyn EndpointAdapter>)
    });
}

/// Registers the in-memory mock pack with sample data.
pub fn register_mock_pack(registry: &mut PackRegistry) {
    registry.register_pack(mock::PACK_ID, |tenant_id, _config| {
        Ok(Arc::new(MockAdapter::with_sample_data(tenant_id)) as Arc<dyn EndpointAdapter>)
    });
}
