//! # mdr-connectors
//!
//! Vendor packs for endpoint-security platforms.
//!
//! This crate defines the capability contract every vendor adapter satisfies,
//! the normalization pipeline that turns raw vendor payloads into canonical
//! alerts, and the pack registry / factory that resolve a vendor id into a
//! ready-to-use adapter for one tenant.

pub mod config;
pub mod edr;
pub mod factory;
pub mod http;
pub mod normalize;
pub mod pipeline;
pub mod registry;
pub mod secure_string;
pub mod testing;
pub mod traits;

pub use config::{PackConfig, PackConfigExt};
pub use edr::{
    register_builtin_packs, FidelisAdapter, MockAdapter, MockBehavior, TrendMicroAdapter,
};
pub use factory::AdapterFactory;
pub use http::{HttpAuth, HttpClient, HttpClientConfig};
pub use normalize::{clean_record, optimize_for_analysis, EventCategory, DEFAULT_EXCLUDED_KEYS};
pub use pipeline::{transform_alert, transform_alert_value};
pub use registry::{
    AdapterConstructor, PackError, PackMetadata, PackRegistry, PackResult, BUNDLED_PACKS_DIR,
};
pub use secure_string::SecureString;
pub use traits::{AdapterError, AdapterResult, EndpointAdapter};
