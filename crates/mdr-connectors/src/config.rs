//! Per-tenant pack configuration.

use crate::secure_string::SecureString;
use crate::traits::{AdapterError, AdapterResult};
use serde_json::Value;
use std::collections::HashMap;

/// Configuration handed to a pack constructor.
///
/// Keys are pack specific; the registry only checks the presence of the keys
/// a pack declares in `required_config`.
pub type PackConfig = HashMap<String, Value>;

/// Typed accessors over [`PackConfig`].
pub trait PackConfigExt {
    /// Returns a key rendered as a string. Numbers and booleans are accepted.
    fn get_string(&self, key: &str) -> Option<String>;

    /// Like [`get_string`](Self::get_string) but fails with a configuration error.
    fn require_string(&self, key: &str) -> AdapterResult<String>;

    /// Returns a required key wrapped as a secret.
    fn require_secret(&self, key: &str) -> AdapterResult<SecureString> {
        self.require_string(key).map(SecureString::new)
    }

    /// Returns a boolean flag, accepting `"true"` / `"false"` strings.
    fn get_bool(&self, key: &str) -> Option<bool>;

    fn get_u64(&self, key: &str) -> Option<u64>;
}

impl PackConfigExt for PackConfig {
    fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn require_string(&self, key: &str) -> AdapterResult<String> {
        self.get_string(key)
            .ok_or_else(|| AdapterError::Config(format!("missing or empty '{}'", key)))
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn get_u64(&self, key: &str) -> Option<u64> {
        match self.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> PackConfig {
        let mut config = PackConfig::new();
        config.insert("server_url".into(), json!("https://fidelis.local"));
        config.insert("script".into(), json!(42));
        config.insert("verify_ssl".into(), json!("false"));
        config.insert("empty".into(), json!(""));
        config
    }

    #[test]
    fn test_get_string_accepts_scalars() {
        let config = config();
        assert_eq!(config.get_string("server_url").as_deref(), Some("https://fidelis.local"));
        assert_eq!(config.get_string("script").as_deref(), Some("42"));
        assert_eq!(config.get_string("empty"), None);
        assert_eq!(config.get_string("absent"), None);
    }

    #[test]
    fn test_require_string_reports_key() {
        let err = config().require_string("username").unwrap_err();
        assert!(err.to_string().contains("username"));
    }

    #[test]
    fn test_get_bool() {
        assert_eq!(config().get_bool("verify_ssl"), Some(false));
        assert_eq!(config().get_bool("server_url"), None);
    }
}
