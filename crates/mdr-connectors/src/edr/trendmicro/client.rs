//! Trend Micro Vision One REST client.

use crate::config::{PackConfig, PackConfigExt};
use crate::http::{HttpAuth, HttpClient, HttpClientConfig};
use crate::traits::AdapterResult;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::instrument;

/// Vendor calls the Vision One adapter relies on.
#[async_trait]
pub trait VisionOneApi: Send + Sync {
    /// Endpoint inventory search. Returns `{"items": [...]}`.
    async fn search_endpoints(&self, query: &str) -> AdapterResult<Value>;

    /// Sends a response command (`isolate`, `terminate_process`, ...) to an endpoint.
    async fn run_command(
        &self,
        endpoint_id: &str,
        command: &str,
        params: Map<String, Value>,
    ) -> AdapterResult<Value>;

    /// Fetches EDR telemetry of one kind (e.g. `process_list`) for an endpoint.
    async fn get_edr_telemetry(&self, endpoint_id: &str, kind: &str) -> AdapterResult<Value>;
}

/// [`VisionOneApi`] over HTTPS with a bearer API key.
pub struct VisionOneHttpClient {
    http: HttpClient,
}

impl VisionOneHttpClient {
    pub fn from_config(config: &PackConfig) -> AdapterResult<Self> {
        let mut http_config = HttpClientConfig::new("Vision One", config.require_string("api_url")?)
            .with_auth(HttpAuth::Bearer(config.require_secret("api_key")?));
        if let Some(timeout) = config.get_u64("timeout_secs") {
            http_config.timeout_secs = timeout;
        }
        http_config.proxy = config.get_string("proxy");

        Ok(Self {
            http: HttpClient::new(http_config)?,
        })
    }
}

#[async_trait]
impl VisionOneApi for VisionOneHttpClient {
    #[instrument(skip(self))]
    async fn search_endpoints(&self, query: &str) -> AdapterResult<Value> {
        self.http
            .get_json(
                "/v3.0/eiqs/endpoints",
                &[],
                &[("TMV1-Query", query.to_string())],
            )
            .await
    }

    #[instrument(skip(self, params))]
    async fn run_command(
        &self,
        endpoint_id: &str,
        command: &str,
        params: Map<String, Value>,
    ) -> AdapterResult<Value> {
        let mut target = params;
        target.insert("agentGuid".into(), json!(endpoint_id));
        let path = format!("/v3.0/response/endpoints/{}", response_path(command));
        self.http
            .post_json(&path, &[], &Value::Array(vec![Value::Object(target)]))
            .await
    }

    #[instrument(skip(self))]
    async fn get_edr_telemetry(&self, endpoint_id: &str, kind: &str) -> AdapterResult<Value> {
        self.http
            .get_json(
                "/v3.0/search/endpointActivities",
                &[("select", kind.to_string())],
                &[("TMV1-Query", format!("endpointGuid:{}", endpoint_id))],
            )
            .await
    }
}

/// REST path segment for a response command name.
fn response_path(command: &str) -> String {
    let mut path = String::with_capacity(command.len());
    let mut upper = false;
    for c in command.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            path.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            path.push(c);
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::AdapterError;

    #[test]
    fn test_response_path() {
        assert_eq!(response_path("isolate"), "isolate");
        assert_eq!(response_path("terminate_process"), "terminateProcess");
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let mut config = PackConfig::new();
        config.insert("api_url".into(), json!("https://api.xdr.trendmicro.com"));
        assert!(matches!(
            VisionOneHttpClient::from_config(&config),
            Err(AdapterError::Config(_))
        ));

        config.insert("api_key".into(), json!("token"));
        assert!(VisionOneHttpClient::from_config(&config).is_ok());
    }
}
