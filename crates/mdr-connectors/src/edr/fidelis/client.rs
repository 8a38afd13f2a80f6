//! Fidelis Endpoint REST client.

use crate::config::{PackConfig, PackConfigExt};
use crate::http::{HttpAuth, HttpClient, HttpClientConfig};
use crate::secure_string::SecureString;
use crate::traits::{AdapterError, AdapterResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument};

const API_SUFFIX: &str = "/Endpoint/api";
const ENDPOINT_ACCESS_TYPE: &str = "3";

/// Event search criteria.
#[derive(Debug, Clone)]
pub struct EventQuery {
    pub entity_type: String,
    pub column: String,
    pub operator: String,
    pub value: String,
    pub limit: u32,
}

impl EventQuery {
    /// Equality filter on one column.
    pub fn equals(entity_type: &str, column: &str, value: &str) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            column: column.to_string(),
            operator: "=".to_string(),
            value: value.to_string(),
            limit: 100,
        }
    }
}

/// Vendor calls the Fidelis adapter relies on. Responses are Fidelis-shaped JSON.
#[async_trait]
pub trait FidelisApi: Send + Sync {
    /// Searches endpoints by hostname.
    async fn get_host_info(&self, hostname: &str) -> AdapterResult<Value>;

    /// Runs a response script against an endpoint and returns the job id.
    async fn execute_script(
        &self,
        script_id: &str,
        endpoint_ip: &str,
        answer: &str,
    ) -> AdapterResult<Value>;

    async fn query_events(&self, query: &EventQuery) -> AdapterResult<Value>;
}

/// [`FidelisApi`] over HTTPS with username / password session tokens.
pub struct FidelisHttpClient {
    http: HttpClient,
    username: String,
    password: SecureString,
}

impl FidelisHttpClient {
    pub fn from_config(config: &PackConfig) -> AdapterResult<Self> {
        let server_url = config.require_string("server_url")?;
        let mut http_config = HttpClientConfig::new("Fidelis", api_base_url(&server_url));
        http_config.verify_tls = config.get_bool("verify_ssl").unwrap_or(true);
        http_config.proxy = config.get_string("proxy");
        if let Some(timeout) = config.get_u64("timeout_secs") {
            http_config.timeout_secs = timeout;
        }

        Ok(Self {
            http: HttpClient::new(http_config)?,
            username: config.require_string("username")?,
            password: config.require_secret("password")?,
        })
    }

    async fn ensure_session(&self) -> AdapterResult<()> {
        if self.http.has_bearer().await {
            return Ok(());
        }

        let response = self
            .http
            .get_json(
                "/authenticate",
                &[
                    ("username", self.username.clone()),
                    ("password", self.password.expose_secret().to_string()),
                ],
                &[],
            )
            .await?;

        let token = response
            .pointer("/data/token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AdapterError::AuthenticationFailed("Fidelis did not return a session token".into())
            })?;

        debug!("Fidelis session established");
        self.http
            .set_auth(HttpAuth::Bearer(SecureString::from(token)))
            .await;
        Ok(())
    }
}

#[async_trait]
impl FidelisApi for FidelisHttpClient {
    #[instrument(skip(self))]
    async fn get_host_info(&self, hostname: &str) -> AdapterResult<Value> {
        self.ensure_session().await?;
        let search = json!({
            "searchFields": [{"fieldName": "HostName", "values": [{"value": hostname}]}]
        });
        let path = format!("/endpoints/v2/0/100/{}", urlencoding::encode("hostname Ascending"));
        self.http
            .get_json(
                &path,
                &[
                    ("accessType", ENDPOINT_ACCESS_TYPE.to_string()),
                    ("search", search.to_string()),
                ],
                &[],
            )
            .await
    }

    #[instrument(skip(self))]
    async fn execute_script(
        &self,
        script_id: &str,
        endpoint_ip: &str,
        answer: &str,
    ) -> AdapterResult<Value> {
        self.ensure_session().await?;
        let body = json!({
            "packageId": script_id,
            "endpoints": [endpoint_ip],
            "isPlaybook": false,
            "taskOptions": [{
                "integrationOutputFormat": null,
                "scriptId": script_id,
                "questions": [{"paramNumber": 1, "answer": answer}]
            }]
        });
        let response = self.http.post_json("/jobs/createTask", &[], &body).await?;
        response
            .get("data")
            .cloned()
            .filter(|job| !job.is_null())
            .ok_or_else(|| AdapterError::InvalidResponse("createTask returned no job id".into()))
    }

    #[instrument(skip(self))]
    async fn query_events(&self, query: &EventQuery) -> AdapterResult<Value> {
        self.ensure_session().await?;
        let body = json!({
            "criteriaV3": {
                "relationshipFilter": null,
                "entityType": query.entity_type,
                "filter": {
                    "filterType": "criteria",
                    "column": query.column,
                    "operator": query.operator,
                    "value": query.value
                }
            }
        });
        self.http
            .post_json("/v2/events", &[("pageSize", query.limit.to_string())], &body)
            .await
    }
}

/// Appends `/Endpoint/api` to the configured server URL unless already present.
fn api_base_url(server_url: &str) -> String {
    let trimmed = server_url.trim_end_matches('/');
    if trimmed.ends_with(API_SUFFIX) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, API_SUFFIX)
    }
}
