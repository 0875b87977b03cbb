//! Effector for generic HTTP APIs.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tracing::{debug, instrument};
use url::Url;

use super::{apply_auth, build_client, transport_failure, Effector};
use crate::error::ConfigError;
use crate::model::{AgentDefinition, AuthConfig, EffectorResponse};

/// Drives an arbitrary HTTP request from call-time parameters.
///
/// Recognized parameters: `method` (default `POST`), `endpoint` (absolute
/// URL or a path joined onto the agent's endpoint; defaults to the task's
/// action), `data` (JSON body for POST/PUT/PATCH), `params` (query string
/// map), and `headers` (extra request headers). Any 2xx status is a
/// success; the body is decoded as JSON when possible and falls back to
/// raw text.
#[derive(Debug, Clone)]
pub struct HttpApiEffector {
    name: String,
    base: Option<String>,
    auth: Option<AuthConfig>,
    client: Client,
}

impl HttpApiEffector {
    /// Build from an agent definition. The endpoint is optional; calls
    /// must then carry absolute URLs.
    pub fn new(definition: &AgentDefinition) -> Result<Self, ConfigError> {
        Ok(Self {
            name: definition.name.clone(),
            base: definition.endpoint.clone(),
            auth: definition.authentication.clone(),
            client: build_client(definition)?,
        })
    }

    fn resolve_url(&self, endpoint: &str) -> Result<String, String> {
        if endpoint.starts_with("http") {
            return Ok(endpoint.to_string());
        }
        let Some(base) = &self.base else {
            return Err(format!(
                "relative endpoint '{endpoint}' requires a configured agent endpoint"
            ));
        };
        Url::parse(base)
            .and_then(|b| b.join(endpoint))
            .map(|u| u.to_string())
            .map_err(|e| e.to_string())
    }
}

fn query_pairs(parameters: &HashMap<String, Value>) -> Vec<(String, String)> {
    let Some(Value::Object(map)) = parameters.get("params") else {
        return Vec::new();
    };
    map.iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), rendered)
        })
        .collect()
}

#[async_trait]
impl Effector for HttpApiEffector {
    #[instrument(skip(self, parameters), fields(agent = %self.name, action = %action))]
    async fn execute(
        &self,
        action: &str,
        parameters: &HashMap<String, Value>,
    ) -> EffectorResponse {
        let method_name = parameters
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("POST")
            .to_ascii_uppercase();
        let method = match Method::from_bytes(method_name.as_bytes()) {
            Ok(method) => method,
            Err(_) => {
                return EffectorResponse::failure(format!("Invalid HTTP method: {method_name}"))
            }
        };

        let endpoint = parameters
            .get("endpoint")
            .and_then(Value::as_str)
            .unwrap_or(action);
        let url = match self.resolve_url(endpoint) {
            Ok(url) => url,
            Err(error) => return EffectorResponse::failure(format!("HTTP client error: {error}")),
        };

        let mut request = self.client.request(method.clone(), &url);
        let query = query_pairs(parameters);
        if !query.is_empty() {
            request = request.query(&query);
        }
        if method == Method::POST || method == Method::PUT || method == Method::PATCH {
            let body = parameters.get("data").cloned().unwrap_or(json!({}));
            request = request.json(&body);
        }
        if let Some(Value::Object(headers)) = parameters.get("headers") {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(name.as_str(), value);
                }
            }
        }
        request = apply_auth(request, self.auth.as_ref());

        let response = match request.send().await {
            Ok(response) => response,
            Err(error) => return transport_failure(error),
        };

        let status = response.status();
        let final_url = response.url().to_string();
        let text = match response.text().await {
            Ok(text) => text,
            Err(error) => return transport_failure(error),
        };
        let result: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));

        let metadata_base = |resp: EffectorResponse| {
            resp.with_metadata("status_code", json!(status.as_u16()))
                .with_metadata("method", json!(method_name))
                .with_metadata("url", json!(final_url))
        };

        if status.is_success() {
            debug!(status = status.as_u16(), "HTTP call succeeded");
            metadata_base(EffectorResponse::ok(result))
        } else {
            let rendered = match &result {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            metadata_base(EffectorResponse::failure(format!(
                "HTTP {}: {}",
                status.as_u16(),
                rendered
            )))
        }
    }
}
