//! Effector for AI inference services.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::{apply_auth, build_client, transport_failure, Effector};
use crate::error::ConfigError;
use crate::model::{AgentDefinition, AuthConfig, EffectorResponse};

/// Sends `{action, parameters, ...custom_params}` to an AI service as a
/// single JSON POST. Any 2xx answer with a JSON body is a success; any
/// other status is reported as `HTTP <code>: <body>`.
#[derive(Debug, Clone)]
pub struct AiEffector {
    name: String,
    endpoint: String,
    auth: Option<AuthConfig>,
    custom_params: HashMap<String, Value>,
    client: Client,
}

impl AiEffector {
    /// Build from an agent definition. Requires an endpoint.
    pub fn new(definition: &AgentDefinition) -> Result<Self, ConfigError> {
        let endpoint = definition
            .endpoint
            .clone()
            .ok_or_else(|| ConfigError::MissingEndpoint(definition.name.clone()))?;
        Ok(Self {
            name: definition.name.clone(),
            endpoint,
            auth: definition.authentication.clone(),
            custom_params: definition.custom_params.clone(),
            client: build_client(definition)?,
        })
    }
}

#[async_trait]
impl Effector for AiEffector {
    #[instrument(skip(self, parameters), fields(agent = %self.name, action = %action))]
    async fn execute(
        &self,
        action: &str,
        parameters: &HashMap<String, Value>,
    ) -> EffectorResponse {
        let mut payload = serde_json::Map::new();
        payload.insert("action".to_string(), json!(action));
        payload.insert("parameters".to_string(), json!(parameters));
        for (key, value) in &self.custom_params {
            payload.insert(key.clone(), value.clone());
        }

        let request = apply_auth(
            self.client.post(&self.endpoint).json(&Value::Object(payload)),
            self.auth.as_ref(),
        );
        let response = match request.send().await {
            Ok(response) => response,
            Err(error) => return transport_failure(error),
        };

        let status = response.status();
        if status.is_success() {
            match response.json::<Value>().await {
                Ok(body) => {
                    debug!(status = status.as_u16(), "AI call succeeded");
                    EffectorResponse::ok(body)
                        .with_metadata("status_code", json!(status.as_u16()))
                }
                Err(error) => {
                    EffectorResponse::failure(format!("Invalid JSON response: {error}"))
                }
            }
        } else {
            let body = response.text().await.unwrap_or_default();
            EffectorResponse::failure(format!("HTTP {}: {}", status.as_u16(), body))
                .with_metadata("status_code", json!(status.as_u16()))
        }
    }
}
