//! Effector for MCP (Model Context Protocol) servers.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::{apply_auth, build_client, transport_failure, Effector};
use crate::error::ConfigError;
use crate::model::{AgentDefinition, AuthConfig, EffectorResponse};

/// JSON-RPC 2.0 request for a `tools/call` invocation.
#[derive(Debug, Serialize)]
struct ToolCallRequest<'a> {
    jsonrpc: &'static str,
    id: u32,
    method: &'static str,
    params: ToolCallParams<'a>,
}

#[derive(Debug, Serialize)]
struct ToolCallParams<'a> {
    name: &'a str,
    arguments: &'a HashMap<String, Value>,
}

/// Calls a tool on an MCP server via JSON-RPC over HTTP: the task's action
/// is the tool name, the task's parameters are the tool arguments.
#[derive(Debug, Clone)]
pub struct McpEffector {
    name: String,
    endpoint: String,
    auth: Option<AuthConfig>,
    client: Client,
}

impl McpEffector {
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
            client: build_client(definition)?,
        })
    }
}

#[async_trait]
impl Effector for McpEffector {
    #[instrument(skip(self, parameters), fields(agent = %self.name, tool = %action))]
    async fn execute(
        &self,
        action: &str,
        parameters: &HashMap<String, Value>,
    ) -> EffectorResponse {
        let payload = ToolCallRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "tools/call",
            params: ToolCallParams {
                name: action,
                arguments: parameters,
            },
        };

        let request = apply_auth(
            self.client.post(&self.endpoint).json(&payload),
            self.auth.as_ref(),
        );
        let response = match request.send().await {
            Ok(response) => response,
            Err(error) => return transport_failure(error),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return EffectorResponse::failure(format!("HTTP {}: {}", status.as_u16(), body))
                .with_metadata("status_code", json!(status.as_u16()));
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(error) => {
                return EffectorResponse::failure(format!("Invalid JSON response: {error}"))
            }
        };

        if let Some(result) = body.get("result") {
            debug!("tool call succeeded");
            EffectorResponse::ok(result.clone())
                .with_metadata("status_code", json!(status.as_u16()))
                .with_metadata("jsonrpc_id", body.get("id").cloned().unwrap_or(Value::Null))
        } else if let Some(error) = body.get("error") {
            let code = error.get("code").cloned().unwrap_or(Value::Null);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            EffectorResponse::failure(format!("MCP Error {code}: {message}"))
                .with_metadata("status_code", json!(status.as_u16()))
                .with_metadata("jsonrpc_id", body.get("id").cloned().unwrap_or(Value::Null))
                .with_metadata("error_code", code)
        } else {
            EffectorResponse::failure("Invalid MCP response format")
                .with_metadata("status_code", json!(status.as_u16()))
        }
    }
}
