//! Pluggable adapters for the remote services workflows delegate work to.
//!
//! Each effector variant speaks one wire protocol (AI inference service,
//! MCP server, generic HTTP API). All variants share the same infallible
//! [`Effector::execute`] contract: transport errors, timeouts, and decode
//! failures come back as failure-flagged responses, never as panics or
//! errors.
//!
//! New kinds are added by registering a constructor with an
//! [`EffectorRegistry`]; the registry is owned by (or injected into) the
//! engine rather than living in process-wide static state.

/// Adapter for AI inference services.
pub mod ai;
/// Adapter for generic HTTP APIs.
pub mod http;
/// Adapter for MCP (Model Context Protocol) servers.
pub mod mcp;
/// Circuit breaker + retry composition around one effector.
pub mod resilient;

pub use ai::AiEffector;
pub use http::HttpApiEffector;
pub use mcp::McpEffector;
pub use resilient::ResilientEffector;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ConfigError;
use crate::model::{AgentDefinition, AuthConfig, EffectorResponse};

/// Uniform contract for remote-service adapters.
#[async_trait]
pub trait Effector: Send + Sync {
    /// Perform `action` with `parameters` against the remote service.
    ///
    /// Implementations convert every failure mode into a failure response
    /// and never panic.
    async fn execute(
        &self,
        action: &str,
        parameters: &HashMap<String, Value>,
    ) -> EffectorResponse;
}

/// Constructor for one effector kind.
pub type EffectorBuilder =
    Arc<dyn Fn(&AgentDefinition) -> Result<Arc<dyn Effector>, ConfigError> + Send + Sync>;

/// Registry of effector constructors keyed by agent type tag.
#[derive(Clone, Default)]
pub struct EffectorRegistry {
    builders: HashMap<String, EffectorBuilder>,
}

impl fmt::Debug for EffectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("EffectorRegistry").field("kinds", &kinds).finish()
    }
}

impl EffectorRegistry {
    /// An empty registry with no kinds registered.
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// A registry with the built-in kinds: `ai_agent`, `mcp_server`, and
    /// `http_api`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("ai_agent", |def| {
            Ok(Arc::new(AiEffector::new(def)?) as Arc<dyn Effector>)
        });
        registry.register("mcp_server", |def| {
            Ok(Arc::new(McpEffector::new(def)?) as Arc<dyn Effector>)
        });
        registry.register("http_api", |def| {
            Ok(Arc::new(HttpApiEffector::new(def)?) as Arc<dyn Effector>)
        });
        registry
    }

    /// Register a constructor for `kind`, replacing any existing one.
    pub fn register<F>(&mut self, kind: &str, builder: F)
    where
        F: Fn(&AgentDefinition) -> Result<Arc<dyn Effector>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.builders.insert(kind.to_string(), Arc::new(builder));
    }

    /// Whether a constructor is registered for `kind`.
    pub fn contains(&self, kind: &str) -> bool {
        self.builders.contains_key(kind)
    }

    /// Build an effector for the agent's type tag.
    pub fn build(&self, definition: &AgentDefinition) -> Result<Arc<dyn Effector>, ConfigError> {
        let builder = self
            .builders
            .get(&definition.kind)
            .ok_or_else(|| ConfigError::UnknownEffectorType(definition.kind.clone()))?;
        builder.as_ref()(definition)
    }
}

/// Apply an agent's authentication descriptor to an outgoing request.
pub(crate) fn apply_auth(
    request: reqwest::RequestBuilder,
    auth: Option<&AuthConfig>,
) -> reqwest::RequestBuilder {
    let Some(auth) = auth else {
        return request;
    };
    match auth.auth_type.as_str() {
        "bearer" => match &auth.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        },
        "api_key" => match &auth.key {
            Some(key) => request.header(auth.header.as_str(), key),
            None => request,
        },
        "basic" => match &auth.username {
            Some(username) => request.basic_auth(username, auth.password.as_deref()),
            None => request,
        },
        _ => request,
    }
}

/// Build the shared HTTP client for an agent, with its per-call timeout.
pub(crate) fn build_client(definition: &AgentDefinition) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .timeout(definition.call_timeout())
        .build()
        .map_err(|e| ConfigError::HttpClient {
            agent: definition.name.clone(),
            message: e.to_string(),
        })
}

/// Convert a transport-level error into the canonical failure response.
pub(crate) fn transport_failure(error: reqwest::Error) -> EffectorResponse {
    if error.is_timeout() {
        EffectorResponse::failure("Request timeout")
    } else {
        EffectorResponse::failure(format!("HTTP client error: {error}"))
    }
}
