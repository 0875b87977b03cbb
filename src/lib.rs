#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::invalid_codeblock_attributes)]
#![deny(rustdoc::invalid_html_tags)]
#![deny(rustdoc::bare_urls)]
#![deny(clippy::missing_panics_doc)]

//! Conductor is a workflow orchestration engine for automation pipelines
//! that call unreliable network services in a controlled order.
//!
//! A workflow declares tasks and the agents they are delegated to. Each
//! agent is backed by a pluggable effector (AI service, MCP server, or
//! generic HTTP API) wrapped with per-agent resilience: retry with
//! exponential backoff and a circuit breaker bounding the blast radius of
//! a failing service. The engine honors task dependencies, runs tasks
//! sequentially or concurrently, and produces an aggregate result.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use conductor::{config, Engine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let definition = config::load_path("workflow.yaml")?;
//!     let engine = Engine::new(definition)?;
//!
//!     let mut events = engine.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{event:?}");
//!         }
//!     });
//!
//!     let result = engine.run().await;
//!     println!(
//!         "{} ({}/{} tasks completed)",
//!         result.status, result.completed_count, result.total_count
//!     );
//!     Ok(())
//! }
//! ```

/// Loading and validation of workflow definitions.
pub mod config;

/// Pluggable remote-service adapters and their resilience wrapper.
pub mod effector;

/// The orchestration engine, state tracker, and event notifier.
pub mod engine;

/// Error types.
pub mod error;

/// Shared data model.
pub mod model;

/// Backoff, circuit breaking, and retry primitives.
pub mod resilience;

/// Logging bootstrap for binaries.
pub mod telemetry;

/// REST front-end for submitting and tracking workflow runs.
#[cfg(feature = "api")]
pub mod api;

pub use effector::{Effector, EffectorRegistry, ResilientEffector};
pub use engine::{Engine, EventNotifier, TaskDispatcher, WorkflowEvent};
pub use error::{ConfigError, EffectorError};
pub use model::{
    AgentDefinition, EffectorResponse, FailureStrategy, RetryPolicy, TaskDefinition, TaskStatus,
    WorkflowDefinition, WorkflowResult, WorkflowStatus,
};
pub use resilience::{BackoffPolicy, BreakerState, CircuitBreaker, RetryExecutor};
pub use telemetry::{init_telemetry, TelemetryConfig};
