//! # Cactus API Server
//!
//! Dispatch layer of the gateway. Composes the plugins named in
//! configuration into one axum router, guarded by the authorization
//! gatekeeper.
//!
//! ## Endpoints
//!
//! - `GET /api/v1/api-server/healthcheck` - Liveness check
//! - `GET /api/v1/async/healthcheck/watch` - Health check every heartbeat (server-sent events)
//! - every route declared by a registered web-service plugin

pub mod client;
pub mod config;
pub mod error;
pub mod health;
pub mod plugins;
pub mod server;

pub use client::{ApiServerClient, TokenProvider};
pub use config::{ApiServerConfig, AuthorizationProtocol, PluginImport};
pub use error::{ClientError, ConfigError, ServerError};
pub use health::{HealthCheckResponse, HEALTH_CHECK_PATH};
pub use plugins::{build_registry, instantiate_plugin, BUILT_IN_PACKAGES};
pub use server::{ApiServer, RunningServer};

/// Server version reported by the health check
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
