//! # Cactus Plugin: Consortium Manual
//!
//! Consortium membership maintained by hand and attested by signature.
//!
//! - `node/jws`: this node's compact JWS over its copy of the topology
//! - `consortium/jws`: every member node's attestation in one general JWS
//! - `get-prometheus-exporter-metrics`: node-count gauge in text exposition

pub mod client;
pub mod error;
pub mod metrics;
pub mod plugin;
pub mod repository;
pub mod web;

pub use client::ConsortiumApiClient;
pub use error::{ConsortiumError, Result};
pub use metrics::{PrometheusExporter, K_CACTUS_CONSORTIUM_MANUAL_TOTAL_NODE_COUNT};
pub use plugin::{
    verify_consortium_jws, ConsortiumManualOptions, NodeJwsPayload, PluginConsortiumManual,
    PACKAGE_NAME,
};
pub use repository::ConsortiumRepository;
