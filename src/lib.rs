//! Keel - a stateless weighted-failover HTTP reverse proxy load balancer.
//!
//! Keel sits at the edge in front of one or more backend services, routing
//! each inbound request to one of several configured origins by weighted
//! random selection and failing over automatically from a primary pool to
//! a backup pool. This library exposes the engine building blocks so you
//! can embed the balancer or compose parts of it inside your own
//! application.
//!
//! # Features
//! - Weighted random origin selection with per-request failover state
//! - Primary/backup pool partitioning with self-proxy exclusion
//! - Per-attempt timeouts with attempt-scoped cancellation
//! - Hop-by-hop header sanitation on both proxy legs
//! - `Set-Cookie` forwarding that preserves multiplicity
//! - Redirect `Location` rewriting to the proxy's serving identity
//! - Read-only `/health` and `/_lb/stats` introspection endpoints
//! - Structured tracing via `tracing` and graceful shutdown
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use keel::{HttpHandler, OriginClientAdapter, config::ProxyConfig};
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! // Load a configuration (see `keel init` for a template)
//! let cfg: ProxyConfig = keel::config::loader::load_config("config.toml").await?;
//! let client = Arc::new(OriginClientAdapter::new()?);
//! let handler = Arc::new(HttpHandler::new(Arc::new(cfg), client));
//! // You would normally wire this into an axum router (see the binary crate)
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations)
//! while keeping the routing-and-failover engine inside `core`. End users
//! should prefer the re‑exports documented below instead of reaching into
//! internal modules directly.
//!
//! # Error Handling
//! All fallible APIs return `eyre::Result<T>` or a domain specific error
//! type. The engine itself never terminates abnormally for expected
//! operational failures (origin down, origin slow); it always returns a
//! defined result value.
//!
//! # Concurrency
//! Each inbound request is handled by one independent task. The origin list
//! is read-only and shared; everything else is request-scoped, so the
//! engine needs no locks.
//!
//! # License
//! Licensed under Apache-2.0.
// Re-export public modules with explicit visibility controls
pub mod config;
pub mod tracing_setup;
pub mod utils;

// These modules are implementation details and should not be directly used by users
pub mod adapters;
pub mod core;
pub mod ports;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{HttpHandler, OriginClientAdapter},
    core::{
        AttemptExecutor, FailoverDriver, Origin, OriginPools, ProxyError, RequestContext,
        ResponseTransformer, WeightedSelector,
    },
    ports::http_client::OriginClient,
    utils::GracefulShutdown,
};
