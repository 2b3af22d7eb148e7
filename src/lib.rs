//! Proxy subscription service.
//!
//! Builds a subscription from the node configs managed by the local sing-box
//! helper, converts it to Clash format through subconverter, and serves the
//! results over HTTP.
//!
//! # Update cycle
//!
//! ```text
//! subconverter /version ──► down? 503, nothing written
//!         │
//! sing-box info/url <name> (per config, in order)
//!         │
//! no URLs? 400 with per-config errors
//!         │
//! raw_links.txt + subscription.txt (base64)
//!         │
//! subconverter /sub?target=clash ──► clash.yaml (failure is non-fatal)
//!         │
//! backup/subscription_<YYYYMMDD_HHMMSS>.txt
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`singbox`]: sing-box helper subprocess client
//! - [`subconverter`]: subconverter HTTP client
//! - [`subscription`]: Update cycle, status, artifact storage, scheduler
//! - [`api`]: HTTP API
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod singbox;
pub mod subconverter;
pub mod subscription;
pub mod utils;

#[cfg(test)]
pub(crate) mod testutils;

pub use config::Config;
pub use error::{AppError, Result};
