//! sing-box integration.
//!
//! This module handles:
//! - Validating node config names (`info`)
//! - Fetching node share URLs (`url`)
//! - Probing that the helper is installed (`--version`)

pub mod client;

pub use client::{NodeFetch, SingBoxCli};
