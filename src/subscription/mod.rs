//! Subscription generation.
//!
//! This module handles:
//! - The update cycle (fetch nodes, write artifacts, convert, back up)
//! - Status inspection of artifacts and dependencies
//! - Artifact storage and encoding
//! - Periodic background updates

pub mod artifacts;
pub mod scheduler;
pub mod service;

pub use artifacts::{Artifact, ArtifactMeta, ArtifactStore};
pub use scheduler::spawn_auto_update;
pub use service::{StatusReport, SubscriptionService, UpdateSummary};
