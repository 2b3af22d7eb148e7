//! The update cycle and status inspection.

use std::time::Instant;

use chrono::{Local, SecondsFormat};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::error::UpdateError;
use crate::metrics;
use crate::singbox::SingBoxCli;
use crate::subconverter::{SubconverterClient, Target};

use super::artifacts::{Artifact, ArtifactStore};

/// Result of a successful update.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateSummary {
    /// Always true.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Completion time, RFC 3339 local.
    pub timestamp: String,
    /// Number of node URLs written.
    pub nodes_count: usize,
    /// Whether clash.yaml was regenerated.
    pub clash_generated: bool,
    /// Path of the backup copy.
    pub backup_created: String,
    /// Per-config failures that did not stop the update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

/// Snapshot of artifact and dependency state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    /// `subscription.txt` is present.
    pub subscription_exists: bool,
    /// `clash.yaml` is present.
    pub clash_exists: bool,
    /// `raw_links.txt` is present.
    pub raw_exists: bool,
    /// subconverter answered `/version`.
    pub subconverter_running: bool,
    /// The sing-box helper could be executed.
    pub sing_box_accessible: bool,
    /// Local modification time of `subscription.txt`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_last_updated: Option<String>,
    /// Size of `subscription.txt` in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_size: Option<u64>,
    /// Local modification time of `clash.yaml`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clash_last_updated: Option<String>,
    /// Size of `clash.yaml` in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clash_size: Option<u64>,
    /// Non-blank lines in `raw_links.txt`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes_count: Option<usize>,
}

/// Runs update cycles against sing-box, subconverter and the artifact store.
#[derive(Debug, Clone)]
pub struct SubscriptionService {
    cli: SingBoxCli,
    converter: SubconverterClient,
    store: ArtifactStore,
    callback_url: String,
}

impl SubscriptionService {
    /// Create a service from config.
    pub fn new(config: &Config) -> Self {
        Self::from_parts(
            SingBoxCli::new(config),
            SubconverterClient::new(config),
            ArtifactStore::new(config.static_dir.clone(), config.backup_dir()),
            config.callback_url(),
        )
    }

    /// Assemble a service from already-built collaborators.
    pub fn from_parts(
        cli: SingBoxCli,
        converter: SubconverterClient,
        store: ArtifactStore,
        callback_url: String,
    ) -> Self {
        Self {
            cli,
            converter,
            store,
            callback_url,
        }
    }

    /// Artifact store.
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run one update cycle for `names`.
    ///
    /// Nothing is written unless subconverter is reachable and at least one
    /// config produced a URL. A failed conversion does not fail the update.
    #[instrument(skip_all, fields(configs = names.len()))]
    pub async fn update(&self, names: &[String]) -> Result<UpdateSummary, UpdateError> {
        let start = Instant::now();
        metrics::inc_update_runs();
        info!("starting subscription update");

        let result = self.run_update(names).await;

        metrics::record_update_duration(start);
        if let Err(e) = &result {
            metrics::inc_update_failures(match e {
                UpdateError::ConverterUnavailable => "converter_unavailable",
                UpdateError::NoNodes { .. } => "no_nodes",
                UpdateError::Io(_) => "io",
            });
        }
        result
    }

    async fn run_update(&self, names: &[String]) -> Result<UpdateSummary, UpdateError> {
        if !self.converter.is_running().await {
            error!("subconverter is not running, aborting update");
            return Err(UpdateError::ConverterUnavailable);
        }

        let fetch = self.cli.fetch_urls(names).await;

        if fetch.urls.is_empty() {
            error!(errors = ?fetch.errors, "no nodes retrieved");
            return Err(UpdateError::NoNodes {
                details: fetch.errors,
            });
        }

        let raw = fetch.urls.join("\n");
        self.store.write_subscription(&raw).await?;

        let clash_generated = self.generate_clash().await;

        let now = Local::now();
        let backup = self.store.backup(&now).await?;

        let nodes_count = fetch.urls.len();
        info!(nodes_count, clash_generated, "subscription update complete");

        Ok(UpdateSummary {
            success: true,
            message: format!("subscription updated with {} nodes", nodes_count),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, false),
            nodes_count,
            clash_generated,
            backup_created: backup.display().to_string(),
            warnings: (!fetch.errors.is_empty()).then_some(fetch.errors),
        })
    }

    /// Ask subconverter for a Clash config and store it. Failures are logged.
    async fn generate_clash(&self) -> bool {
        let body = match self.converter.convert(Target::Clash, &self.callback_url).await {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "clash conversion failed");
                metrics::inc_conversions("failed");
                return false;
            }
        };

        match self.store.write_clash(&body).await {
            Ok(()) => {
                info!("clash config generated");
                metrics::inc_conversions("ok");
                true
            }
            Err(e) => {
                error!(error = %e, "failed to write clash config");
                metrics::inc_conversions("failed");
                false
            }
        }
    }

    /// Inspect artifacts and dependencies without changing anything.
    pub async fn status(&self) -> std::io::Result<StatusReport> {
        let (subconverter_running, sing_box_accessible) =
            tokio::join!(self.converter.is_running(), self.cli.is_accessible());

        let mut report = StatusReport {
            subconverter_running,
            sing_box_accessible,
            ..StatusReport::default()
        };

        if let Some(meta) = self.store.metadata(Artifact::Subscription).await? {
            report.subscription_exists = true;
            report.subscription_last_updated = Some(meta.modified.to_rfc3339());
            report.subscription_size = Some(meta.size);
        }

        if let Some(meta) = self.store.metadata(Artifact::Clash).await? {
            report.clash_exists = true;
            report.clash_last_updated = Some(meta.modified.to_rfc3339());
            report.clash_size = Some(meta.size);
        }

        report.nodes_count = self.store.node_count().await?;
        report.raw_exists = report.nodes_count.is_some();

        if !sing_box_accessible {
            warn!(program = self.cli.program(), "sing-box is not accessible");
        }

        Ok(report)
    }
}
