//! sing-box helper CLI wrapper.
//!
//! Every call is a short-lived subprocess bounded by a timeout. A child that
//! outlives its timeout is killed when its handle is dropped.

use std::process::{Output, Stdio};
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::NodeError;
use crate::metrics;

/// Timeout for `info` and `url` calls.
const CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the `--version` liveness probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of fetching URLs for a list of config names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeFetch {
    /// Node URLs in config order.
    pub urls: Vec<String>,
    /// One message per config that failed.
    pub errors: Vec<String>,
}

/// Why a subprocess produced no output.
#[derive(Debug)]
enum ExecFailure {
    Timeout(Duration),
    Io(std::io::Error),
}

/// Client for the local sing-box helper script.
#[derive(Debug, Clone)]
pub struct SingBoxCli {
    /// Program to spawn.
    program: String,
    /// Arguments placed before the subcommand (e.g. a script path).
    leading_args: Vec<String>,
    /// Timeout for `info`/`url`.
    call_timeout: Duration,
    /// Timeout for `--version`.
    probe_timeout: Duration,
}

impl SingBoxCli {
    /// Create a client from config.
    pub fn new(config: &Config) -> Self {
        Self::with_program(config.sing_box_bin.clone(), Vec::new())
    }

    /// Create a client that spawns `program leading_args.. <subcommand>`.
    pub fn with_program(program: impl Into<String>, leading_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            leading_args,
            call_timeout: CALL_TIMEOUT,
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    /// Override the subprocess timeouts.
    pub fn with_timeouts(mut self, call_timeout: Duration, probe_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self.probe_timeout = probe_timeout;
        self
    }

    /// Program this client spawns.
    pub fn program(&self) -> &str {
        &self.program
    }

    async fn exec(&self, args: &[&str], timeout: Duration) -> Result<Output, ExecFailure> {
        let start = Instant::now();

        let child = Command::new(&self.program)
            .args(&self.leading_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ExecFailure::Io)?;

        let result = tokio::time::timeout(timeout, child.wait_with_output()).await;
        metrics::record_cli_latency(start, args.first().copied().unwrap_or_default());

        match result {
            Ok(output) => output.map_err(ExecFailure::Io),
            Err(_elapsed) => Err(ExecFailure::Timeout(timeout)),
        }
    }

    fn node_error(name: &str, failure: ExecFailure) -> NodeError {
        match failure {
            ExecFailure::Timeout(timeout) => NodeError::Timeout {
                name: name.to_string(),
                timeout,
            },
            ExecFailure::Io(source) => NodeError::Io {
                name: name.to_string(),
                source,
            },
        }
    }

    /// Check that sing-box knows the config.
    #[instrument(skip(self))]
    pub async fn info(&self, name: &str) -> Result<(), NodeError> {
        let output = self
            .exec(&["info", name], self.call_timeout)
            .await
            .map_err(|e| Self::node_error(name, e))?;

        if !output.status.success() {
            debug!(code = ?output.status.code(), "config not found");
            return Err(NodeError::NotFound {
                name: name.to_string(),
            });
        }

        Ok(())
    }

    /// Fetch the share URL for a config.
    #[instrument(skip(self))]
    pub async fn url(&self, name: &str) -> Result<String, NodeError> {
        let output = self
            .exec(&["url", name], self.call_timeout)
            .await
            .map_err(|e| Self::node_error(name, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let url = stdout.trim();

        if !output.status.success() || url.is_empty() {
            return Err(NodeError::Failed {
                name: name.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(url.to_string())
    }

    /// Validate a config and fetch its URL.
    pub async fn node_url(&self, name: &str) -> Result<String, NodeError> {
        self.info(name).await?;
        self.url(name).await
    }

    /// Fetch URLs for every name in order, collecting per-name failures.
    pub async fn fetch_urls(&self, names: &[String]) -> NodeFetch {
        let mut fetch = NodeFetch::default();

        for name in names {
            match self.node_url(name).await {
                Ok(url) => {
                    info!(config = %name, "fetched node url");
                    fetch.urls.push(url);
                }
                Err(e) => {
                    warn!(config = %name, error = %e, "failed to fetch node url");
                    metrics::inc_node_fetch_errors();
                    fetch.errors.push(e.to_string());
                }
            }
        }

        fetch
    }

    /// Whether the sing-box helper can be executed at all.
    ///
    /// A non-zero exit still counts as accessible; only a spawn failure or a
    /// timeout does not.
    pub async fn is_accessible(&self) -> bool {
        match self.exec(&["--version"], self.probe_timeout).await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = ?e, "sing-box probe failed");
                false
            }
        }
    }
}
