//! Application configuration loaded from environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::AppError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === sing-box ===
    /// Node configuration names queried on every update, in order.
    #[serde(default = "default_sing_box_configs")]
    pub sing_box_configs: Vec<String>,

    /// sing-box helper executable (name on PATH or absolute path).
    #[serde(default = "default_sing_box_bin")]
    pub sing_box_bin: String,

    // === subconverter ===
    /// Base URL of the subconverter service.
    #[serde(default = "default_subconverter_url")]
    pub subconverter_url: String,

    /// Conversion request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Retry budget for external calls. Read but not applied.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Port of the static file server subconverter fetches the subscription from.
    #[serde(default = "default_nginx_port")]
    pub nginx_port: u16,

    // === Storage ===
    /// Directory holding the generated artifacts.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Backup directory. Defaults to `<static_dir>/backup`.
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,

    /// Directory for the rolling log file.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    // === Server ===
    /// HTTP listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Default log filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Run the update cycle on this interval. Zero disables it.
    #[serde(default = "default_auto_update_interval_secs")]
    pub auto_update_interval_secs: u64,
}

fn default_sing_box_configs() -> Vec<String> {
    ["vless-reality", "hysteria2", "trojan", "tuic", "vmess"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_sing_box_bin() -> String {
    "sing-box".to_string()
}

fn default_subconverter_url() -> String {
    "http://localhost:25500".to_string()
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_nginx_port() -> u16 {
    8080
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_port() -> u16 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_auto_update_interval_secs() -> u64 {
    7200
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sing_box_configs: default_sing_box_configs(),
            sing_box_bin: default_sing_box_bin(),
            subconverter_url: default_subconverter_url(),
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
            nginx_port: default_nginx_port(),
            static_dir: default_static_dir(),
            backup_dir: None,
            log_dir: default_log_dir(),
            port: default_port(),
            log_level: default_log_level(),
            auto_update_interval_secs: default_auto_update_interval_secs(),
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env::<Self>().map(Self::normalized)
    }

    /// Load configuration from explicit key/value pairs.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter::<_, Self>(pairs).map(Self::normalized)
    }

    /// Trim config names and drop blanks left by stray commas.
    fn normalized(mut self) -> Self {
        self.sing_box_configs = self
            .sing_box_configs
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect();
        self.subconverter_url = self.subconverter_url.trim_end_matches('/').to_string();
        self
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.sing_box_configs.is_empty() {
            return Err("SING_BOX_CONFIGS must name at least one config".to_string());
        }

        match Url::parse(&self.subconverter_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(format!(
                    "SUBCONVERTER_URL must use http or https, got {}",
                    url.scheme()
                ))
            }
            Err(e) => return Err(format!("SUBCONVERTER_URL is not a valid URL: {}", e)),
        }

        if self.request_timeout == 0 {
            return Err("REQUEST_TIMEOUT must be greater than 0".to_string());
        }

        if self.sing_box_bin.trim().is_empty() {
            return Err("SING_BOX_BIN must not be empty".to_string());
        }

        Ok(())
    }

    /// Validate, converting a failure into [`AppError::InvalidConfig`].
    pub fn validated(self) -> crate::Result<Self> {
        self.validate().map_err(AppError::InvalidConfig)?;
        Ok(self)
    }

    /// Effective backup directory.
    pub fn backup_dir(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| self.static_dir.join("backup"))
    }

    /// Directory for log files.
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Conversion request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }

    /// URL subconverter uses to fetch the freshly written subscription.
    pub fn callback_url(&self) -> String {
        format!("http://localhost:{}/subscription.txt", self.nginx_port)
    }

    /// Periodic update interval, if enabled.
    pub fn auto_update_interval(&self) -> Option<Duration> {
        (self.auto_update_interval_secs > 0)
            .then(|| Duration::from_secs(self.auto_update_interval_secs))
    }
}
