//! On-disk subscription artifacts.
//!
//! Layout under the static directory:
//!
//! ```text
//! subscription.txt                       base64 of raw_links.txt
//! raw_links.txt                          node URLs, one per line
//! clash.yaml                             subconverter output
//! backup/subscription_<stamp>.txt        copy of subscription.txt per update
//! ```
//!
//! Writes are not synchronised; concurrent updates are last-writer-wins.

use std::io;
use std::path::PathBuf;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Local};
use strum::Display;
use tokio::fs;
use tracing::debug;

/// Encoded subscription file name.
pub const SUBSCRIPTION_FILE: &str = "subscription.txt";
/// Raw node list file name.
pub const RAW_FILE: &str = "raw_links.txt";
/// Clash config file name.
pub const CLASH_FILE: &str = "clash.yaml";

/// Timestamp format used in backup file names.
const BACKUP_STAMP: &str = "%Y%m%d_%H%M%S";

/// A generated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Artifact {
    /// Base64 subscription.
    Subscription,
    /// Raw node URLs.
    Raw,
    /// Clash YAML.
    Clash,
}

impl Artifact {
    /// File name inside the static directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Artifact::Subscription => SUBSCRIPTION_FILE,
            Artifact::Raw => RAW_FILE,
            Artifact::Clash => CLASH_FILE,
        }
    }

    /// Content type used when serving the file.
    pub fn content_type(self) -> &'static str {
        match self {
            Artifact::Subscription | Artifact::Raw => "text/plain; charset=utf-8",
            Artifact::Clash => "text/yaml; charset=utf-8",
        }
    }

    /// Message returned when the file is absent.
    pub fn missing_message(self) -> &'static str {
        match self {
            Artifact::Subscription => {
                "subscription file does not exist, run an update first"
            }
            Artifact::Clash => "clash config file does not exist, run an update first",
            Artifact::Raw => "raw links file does not exist",
        }
    }
}

/// Size and modification time of an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMeta {
    /// Last modification, local time.
    pub modified: DateTime<Local>,
    /// Size in bytes.
    pub size: u64,
}

/// Base64-encode a raw subscription (standard alphabet, padded).
pub fn encode_subscription(raw: &str) -> String {
    general_purpose::STANDARD.encode(raw.as_bytes())
}

/// Decode an encoded subscription back to raw bytes.
pub fn decode_subscription(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    general_purpose::STANDARD.decode(encoded.trim())
}

/// Count non-blank lines.
pub fn count_nodes(raw: &str) -> usize {
    raw.lines().filter(|line| !line.trim().is_empty()).count()
}

/// Backup file name for a point in time.
pub fn backup_file_name(at: &DateTime<Local>) -> String {
    format!("subscription_{}.txt", at.format(BACKUP_STAMP))
}

/// Reads and writes artifacts under a static directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    static_dir: PathBuf,
    backup_dir: PathBuf,
}

impl ArtifactStore {
    /// Create a store.
    pub fn new(static_dir: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            static_dir: static_dir.into(),
            backup_dir: backup_dir.into(),
        }
    }

    /// Full path of an artifact.
    pub fn path(&self, artifact: Artifact) -> PathBuf {
        self.static_dir.join(artifact.file_name())
    }

    /// Write `raw_links.txt` and its base64 form `subscription.txt`.
    pub async fn write_subscription(&self, raw: &str) -> io::Result<()> {
        fs::create_dir_all(&self.static_dir).await?;
        fs::write(self.path(Artifact::Subscription), encode_subscription(raw)).await?;
        fs::write(self.path(Artifact::Raw), raw).await?;
        debug!(dir = %self.static_dir.display(), "subscription written");
        Ok(())
    }

    /// Write the converted Clash config.
    pub async fn write_clash(&self, body: &str) -> io::Result<()> {
        fs::create_dir_all(&self.static_dir).await?;
        fs::write(self.path(Artifact::Clash), body).await
    }

    /// Copy `subscription.txt` into the backup directory.
    pub async fn backup(&self, at: &DateTime<Local>) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.backup_dir).await?;
        let target = self.backup_dir.join(backup_file_name(at));
        fs::copy(self.path(Artifact::Subscription), &target).await?;
        debug!(path = %target.display(), "backup created");
        Ok(target)
    }

    /// Whether an artifact exists.
    pub async fn exists(&self, artifact: Artifact) -> io::Result<bool> {
        fs::try_exists(self.path(artifact)).await
    }

    /// Size and mtime, or `None` if the file is absent.
    pub async fn metadata(&self, artifact: Artifact) -> io::Result<Option<ArtifactMeta>> {
        match fs::metadata(self.path(artifact)).await {
            Ok(meta) => Ok(Some(ArtifactMeta {
                modified: DateTime::<Local>::from(meta.modified()?),
                size: meta.len(),
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// File contents, or `None` if the file is absent.
    pub async fn read(&self, artifact: Artifact) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path(artifact)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Number of non-blank lines in `raw_links.txt`, if it exists.
    pub async fn node_count(&self) -> io::Result<Option<usize>> {
        Ok(self
            .read(Artifact::Raw)
            .await?
            .map(|bytes| count_nodes(&String::from_utf8_lossy(&bytes))))
    }
}
