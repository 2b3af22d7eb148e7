//! Integration tests against a real sing-box helper and subconverter.
//!
//! These tests require both tools to be installed and running, configured via
//! the usual environment variables (SING_BOX_CONFIGS, SUBCONVERTER_URL, ...).
//! Run with: cargo test --test integration -- --ignored

use subscription_api::config::Config;
use subscription_api::singbox::SingBoxCli;
use subscription_api::subconverter::SubconverterClient;
use subscription_api::subscription::{Artifact, SubscriptionService};

/// Load config from the environment, pointing artifacts at `dir`.
fn test_config(dir: &std::path::Path) -> Config {
    let mut config = Config::load().expect("configuration loads from environment");
    config.static_dir = dir.join("data");
    config.backup_dir = None;
    config
}

/// Test that subconverter answers its version endpoint.
#[tokio::test]
#[ignore = "requires a running subconverter"]
async fn test_subconverter_version() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let client = SubconverterClient::new(&config);

    let version = client.version().await;
    assert!(version.is_ok(), "Failed to get version: {:?}", version.err());

    println!("subconverter: {}", version.unwrap());
}

/// Test that the sing-box helper is installed.
#[tokio::test]
#[ignore = "requires the sing-box helper"]
async fn test_sing_box_accessible() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    assert!(SingBoxCli::new(&config).is_accessible().await);
}

/// Test that every configured node yields a URL.
#[tokio::test]
#[ignore = "requires the sing-box helper"]
async fn test_fetch_configured_nodes() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let cli = SingBoxCli::new(&config);

    let fetch = cli.fetch_urls(&config.sing_box_configs).await;

    println!("Fetched {} urls", fetch.urls.len());
    for error in &fetch.errors {
        println!("  - {}", error);
    }
    assert!(!fetch.urls.is_empty(), "no config produced a url");
}

/// Test a full update cycle.
#[tokio::test]
#[ignore = "requires sing-box and subconverter"]
async fn test_full_update() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let service = SubscriptionService::new(&config);

    let result = service.update(&config.sing_box_configs).await;
    assert!(result.is_ok(), "Update failed: {:?}", result.err());

    let summary = result.unwrap();
    assert!(summary.nodes_count > 0);
    assert!(service.store().exists(Artifact::Subscription).await.unwrap());
    assert!(service.store().exists(Artifact::Raw).await.unwrap());

    let status = service.status().await.unwrap();
    assert_eq!(status.nodes_count, Some(summary.nodes_count));

    println!("{}", serde_json::to_string_pretty(&summary).unwrap());
}
