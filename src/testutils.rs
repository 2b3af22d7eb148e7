//! Test doubles for sing-box and subconverter.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use crate::singbox::SingBoxCli;

/// Write a shell script that behaves like the sing-box helper and return a
/// client that runs it through `sh`.
///
/// Configs listed in `nodes` exist; everything else fails `info`.
pub fn fake_sing_box(dir: &Path, nodes: &[(&str, &str)]) -> SingBoxCli {
    let mut script = String::from(
        "case \"$1\" in\n  --version) echo 'sing-box version 1.8.0'; exit 0 ;;\n",
    );

    script.push_str("  info)\n    case \"$2\" in\n");
    if !nodes.is_empty() {
        let known: Vec<String> = nodes.iter().map(|(name, _)| format!("'{name}'")).collect();
        script.push_str(&format!("      {}) exit 0 ;;\n", known.join("|")));
    }
    script.push_str("      *) echo \"config $2 not found\" >&2; exit 1 ;;\n    esac ;;\n");

    script.push_str("  url)\n    case \"$2\" in\n");
    for (name, url) in nodes {
        script.push_str(&format!("      '{name}') printf '%s\\n' '{url}' ;;\n"));
    }
    script.push_str("      *) echo 'unknown config' >&2; exit 1 ;;\n    esac ;;\n");
    script.push_str("esac\n");

    let path = dir.join("sing-box.sh");
    std::fs::write(&path, script).expect("write fake sing-box");
    SingBoxCli::with_program("sh", vec![path.display().to_string()])
}

/// In-process subconverter stand-in.
pub struct StubConverter {
    /// Base URL to hand to the client.
    pub base_url: String,
    /// Query parameters of every `/sub` request received.
    pub requests: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

#[derive(Clone)]
struct StubState {
    status: StatusCode,
    body: String,
    requests: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

async fn stub_version() -> &'static str {
    "subconverter v0.9.0 backend"
}

async fn stub_sub(
    State(state): State<StubState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    state.requests.lock().expect("stub lock").push(params);
    (state.status, state.body.clone())
}

/// Start a subconverter stub that answers `/sub` with `status` and `body`.
pub async fn spawn_converter(status: StatusCode, body: &str) -> StubConverter {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = StubState {
        status,
        body: body.to_string(),
        requests: requests.clone(),
    };

    let router = Router::new()
        .route("/version", get(stub_version))
        .route("/sub", get(stub_sub))
        .with_state(state);

    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    StubConverter {
        base_url: format!("http://{addr}"),
        requests,
    }
}

/// A base URL nothing is listening on.
pub async fn dead_converter_url() -> String {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .expect("bind probe");
    let addr = listener.local_addr().expect("probe addr");
    drop(listener);
    format!("http://{addr}")
}
