//! Common test utilities for E2E tests

#![allow(dead_code)]

use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use fedcore::data::Actor;
use fedcore::federation::{KeyPair, generate_key_pair, sign_request};
use fedcore::{AppState, config};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test configuration: local http domain, private networks allowed so
/// mock peers on 127.0.0.1 can be dereferenced, fast queue settings.
pub fn test_config(db_path: std::path::PathBuf) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            domain: "localhost".to_string(),
            protocol: "http".to_string(),
        },
        database: config::DatabaseConfig { path: db_path },
        federation: config::FederationConfig {
            key_bits: 2048,
            user_agent: "fedcore-test".to_string(),
            request_timeout_secs: 5,
            delivery_concurrency: 4,
            prefer_shared_inbox: false,
            allow_private_networks: true,
            profile_ttl_secs: 86_400,
            key_cache_ttl_secs: 3_600,
        },
        queue: config::QueueConfig {
            max_attempts: 3,
            base_backoff_secs: 1,
            max_backoff_secs: 60,
            poll_interval_ms: 50,
            batch_size: 16,
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    ///
    /// The job worker is not started; tests drive it with `run_jobs`.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path().join("test.db"));

        let state = AppState::new(config).await.unwrap();

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = fedcore::build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: format!("http://{}", addr),
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    pub async fn create_actor(&self, handle: &str) -> Actor {
        self.state
            .directory
            .create_local_actor("owner", handle, None, None)
            .await
            .unwrap()
    }

    /// Run one batch of due jobs
    pub async fn run_jobs(&self) -> usize {
        self.state.worker.run_once().await.unwrap()
    }

    /// Make every pending job due now, skipping backoff
    pub async fn expedite_jobs(&self) {
        let pending = self
            .state
            .db
            .get_jobs_by_status(fedcore::data::JobStatus::Pending, 100)
            .await
            .unwrap();
        for job in pending {
            self.state
                .db
                .reschedule_job(&job.id, 0, job.last_error.as_deref().unwrap_or(""))
                .await
                .unwrap();
        }
    }
}

/// A request received by a mock peer inbox
#[derive(Debug, Clone)]
pub struct Received {
    pub actor: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Received {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

struct PeerState {
    base: String,
    keys: HashMap<String, KeyPair>,
    received: Mutex<Vec<Received>>,
    failing: Mutex<HashSet<String>>,
}

/// An in-process remote server hosting actors on 127.0.0.1
pub struct MockPeer {
    pub base: String,
    state: Arc<PeerState>,
}

impl MockPeer {
    pub async fn start(actors: &[&str]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let keys = actors
            .iter()
            .map(|name| (name.to_string(), generate_key_pair(1024).unwrap()))
            .collect();
        let state = Arc::new(PeerState {
            base: base.clone(),
            keys,
            received: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        });

        let app = Router::new()
            .route("/users/:name", get(peer_actor))
            .route("/users/:name/inbox", post(peer_inbox))
            .route("/users/:name/followers", get(peer_followers))
            .with_state(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base, state }
    }

    pub fn actor_uri(&self, name: &str) -> String {
        format!("{}/users/{}", self.base, name)
    }

    pub fn key_id(&self, name: &str) -> String {
        format!("{}#main-key", self.actor_uri(name))
    }

    /// Make an actor's inbox answer 500
    pub fn set_failing(&self, name: &str, failing: bool) {
        let mut set = self.state.failing.lock().unwrap();
        if failing {
            set.insert(name.to_string());
        } else {
            set.remove(name);
        }
    }

    pub fn received_by(&self, name: &str) -> Vec<Received> {
        self.state
            .received
            .lock()
            .unwrap()
            .iter()
            .filter(|received| received.actor == name)
            .cloned()
            .collect()
    }

    /// POST an activity signed by one of this peer's actors
    pub async fn post_signed(
        &self,
        client: &reqwest::Client,
        url: &str,
        name: &str,
        activity: &Value,
    ) -> reqwest::Response {
        let body = serde_json::to_vec(activity).unwrap();
        let headers = sign_request(
            "POST",
            url,
            &body,
            &self.state.keys[name].private_key_pem,
            &self.key_id(name),
        )
        .unwrap();

        client
            .post(url)
            .header("Host", headers.host)
            .header("Date", headers.date)
            .header("Digest", headers.digest)
            .header("Signature", headers.signature)
            .header("Content-Type", "application/activity+json")
            .body(body)
            .send()
            .await
            .unwrap()
    }
}

fn activity_json(document: Value) -> Response {
    (
        [(header::CONTENT_TYPE, "application/activity+json")],
        document.to_string(),
    )
        .into_response()
}

async fn peer_actor(State(state): State<Arc<PeerState>>, Path(name): Path<String>) -> Response {
    let Some(keys) = state.keys.get(&name) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let uri = format!("{}/users/{}", state.base, name);
    activity_json(json!({
        "@context": ["https://www.w3.org/ns/activitystreams", "https://w3id.org/security/v1"],
        "id": uri,
        "type": "Person",
        "preferredUsername": name,
        "inbox": format!("{}/inbox", uri),
        "followers": format!("{}/followers", uri),
        "publicKey": {
            "id": format!("{}#main-key", uri),
            "owner": uri,
            "publicKeyPem": keys.public_key_pem
        }
    }))
}

async fn peer_inbox(
    State(state): State<Arc<PeerState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    state.received.lock().unwrap().push(Received {
        actor: name.clone(),
        headers,
        body: body.to_vec(),
    });
    if state.failing.lock().unwrap().contains(&name) {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::ACCEPTED
    }
}

async fn peer_followers(State(state): State<Arc<PeerState>>, Path(name): Path<String>) -> Response {
    activity_json(json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "id": format!("{}/users/{}/followers", state.base, name),
        "type": "OrderedCollection",
        "totalItems": 0,
        "orderedItems": []
    }))
}
