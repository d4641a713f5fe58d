//! Mock player control API
//!
//! Answers `/<module>?arg0=<function>&...` requests with canned XML and
//! records every request path for later inspection.

use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

pub const OK_REPLY: &str = "<theDavidBox><returnValue>0</returnValue></theDavidBox>";

#[derive(Debug, Default)]
pub struct MockDeviceState {
    /// Request paths with query, in arrival order
    pub requests: Vec<String>,
    /// Canned replies keyed by function name (`arg0`)
    pub replies: HashMap<String, (StatusCode, String)>,
}

pub struct MockDevice {
    addr: SocketAddr,
    state: Arc<RwLock<MockDeviceState>>,
    handle: JoinHandle<()>,
}

impl MockDevice {
    /// Start a mock device on a random port
    pub async fn start() -> Self {
        let state = Arc::new(RwLock::new(MockDeviceState::default()));

        let app = Router::new()
            .route("/:module", get(handle_call))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Reply to `function` with status 200 and the given XML
    pub async fn reply(&self, function: &str, xml: &str) {
        self.reply_with_status(function, StatusCode::OK, xml).await;
    }

    pub async fn reply_with_status(&self, function: &str, status: StatusCode, body: &str) {
        self.state
            .write()
            .await
            .replies
            .insert(function.to_string(), (status, body.to_string()));
    }

    pub async fn requests(&self) -> Vec<String> {
        self.state.read().await.requests.clone()
    }

    /// Stop the mock server
    pub async fn stop(self) {
        self.handle.abort();
    }
}

async fn handle_call(
    State(state): State<Arc<RwLock<MockDeviceState>>>,
    Path(module): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let query = query.unwrap_or_default();
    let function = url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "arg0")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default();

    let mut state = state.write().await;
    state.requests.push(format!("{}?{}", module, query));

    match state.replies.get(&function) {
        Some((status, body)) => (*status, body.clone()).into_response(),
        None => (StatusCode::OK, OK_REPLY).into_response(),
    }
}
