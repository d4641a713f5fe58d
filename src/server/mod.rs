//! HTTP front end: runs configured commands and serves the html remote pages.
//!
//! `GET /command?id=shutdown` stops the server. It is unauthenticated, like
//! every other command; anyone who can reach the port can stop it.
//!
//! A command that never returns blocks its request (and every later command,
//! since executions are serialized) indefinitely; there is no timeout.

use async_trait::async_trait;
use axum::{
    extract::{RawQuery, State},
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};

use crate::config::{CommandTable, ServerConfig};

/// Reserved command id that stops the server
pub const SHUTDOWN_COMMAND: &str = "shutdown";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Executes a shell line, discarding whatever it prints
#[async_trait]
pub trait ShellRunner: Send + Sync {
    /// `Err` only when the shell itself could not be run; the exit status of
    /// the command is not reported.
    async fn run(&self, line: &str) -> std::io::Result<()>;
}

/// Runs lines through `sh -c`
pub struct SystemShell;

#[async_trait]
impl ShellRunner for SystemShell {
    async fn run(&self, line: &str) -> std::io::Result<()> {
        // Output goes to /dev/null rather than a pipe so backgrounded
        // commands (suffix " &") don't keep us waiting on an open stdout.
        let status = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(line)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        log::debug!("'{}' exited with {}", line, status);
        Ok(())
    }
}

#[derive(Clone)]
pub struct AppState {
    table: Arc<CommandTable>,
    root: Arc<PathBuf>,
    runner: Arc<dyn ShellRunner>,
    exec_lock: Arc<Mutex<()>>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl AppState {
    pub fn new(config: ServerConfig, runner: Arc<dyn ShellRunner>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            table: Arc::new(config.table),
            root: Arc::new(PathBuf::from(config.base_dir)),
            runner,
            exec_lock: Arc::new(Mutex::new(())),
            shutdown: Arc::new(shutdown),
        }
    }

    pub fn request_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves once a shutdown has been requested
    pub fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.shutdown.subscribe();
        async move {
            let _ = rx.wait_for(|stop| *stop).await;
        }
    }
}

/// `id` and `arg` values of a `/command` query. Blank values are dropped.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CommandQuery {
    pub id: Option<String>,
    pub args: Vec<String>,
}

impl CommandQuery {
    pub fn parse(query: &str) -> Self {
        let mut parsed = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "id" if parsed.id.is_none() => parsed.id = Some(value.into_owned()),
                "arg" => parsed.args.push(value.into_owned()),
                _ => {}
            }
        }
        parsed
    }
}

/// Map a request path to an html file under `root`. `/` is `index.html`;
/// anything that is not `.htm`/`.html` or tries to leave `root` is refused.
pub fn resolve_page(root: &Path, request_path: &str) -> Option<PathBuf> {
    if request_path == "/" {
        return Some(root.join("index.html"));
    }
    if !(request_path.ends_with(".htm") || request_path.ends_with(".html")) {
        return None;
    }

    let decoded = urlencoding::decode(request_path).ok()?;
    let relative = Path::new(decoded.trim_start_matches('/'));
    if relative
        .components()
        .any(|component| !matches!(component, Component::Normal(_)))
    {
        return None;
    }
    Some(root.join(relative))
}

// Route documentation - keep this in sync with the actual routes
const ROUTES: &[(&str, &str, &str)] = &[
    ("GET", "/command?id=<id>[&arg=..]", "Run a configured command"),
    ("GET", "/command?id=shutdown", "Stop the server"),
    ("GET", "/", "Serve index.html"),
    ("GET", "/<page>.html", "Serve an html page"),
];

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/command",
            get(command_handler)
                .head(not_found)
                .post(post_handler)
                .fallback(not_found),
        )
        .fallback(fallback_handler)
        .with_state(state)
}

/// Start the command server on the configured port
pub async fn start_server(config: ServerConfig) -> Result<(), ServerError> {
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

    println!("\n=== PCH Remote Server v{} ===", env!("CARGO_PKG_VERSION"));
    println!("Listening on http://{}", addr);
    if !config.base_dir.is_empty() {
        println!("Serving pages from {}", config.base_dir);
    }
    println!("{} command(s) configured", config.table.len());
    println!("\nEndpoints:");
    for (method, path, description) in ROUTES {
        println!("  {:<6} {:<30} - {}", method, path, description);
    }
    println!("\nPress Ctrl+C to stop the server\n");

    let state = AppState::new(config, Arc::new(SystemShell));

    let on_interrupt = state.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Shutting down server...");
            on_interrupt.request_shutdown();
        }
    });

    serve(listener, state).await
}

/// Serve requests until a shutdown is requested. Responses in flight when
/// that happens are still delivered.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> Result<(), ServerError> {
    let stop = state.shutdown_signal();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(stop)
        .await?;
    log::info!("Server stopped");
    Ok(())
}

async fn command_handler(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
    let query = CommandQuery::parse(query.as_deref().unwrap_or_default());
    log::debug!("Command request: {:?}", query);

    let id = match query.id {
        Some(id) => id,
        None => return (StatusCode::BAD_REQUEST, "No command id").into_response(),
    };

    if id == SHUTDOWN_COMMAND {
        log::info!("Shutdown requested...");
        state.request_shutdown();
        return StatusCode::NO_CONTENT.into_response();
    }

    let command = match state.table.get(&id) {
        Some(command) => command,
        None => {
            let message = format!("{} is not supported", id);
            return (StatusCode::METHOD_NOT_ALLOWED, message).into_response();
        }
    };

    let line = state.table.invocation(command, &query.args);
    let _running = state.exec_lock.lock().await;
    match state.runner.run(&line).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            log::warn!("Failed to run command '{}': {}", id, e);
            StatusCode::FAILED_DEPENDENCY.into_response()
        }
    }
}

/// POST is accepted and ignored
async fn post_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn fallback_handler(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    match method {
        Method::POST => post_handler().await.into_response(),
        Method::GET => page_handler(&state.root, uri.path()).await,
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn page_handler(root: &Path, request_path: &str) -> Response {
    let path = match resolve_page(root, request_path) {
        Some(path) => path,
        None => return StatusCode::NOT_FOUND.into_response(),
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            (StatusCode::OK, [(header::CONTENT_TYPE, "text/html")], bytes).into_response()
        }
        Err(e) => {
            log::debug!("Cannot serve {}: {}", path.display(), e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
