//! Client for the player's local control API.
//!
//! Calls are plain HTTP GETs of the form
//! `/<module>?arg0=<function>&arg1=..&argN=..` answered with an XML document
//! carrying a `<returnValue>` and, on success, a `<response>` payload.
//! Arguments are positional on the device side, so their order matters.
//!
//! No operation here returns an error: any transport, HTTP or decode failure
//! collapses to `None` / `false`.

pub mod decode;

use std::collections::HashMap;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8008;

const DEFAULT_TITLE: &str = "Title";

/// Named fields of a `<response>` payload
pub type FieldMap = HashMap<String, String>;

/// Status line and body of one exchange with the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub reason: String,
    /// Present only for 200 responses
    pub body: Option<String>,
}

enum Connection {
    Open {
        http: reqwest::Client,
        base_url: String,
    },
    Closed,
}

/// Wrapper around a single connection to the device API.
///
/// Once closed, a client stays closed and every operation answers
/// "no result" without touching the network.
pub struct DeviceClient {
    connection: Connection,
}

/// Currently playing video, as reported by `get_current_vod_info`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackInfo {
    pub title: Option<String>,
    pub full_path: Option<String>,
    pub current_status: Option<String>,
    pub current_time: Option<String>,
    pub total_time: Option<String>,
}

impl PlaybackInfo {
    pub fn from_fields(fields: &FieldMap) -> Self {
        let field = |name: &str| fields.get(name).cloned();
        Self {
            title: field("title"),
            full_path: field("fullPath"),
            current_status: field("currentStatus"),
            current_time: field("currentTime"),
            total_time: field("totalTime"),
        }
    }
}

/// Percent-encode a query value. Only ASCII letters, digits, `-_./` stay literal.
fn quote(value: &str) -> String {
    urlencoding::encode(value)
        .replace("%2F", "/")
        .replace('~', "%7E")
}

/// Build the request path (without leading slash) for a module function call
pub fn encode_call(module: &str, function: &str, args: &[&str]) -> String {
    let mut path = format!("{}?arg0={}", module, quote(function));
    for (index, arg) in args.iter().enumerate() {
        path.push_str(&format!("&arg{}={}", index + 1, quote(arg)));
    }
    path
}

/// Prefix bare filesystem paths with `file://`; http and file URLs pass through.
pub fn media_url(path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("file://") {
        path.to_string()
    } else {
        format!("file://{}", path)
    }
}

impl DeviceClient {
    /// Create a client for the device API at `host:port`
    pub fn new(host: &str, port: u16) -> Self {
        let connection = match reqwest::Client::builder().pool_max_idle_per_host(1).build() {
            Ok(http) => Connection::Open {
                http,
                base_url: format!("http://{}:{}", host, port),
            },
            Err(e) => {
                log::warn!("Failed to create HTTP client for {}:{}: {}", host, port, e);
                Connection::Closed
            }
        };
        Self { connection }
    }

    /// Client for the API of the device this process runs on
    pub fn local() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }

    pub fn is_open(&self) -> bool {
        matches!(self.connection, Connection::Open { .. })
    }

    /// Close the connection. Further calls answer "no result".
    pub fn close(&mut self) {
        if self.is_open() {
            log::debug!("Closing device API connection");
        }
        self.connection = Connection::Closed;
    }

    /// Issue one GET against the device
    async fn api(&self, path: &str) -> Option<RawResponse> {
        let (http, base_url) = match &self.connection {
            Connection::Open { http, base_url } => (http, base_url),
            Connection::Closed => return None,
        };

        let url = format!("{}/{}", base_url, path);
        log::debug!("Device API request: {}", url);

        let response = match http.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                log::debug!("Device API request failed: {}", e);
                return None;
            }
        };

        let status = response.status();
        let reason = status.canonical_reason().unwrap_or_default().to_string();
        let body = if status == reqwest::StatusCode::OK {
            match response.text().await {
                Ok(text) => Some(text),
                Err(e) => {
                    log::debug!("Failed to read device API response body: {}", e);
                    None
                }
            }
        } else {
            None
        };

        log::debug!("Device API response: {} {}\n{:?}", status.as_u16(), reason, body);

        Some(RawResponse {
            status: status.as_u16(),
            reason,
            body,
        })
    }

    /// Call a module function with positional arguments
    pub async fn call(&self, module: &str, function: &str, args: &[&str]) -> Option<RawResponse> {
        self.api(&encode_call(module, function, args)).await
    }

    async fn call_body(&self, module: &str, function: &str, args: &[&str]) -> Option<String> {
        self.call(module, function, args).await?.body
    }

    /// Return code of a call, `None` when the call or its decoding failed
    pub async fn return_value(&self, module: &str, function: &str, args: &[&str]) -> Option<i64> {
        decode::return_value(&self.call_body(module, function, args).await?)
    }

    async fn succeeded(&self, module: &str, function: &str, args: &[&str]) -> bool {
        self.return_value(module, function, args).await == Some(0)
    }

    async fn playback(&self, function: &str, args: &[&str]) -> bool {
        self.succeeded("playback", function, args).await
    }

    /// Fields describing the video being played, `None` on error or when idle.
    /// Keys of interest: title, fullPath, currentStatus, currentTime, totalTime.
    pub async fn playback_info(&self) -> Option<FieldMap> {
        decode::dictionary(&self.call_body("playback", "get_current_vod_info", &[]).await?)
    }

    pub async fn now_playing(&self) -> Option<PlaybackInfo> {
        self.playback_info().await.map(|fields| PlaybackInfo::from_fields(&fields))
    }

    /// Start playing a video immediately
    pub async fn play(&self, path: &str, title: Option<&str>) -> bool {
        let url = media_url(path);
        let cache = if url.starts_with("http://") { "enable" } else { "disable" };
        let title = title.unwrap_or(DEFAULT_TITLE);
        // title, url, show, no skip, no prebuffer, http cache
        self.playback("start_vod", &[title, url.as_str(), "show", "0", "0", cache])
            .await
    }

    /// Append a video to the play queue
    pub async fn enqueue(&self, path: &str, title: Option<&str>) -> bool {
        let url = media_url(path);
        let title = title.unwrap_or(DEFAULT_TITLE);
        self.playback("insert_vod_queue", &[title, url.as_str(), "show", "start_zero"])
            .await
    }

    pub async fn resume(&self) -> bool {
        self.playback("resume_vod", &[]).await
    }

    pub async fn pause(&self) -> bool {
        self.playback("pause_vod", &[]).await
    }

    pub async fn stop(&self) -> bool {
        self.playback("stop_vod", &[]).await
    }

    pub async fn next(&self) -> bool {
        self.send_key("next").await
    }

    pub async fn previous(&self) -> bool {
        self.send_key("prev").await
    }

    /// Names accepted by [`send_key`](Self::send_key)
    pub async fn keys(&self) -> Option<Vec<String>> {
        decode::list(&self.call_body("system", "list_key", &[]).await?)
    }

    /// Send a remote-control key press
    pub async fn send_key(&self, key: &str) -> bool {
        self.succeeded("system", "send_key", &[key]).await
    }

    pub async fn supported_video_formats(&self) -> Option<Vec<String>> {
        decode::list(&self.call_body("playback", "list_vod_supported_format", &[]).await?)
    }
}
