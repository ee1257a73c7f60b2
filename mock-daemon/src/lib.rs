//! A fake daemon for exercising the dispatch client over real HTTP.
//!
//! # Design
//! The router imitates the daemon's REST conventions and, optionally, a
//! captive proxy in front of it. While the proxy is locked, `/info` answers
//! with a 403 page carrying an unlock link and `/echo` answers 407 with an
//! empty body; a GET on `/unlock` lets traffic through. Counters on
//! [`DaemonState`] let tests assert how many attempts and unlock checks happened.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header::HOST, HeaderMap, Method, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug)]
pub struct DaemonState {
    pub id: Uuid,
    locked: AtomicBool,
    script: Mutex<VecDeque<(u16, String)>>,
    info_calls: AtomicUsize,
    unlock_calls: AtomicUsize,
    echo_calls: AtomicUsize,
    scripted_calls: AtomicUsize,
}

impl Default for DaemonState {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            locked: AtomicBool::new(false),
            script: Mutex::new(VecDeque::new()),
            info_calls: AtomicUsize::new(0),
            unlock_calls: AtomicUsize::new(0),
            echo_calls: AtomicUsize::new(0),
            scripted_calls: AtomicUsize::new(0),
        }
    }
}

impl DaemonState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// State with the captive proxy engaged.
    pub fn locked() -> Arc<Self> {
        let state = Self::default();
        state.locked.store(true, Ordering::SeqCst);
        Arc::new(state)
    }

    /// Statuses (and bodies) `/scripted` returns, in order.
    pub fn script<I, S>(&self, steps: I)
    where
        I: IntoIterator<Item = (u16, S)>,
        S: Into<String>,
    {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        script.extend(steps.into_iter().map(|(status, body)| (status, body.into())));
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    pub fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }

    pub fn unlock_calls(&self) -> usize {
        self.unlock_calls.load(Ordering::SeqCst)
    }

    pub fn echo_calls(&self) -> usize {
        self.echo_calls.load(Ordering::SeqCst)
    }

    pub fn scripted_calls(&self) -> usize {
        self.scripted_calls.load(Ordering::SeqCst)
    }
}

pub type SharedState = Arc<DaemonState>;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Info {
    #[serde(rename = "ID")]
    pub id: Uuid,
    pub server_version: String,
    pub api_version: String,
}

/// What `/echo` saw, returned as JSON.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
}

pub fn app() -> Router {
    app_with_state(DaemonState::new())
}

pub fn app_with_state(state: SharedState) -> Router {
    Router::new()
        .route("/unlock", get(unlock))
        .route("/{version}/info", get(info))
        .route("/{version}/echo", any(echo))
        .route("/{version}/status/{code}", any(status))
        .route("/{version}/scripted", any(scripted))
        .with_state(state)
}

pub async fn run(listener: TcpListener, state: SharedState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

async fn info(
    State(state): State<SharedState>,
    Path(version): Path<String>,
    headers: HeaderMap,
) -> Response {
    state.info_calls.fetch_add(1, Ordering::SeqCst);
    if state.is_locked() {
        let host = headers
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("localhost");
        debug!(%host, "proxy locked, serving unlock page");
        let page = format!(
            "<html>\n<body>\n<p>Access to this site requires acceptance of the usage policy.</p>\n\
             <a href=\"http://{host}/unlock?next=http://daemon.invalid/\">Continue</a>\n\
             </body>\n</html>\n"
        );
        return (StatusCode::FORBIDDEN, Html(page)).into_response();
    }
    Json(Info {
        id: state.id,
        server_version: "24.0.0-mock".to_string(),
        api_version: version.trim_start_matches('v').to_string(),
    })
    .into_response()
}

async fn unlock(State(state): State<SharedState>) -> &'static str {
    state.unlock_calls.fetch_add(1, Ordering::SeqCst);
    state.locked.store(false, Ordering::SeqCst);
    info!("proxy unlocked");
    "unlocked"
}

async fn echo(
    State(state): State<SharedState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.echo_calls.fetch_add(1, Ordering::SeqCst);
    if state.is_locked() {
        return StatusCode::PROXY_AUTHENTICATION_REQUIRED.into_response();
    }
    let mut seen: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in &headers {
        seen.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: seen,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
    .into_response()
}

async fn status(
    Path((_version, code)): Path<(String, u16)>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Ok(code) = StatusCode::from_u16(code) else {
        return (StatusCode::BAD_REQUEST, "invalid status code").into_response();
    };
    let body = params.get("msg").cloned().unwrap_or_default();
    (code, body).into_response()
}

async fn scripted(State(state): State<SharedState>) -> Response {
    state.scripted_calls.fetch_add(1, Ordering::SeqCst);
    let next = state
        .script
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front();
    let (code, body) = next.unwrap_or((200, "ok".to_string()));
    let code = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (code, body).into_response()
}

/// A daemon serving on a background thread for the lifetime of the process.
pub struct MockDaemon {
    pub addr: SocketAddr,
    pub state: SharedState,
}

impl MockDaemon {
    /// Bind a random localhost port and serve `state` on it.
    pub fn spawn(state: SharedState) -> std::io::Result<Self> {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = std_listener.local_addr()?;
        std_listener.set_nonblocking(true)?;

        let router = app_with_state(state.clone());
        std::thread::spawn(move || -> std::io::Result<()> {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            rt.block_on(async {
                let listener = TcpListener::from_std(std_listener)?;
                axum::serve(listener, router).await
            })
        });

        Ok(Self { addr, state })
    }

    /// Serve `state` on a Unix socket at `path`.
    #[cfg(unix)]
    pub fn spawn_unix(path: &std::path::Path, state: SharedState) -> std::io::Result<()> {
        let _ = std::fs::remove_file(path);
        let std_listener = std::os::unix::net::UnixListener::bind(path)?;
        std_listener.set_nonblocking(true)?;

        let router = app_with_state(state);
        std::thread::spawn(move || -> std::io::Result<()> {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            rt.block_on(async {
                let listener = tokio::net::UnixListener::from_std(std_listener)?;
                axum::serve(listener, router).await
            })
        });

        Ok(())
    }

    /// Host string for a client config, e.g. `tcp://127.0.0.1:49152`.
    pub fn host(&self) -> String {
        format!("tcp://{}", self.addr)
    }
}
