use crate::cancel::{CancelSignal, RunContext};
use crate::config::Config;
use crate::error::BoomError;
use crate::load_test::{LoadTestExecutor, RunLimits};
use crate::sse;
use crate::types::BoomQuery;
use anyhow::{Context as _, Result};
use axum::body::Body;
use axum::extract::{RawQuery, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use log::{error, info, warn};
use reqwest::Client;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::services::ServeDir;
use url::Url;
use uuid::Uuid;

pub const PATH_BOOM: &str = "/boom";

/// Upper bound on graceful shutdown before the serve task is aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct AppState {
    client: Client,
    limits: RunLimits,
    shutdown: CancelSignal,
}

/// HTTP front end: `/boom` event streams plus static assets.
#[derive(Debug)]
pub struct BoomServer {
    addr: SocketAddr,
    runs: RunContext,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl BoomServer {
    pub async fn start(config: Config) -> Result<Self> {
        let mut client = Client::builder();
        if let Some(timeout) = config.request_timeout {
            client = client.timeout(timeout);
        }
        let client = client.build().context("failed to build HTTP client")?;

        let bind_addr = config.bind_addr();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("failed to bind {bind_addr}"))?;
        let addr = listener
            .local_addr()
            .context("failed to resolve listen address")?;

        let (runs, shutdown) = RunContext::new();
        let state = Arc::new(AppState {
            client,
            limits: config.limits,
            shutdown,
        });
        let app = router(state, &config.static_dir);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                error!("❌ Server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            runs,
            shutdown_tx: Some(shutdown_tx),
            task,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Cancels every open run, which ends its event stream, then stops
    /// accepting connections. The serve task is aborted if it outlives the
    /// grace period.
    pub async fn shutdown(mut self) {
        info!("🛑 Shutting down, cancelling open runs");
        self.runs.cancel();
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut self.task)
            .await
            .is_err()
        {
            warn!("Server did not stop within {:?}, aborting", SHUTDOWN_GRACE);
            self.task.abort();
        }
    }
}

fn router(state: Arc<AppState>, static_dir: &Path) -> Router {
    Router::new()
        .route(PATH_BOOM, any(boom))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

async fn boom(
    State(state): State<Arc<AppState>>,
    RawQuery(raw): RawQuery,
) -> Result<Response, BoomError> {
    let query = BoomQuery::parse(raw.as_deref());
    let target = match parse_target(query.url.as_deref()) {
        Ok(url) => url,
        Err(e) => {
            warn!("Rejected boom request: {}", e);
            return Err(e);
        }
    };

    let run_id = Uuid::new_v4().to_string();
    info!("GET {:?} (run {})", target.as_str(), run_id);

    let (run, cancel) = RunContext::child(&state.shutdown);
    let (sink, stream) = sse::channel(run);
    let executor = LoadTestExecutor::new(
        run_id,
        target,
        state.client.clone(),
        state.limits.clone(),
    );
    tokio::spawn(executor.execute(cancel, sink));

    Ok((
        [(header::CONTENT_TYPE, sse::CONTENT_TYPE)],
        Body::from_stream(stream),
    )
        .into_response())
}

/// Validates the `url` query parameter: present, parseable, http(s).
pub fn parse_target(raw: Option<&str>) -> Result<Url, BoomError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(BoomError::MissingUrl)?;
    let url = Url::parse(raw)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(BoomError::UnsupportedScheme(other.to_string())),
    }
}
