#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::stream::{self, StreamExt};
use loadmaster_boom::sse::decode_frame;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub const PATH_TARGET: &str = "/target";
/// Streams a body larger than any socket buffer.
pub const PATH_BIG: &str = "/big";
/// Sends a 200 and part of a body, then drops the connection.
pub const PATH_CUT: &str = "/cut";

const BIG_CHUNK_SIZE: usize = 64 * 1024;
const BIG_CHUNKS: usize = 128;

/// Target server answering 200 for the first `good` requests and 500 afterwards.
pub struct StubTarget {
    addr: SocketAddr,
    hits: Arc<AtomicU64>,
    big_sent: Arc<AtomicBool>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

#[derive(Clone)]
struct StubState {
    hits: Arc<AtomicU64>,
    big_sent: Arc<AtomicBool>,
    good: u64,
}

async fn handle_target(State(state): State<StubState>) -> (StatusCode, &'static str) {
    let n = state.hits.fetch_add(1, Ordering::SeqCst);
    if n < state.good {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "nope")
    }
}

/// Marks `big_sent` once the last chunk has been pulled, which only happens
/// after the client has read most of the body.
async fn handle_big(State(state): State<StubState>) -> Response {
    let sent = state.big_sent.clone();
    let chunks = (0..BIG_CHUNKS).map(move |i| {
        if i + 1 == BIG_CHUNKS {
            sent.store(true, Ordering::SeqCst);
        }
        Ok::<_, Infallible>(Bytes::from(vec![b'x'; BIG_CHUNK_SIZE]))
    });
    Body::from_stream(stream::iter(chunks)).into_response()
}

async fn handle_cut() -> Response {
    let head = stream::once(async {
        Ok::<_, std::io::Error>(Bytes::from_static(b"partial"))
    });
    let fail = stream::once(async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Err::<Bytes, _>(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "cut mid-body",
        ))
    });
    Body::from_stream(head.chain(fail)).into_response()
}

impl StubTarget {
    pub async fn start(good: u64) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let hits = Arc::new(AtomicU64::new(0));
        let big_sent = Arc::new(AtomicBool::new(false));

        let app = Router::new()
            .route(PATH_TARGET, get(handle_target))
            .route(PATH_BIG, get(handle_big))
            .route(PATH_CUT, get(handle_cut))
            .with_state(StubState {
                hits: hits.clone(),
                big_sent: big_sent.clone(),
                good,
            });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            hits,
            big_sent,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}{}", self.addr, PATH_TARGET)
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn big_sent(&self) -> bool {
        self.big_sent.load(Ordering::SeqCst)
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = tokio::time::timeout(Duration::from_secs(2), task).await;
        }
    }
}

impl Drop for StubTarget {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Splits a byte stream of `text/event-stream` frames into decoded JSON payloads.
#[derive(Default)]
pub struct FrameReader {
    buf: String,
}

impl FrameReader {
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.push_str(&String::from_utf8_lossy(chunk));
    }

    pub fn next_frame(&mut self) -> Option<serde_json::Value> {
        let end = self.buf.find("\n\n")?;
        let frame: String = self.buf.drain(..end + 2).collect();
        let payload = decode_frame(&frame)?;
        serde_json::from_str(&payload).ok()
    }
}

/// Reads from the response until a whole frame is available.
pub async fn read_frame(
    resp: &mut reqwest::Response,
    reader: &mut FrameReader,
) -> anyhow::Result<serde_json::Value> {
    loop {
        if let Some(frame) = reader.next_frame() {
            return Ok(frame);
        }
        let chunk = tokio::time::timeout(Duration::from_secs(3), resp.chunk())
            .await
            .map_err(|_| anyhow::anyhow!("timed out waiting for a frame"))??
            .ok_or_else(|| anyhow::anyhow!("stream ended"))?;
        reader.push(&chunk);
    }
}

pub fn count(frame: &serde_json::Value, key: &str) -> u64 {
    frame[key].as_u64().unwrap_or_default()
}
