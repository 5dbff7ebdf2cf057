//! `text/event-stream` framing and the streaming response body.
//!
//! Every emitted summary becomes one frame: each line of its JSON is written
//! as `data: <line>\n`, and a blank line closes the frame. Frames travel from
//! the aggregator to the response body over a one-slot channel, so each frame
//! is handed to the connection as soon as it is produced.

use crate::cancel::{CancelSignal, Cancelled, RunContext};
use axum::body::Bytes;
use futures::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

pub const CONTENT_TYPE: &str = "text/event-stream";

const DATA_PREFIX: &[u8] = b"data: ";

/// Frames the payload, splitting on `\n` so embedded newlines cannot end the event early.
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let lines = payload.split(|b| *b == b'\n');
    let mut out = Vec::with_capacity(payload.len() + DATA_PREFIX.len() + 2);
    for line in lines {
        out.extend_from_slice(DATA_PREFIX);
        out.extend_from_slice(line);
        out.push(b'\n');
    }
    out.push(b'\n');
    Bytes::from(out)
}

/// Joins the `data:` lines of one frame back into its payload.
pub fn decode_frame(frame: &str) -> Option<String> {
    let mut lines = Vec::new();
    for line in frame.lines() {
        if line.is_empty() {
            break;
        }
        lines.push(line.strip_prefix("data: ")?);
    }
    if lines.is_empty() {
        return None;
    }
    Some(lines.join("\n"))
}

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    /// The run was cancelled or the client stopped reading.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
    #[error("failed to encode frame payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Aggregator side of the stream.
#[derive(Debug, Clone)]
pub struct FrameSink {
    tx: mpsc::Sender<Bytes>,
}

impl FrameSink {
    /// Serializes and sends one payload. Fails once the client is gone, the
    /// run is cancelled, or the payload does not encode as JSON.
    pub async fn emit<T>(&self, payload: &T, cancel: &CancelSignal) -> Result<(), EmitError>
    where
        T: Serialize + ?Sized,
    {
        let json = serde_json::to_vec(payload)?;
        let frame = encode_frame(&json);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Cancelled.into()),
            sent = self.tx.send(frame) => sent.map_err(|_| Cancelled.into()),
        }
    }
}

/// Response body of a run. Dropping it (client disconnect) cancels the run.
#[derive(Debug)]
pub struct EventStream {
    frames: mpsc::Receiver<Bytes>,
    _run: RunContext,
}

/// Creates the sink/body pair for a run owned by `run`.
pub fn channel(run: RunContext) -> (FrameSink, EventStream) {
    let (tx, rx) = mpsc::channel(1);
    (
        FrameSink { tx },
        EventStream {
            frames: rx,
            _run: run,
        },
    )
}

impl Stream for EventStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().frames.poll_recv(cx).map(|frame| frame.map(Ok))
    }
}
