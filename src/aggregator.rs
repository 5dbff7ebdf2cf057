//! Folds outcomes into fixed windows and emits one summary per tick.
//!
//! A single task owns the current [`WindowSummary`], so folds and emissions
//! never race. Ticks follow wall time, not traffic: an idle window still
//! emits an empty summary as a heartbeat. On cancellation the partial
//! window is dropped, not flushed.

use crate::cancel::CancelSignal;
use crate::sse::{EmitError, FrameSink};
use crate::stats::WindowSummary;
use crate::types::Outcome;
use log::{debug, error};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub struct WindowAggregator {
    window: Duration,
    outcomes: mpsc::Receiver<Outcome>,
    sink: FrameSink,
}

impl WindowAggregator {
    pub fn new(window: Duration, outcomes: mpsc::Receiver<Outcome>, sink: FrameSink) -> Self {
        Self {
            window,
            outcomes,
            sink,
        }
    }

    /// Runs until cancelled or the client stops accepting frames.
    /// Returns the number of windows emitted.
    pub async fn run(mut self, cancel: CancelSignal) -> u64 {
        let mut ticker = interval_at(Instant::now() + self.window, self.window);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut summary = WindowSummary::new();
        let mut emitted = 0u64;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(
                        "Aggregator cancelled after {} windows, dropping {} pending outcomes",
                        emitted,
                        summary.total()
                    );
                    return emitted;
                }
                _ = ticker.tick() => {
                    let closed = std::mem::take(&mut summary);
                    match self.sink.emit(&closed, &cancel).await {
                        Ok(()) => {}
                        Err(EmitError::Cancelled(_)) => {
                            debug!("Aggregator stopping: stream closed after {} windows", emitted);
                            return emitted;
                        }
                        Err(e @ EmitError::Encode(_)) => {
                            error!("Aggregator stopping after {} windows: {}", emitted, e);
                            return emitted;
                        }
                    }
                    emitted += 1;
                }
                outcome = self.outcomes.recv() => match outcome {
                    Some(outcome) => summary.record(&outcome),
                    // Every producer is gone, which only happens once the run has stopped.
                    None => return emitted,
                },
            }
        }
    }
}
