//! Live HTTP load generator.
//!
//! `GET /boom?url=<target>` starts a run that fires rate- and
//! concurrency-limited GETs at the target and streams one summary per
//! window back as `text/event-stream` until the client disconnects.

pub mod aggregator;
pub mod cancel;
pub mod config;
pub mod error;
pub mod limiter;
pub mod server;
pub mod sse;
pub mod stats;
pub mod types;

pub use config::Config;
pub use error::BoomError;
pub use load_test::{LoadTestExecutor, RunLimits};
pub use server::BoomServer;
pub use stats::WindowSummary;
pub use types::Outcome;
