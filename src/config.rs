use crate::load_test::RunLimits;
use anyhow::{bail, Context, Result};
use std::env;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Server settings, read once at startup and handed to [`crate::server::BoomServer::start`].
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub limits: RunLimits,
    pub request_timeout: Option<Duration>,
    pub static_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            limits: RunLimits::default(),
            request_timeout: None,
            static_dir: PathBuf::from("static"),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let host = lookup("BOOM_HOST").unwrap_or(defaults.host);
        let port = parse_or(&lookup, "BOOM_PORT", defaults.port)?;

        let qps: u32 = parse_or(&lookup, "BOOM_QPS", defaults.limits.qps.get())?;
        let qps = NonZeroU32::new(qps).context("BOOM_QPS must be greater than zero")?;

        let concurrency = parse_or(&lookup, "BOOM_CONCURRENCY", defaults.limits.concurrency)?;
        if concurrency == 0 {
            bail!("BOOM_CONCURRENCY must be greater than zero");
        }

        let outcome_buffer =
            parse_or(&lookup, "BOOM_OUTCOME_BUFFER", defaults.limits.outcome_buffer)?;
        if outcome_buffer == 0 {
            bail!("BOOM_OUTCOME_BUFFER must be greater than zero");
        }

        let window_ms: u64 = parse_or(
            &lookup,
            "BOOM_WINDOW_MS",
            defaults.limits.window.as_millis() as u64,
        )?;
        if window_ms == 0 {
            bail!("BOOM_WINDOW_MS must be greater than zero");
        }

        let request_timeout = match lookup("BOOM_REQUEST_TIMEOUT_SECS") {
            Some(raw) => Some(Duration::from_secs(parse_value(
                "BOOM_REQUEST_TIMEOUT_SECS",
                &raw,
            )?)),
            None => defaults.request_timeout,
        };

        let static_dir = lookup("BOOM_STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.static_dir);

        Ok(Self {
            host,
            port,
            limits: RunLimits {
                qps,
                concurrency,
                outcome_buffer,
                window: Duration::from_millis(window_ms),
            },
            request_timeout,
            static_dir,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("invalid value for {key}: {raw:?}"))
}
