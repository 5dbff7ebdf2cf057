use std::time::Duration;
use url::form_urlencoded;

/// Result of one request attempt, produced by a worker and consumed once by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The request never produced a response (connect error, timeout, reset, DNS...).
    Failure { error: String, duration: Duration },
    /// A response arrived; any status counts, classification happens when folding.
    Response { status_code: u16, duration: Duration },
}

impl Outcome {
    pub fn failure(error: impl Into<String>, duration: Duration) -> Self {
        Outcome::Failure {
            error: error.into(),
            duration,
        }
    }

    pub fn response(status_code: u16, duration: Duration) -> Self {
        Outcome::Response {
            status_code,
            duration,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Outcome::Failure { duration, .. } | Outcome::Response { duration, .. } => *duration,
        }
    }
}

/// Query string of `/boom`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoomQuery {
    pub url: Option<String>,
}

impl BoomQuery {
    /// Takes the first `url` value; repeated keys and unknown keys are ignored.
    pub fn parse(raw: Option<&str>) -> Self {
        let url = raw.and_then(|query| {
            form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "url")
                .map(|(_, value)| value.into_owned())
        });
        Self { url }
    }
}
