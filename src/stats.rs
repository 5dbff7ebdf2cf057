use crate::types::Outcome;
use serde::{Serialize, Serializer};
use std::time::Duration;

/// Highest status code still counted as good.
pub const MAX_GOOD_STATUS: u16 = 299;

/// Running totals for one aggregation window.
///
/// `min_duration`/`max_duration` stay `None` until the first outcome is
/// recorded and serialize as `null` in that case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WindowSummary {
    #[serde(rename = "Err")]
    pub error_count: u64,
    #[serde(rename = "Good")]
    pub success_count: u64,
    #[serde(rename = "Bad")]
    pub bad_count: u64,
    #[serde(rename = "Min", serialize_with = "serialize_nanos")]
    pub min_duration: Option<Duration>,
    #[serde(rename = "Max", serialize_with = "serialize_nanos")]
    pub max_duration: Option<Duration>,
    #[serde(rename = "ErrText")]
    pub last_error_text: String,
}

impl WindowSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Failure { error, .. } => self.record_failure(error),
            Outcome::Response { status_code, .. } => self.record_response(*status_code),
        }
        self.record_duration(outcome.duration());
    }

    fn record_failure(&mut self, error: &str) {
        self.error_count += 1;
        self.last_error_text.clear();
        self.last_error_text.push_str(error);
    }

    fn record_response(&mut self, status_code: u16) {
        if status_code > MAX_GOOD_STATUS {
            self.bad_count += 1;
        } else {
            self.success_count += 1;
        }
    }

    fn record_duration(&mut self, duration: Duration) {
        self.min_duration = Some(match self.min_duration {
            Some(min) if min <= duration => min,
            _ => duration,
        });
        self.max_duration = Some(match self.max_duration {
            Some(max) if max >= duration => max,
            _ => duration,
        });
    }

    pub fn total(&self) -> u64 {
        self.error_count + self.success_count + self.bad_count
    }
}

fn serialize_nanos<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(d) => serializer.serialize_u64(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)),
        None => serializer.serialize_none(),
    }
}
