use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Timestamp layout used on the wire and in the CSV export
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date layout of the daily stats keys
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Why a delay happened. The labels are shared with the backend verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Reason {
    #[serde(rename = "out body")]
    OutBody,
    #[serde(rename = "out 1-dot battery")]
    OutOneDotBattery,
    #[serde(rename = "out of 2 dot battery")]
    OutOfTwoDotBattery,
    #[serde(rename = "out of 3 dot battery")]
    OutOfThreeDotBattery,
}

impl Reason {
    /// Every category, in chart series order
    pub const ALL: [Reason; 4] = [
        Reason::OutBody,
        Reason::OutOneDotBattery,
        Reason::OutOfTwoDotBattery,
        Reason::OutOfThreeDotBattery,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Reason::OutBody => "out body",
            Reason::OutOneDotBattery => "out 1-dot battery",
            Reason::OutOfTwoDotBattery => "out of 2 dot battery",
            Reason::OutOfThreeDotBattery => "out of 3 dot battery",
        }
    }

    /// Exact match against the backend vocabulary
    pub fn parse(label: &str) -> Option<Reason> {
        Reason::ALL.into_iter().find(|r| r.as_str() == label)
    }

    /// Closest category to free-form input, `None` when nothing is similar enough.
    pub fn closest(input: &str) -> Option<Reason> {
        let input = input.trim().to_lowercase();
        if input.is_empty() {
            return None;
        }

        if let Some(exact) = Reason::parse(&input) {
            return Some(exact);
        }

        Reason::ALL
            .into_iter()
            .map(|r| (r, strsim::normalized_levenshtein(&input, r.as_str())))
            .filter(|(_, score)| *score >= 0.5)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(r, _)| r)
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored delay interval
#[derive(Debug, Clone, PartialEq)]
pub struct DelayEvent {
    pub id: i64,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
    pub reason: Reason,
}

impl DelayEvent {
    /// Length in fractional minutes, `None` while the delay is still running
    pub fn duration_minutes(&self) -> Option<f64> {
        self.end_time.map(|end| {
            let elapsed = end - self.start_time;
            elapsed.num_milliseconds() as f64 / 60_000.0
        })
    }

    pub fn to_record(&self) -> EventRecord {
        EventRecord {
            id: self.id,
            start_time: self.start_time.format(TIMESTAMP_FORMAT).to_string(),
            end_time: self
                .end_time
                .map(|t| t.format(TIMESTAMP_FORMAT).to_string()),
            reason: self.reason,
            duration_minutes: self.duration_minutes(),
        }
    }
}

/// Row of `GET /data`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    pub id: i64,
    pub start_time: String,
    pub end_time: Option<String>,
    pub reason: Reason,
    pub duration_minutes: Option<f64>,
}

/// Body of `POST /start`. The reason stays a plain string so unknown labels
/// get the backend's own error message instead of a decode rejection.
#[derive(Debug, Serialize, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Body of `POST /reset`
#[derive(Debug, Serialize, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StartResponse {
    pub message: String,
    pub event_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndResponse {
    pub message: String,
    pub event_id: i64,
    pub duration_minutes: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResetResponse {
    pub message: String,
}

/// Error body shared by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
}

/// Per-date, per-reason minutes
pub type DailyStats = BTreeMap<String, BTreeMap<String, f64>>;

/// Body of `GET /stats`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatsResponse {
    pub daily_stats: DailyStats,
    pub total_duration_minutes: f64,
}

/// What the backend answered: either its `error` field or the success payload.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Reply<T> {
    Failure { error: String },
    Success(T),
}

impl<T> Reply<T> {
    pub fn into_result(self) -> Result<T, String> {
        match self {
            Reply::Failure { error } => Err(error),
            Reply::Success(payload) => Ok(payload),
        }
    }
}
