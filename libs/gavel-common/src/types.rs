use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One queued unit of work: a submission's code plus the ordered test
/// cases it must pass. Immutable once queued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionJob {
    pub submission_id: String,
    pub code: String,
    pub language: String,
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub output: String,
}

/// Terminal classification of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictStatus {
    Accepted,
    #[serde(rename = "Wrong Answer")]
    WrongAnswer,
    #[serde(rename = "Time Limit Exceeded")]
    TimeLimitExceeded,
    #[serde(rename = "Runtime Error")]
    RuntimeError,
    #[serde(rename = "Unsupported Language")]
    UnsupportedLanguage,
    #[serde(rename = "System Error")]
    SystemError,
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VerdictStatus::Accepted => "Accepted",
            VerdictStatus::WrongAnswer => "Wrong Answer",
            VerdictStatus::TimeLimitExceeded => "Time Limit Exceeded",
            VerdictStatus::RuntimeError => "Runtime Error",
            VerdictStatus::UnsupportedLanguage => "Unsupported Language",
            VerdictStatus::SystemError => "System Error",
        })
    }
}

/// Coarse resource figures attached to a verdict. The judge reports
/// fixed sentinel values rather than measuring the sandboxed process;
/// the figures are part of the wire contract, not a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub runtime_ms: Option<u64>,
    pub memory_kb: Option<u64>,
}

pub const NOMINAL_RUNTIME_MS: u64 = 120;
pub const NOMINAL_MEMORY_KB: u64 = 15_200;
pub const PLACEHOLDER_RUNTIME_MS: u64 = 100;

/// Final result for one submission: status plus coarse usage figures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub usage: ResourceUsage,
}

impl Verdict {
    pub fn accepted() -> Self {
        Self {
            status: VerdictStatus::Accepted,
            usage: ResourceUsage {
                runtime_ms: Some(NOMINAL_RUNTIME_MS),
                memory_kb: Some(NOMINAL_MEMORY_KB),
            },
        }
    }

    pub fn wrong_answer() -> Self {
        Self {
            status: VerdictStatus::WrongAnswer,
            usage: ResourceUsage {
                runtime_ms: Some(PLACEHOLDER_RUNTIME_MS),
                memory_kb: Some(0),
            },
        }
    }

    pub fn runtime_error() -> Self {
        Self {
            status: VerdictStatus::RuntimeError,
            usage: ResourceUsage {
                runtime_ms: Some(PLACEHOLDER_RUNTIME_MS),
                memory_kb: Some(0),
            },
        }
    }

    /// The deadline is reported as the elapsed time.
    pub fn time_limit_exceeded(deadline_ms: u64) -> Self {
        Self {
            status: VerdictStatus::TimeLimitExceeded,
            usage: ResourceUsage {
                runtime_ms: Some(deadline_ms),
                memory_kb: Some(0),
            },
        }
    }

    pub fn unsupported_language() -> Self {
        Self {
            status: VerdictStatus::UnsupportedLanguage,
            usage: ResourceUsage {
                runtime_ms: Some(0),
                memory_kb: Some(0),
            },
        }
    }

    pub fn system_error() -> Self {
        Self {
            status: VerdictStatus::SystemError,
            usage: ResourceUsage {
                runtime_ms: None,
                memory_kb: None,
            },
        }
    }
}

/// Lifecycle of a submission as seen by the status store. `Pending` and
/// `QueueError` are owned by the API side; everything else comes from
/// the judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "QUEUE_ERROR")]
    QueueError,
    #[serde(untagged)]
    Judged(VerdictStatus),
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionStatus::Pending => f.write_str("PENDING"),
            SubmissionStatus::QueueError => f.write_str("QUEUE_ERROR"),
            SubmissionStatus::Judged(status) => status.fmt(f),
        }
    }
}

/// What the status store holds per submission id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub result: Option<ResourceUsage>,
}

impl SubmissionRecord {
    pub fn pending() -> Self {
        Self {
            status: SubmissionStatus::Pending,
            submitted_at: Utc::now(),
            result: None,
        }
    }
}
