//! Failure classification for agent invocations.
//!
//! A failed invocation (non-zero exit) is matched against an ordered list of
//! rules, top to bottom. The first rule whose predicate matches decides the
//! classification; nothing matching means `Unknown`.
//!
//! | Order | Rule              | Classification      | Retryable |
//! |-------|-------------------|---------------------|-----------|
//! | 1     | rate limit        | `RateLimited`       | no        |
//! | 2     | model unavailable | `ModelUnavailable`  | no        |
//! | 3     | spawn failure     | `SpawnFailed`       | no        |
//! | 4     | network           | `NetworkTransient`  | yes       |
//!
//! Only network failures are retried: a retry cannot fix a bad model name, a
//! missing binary, or an exhausted quota.

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

/// Category assigned to a failed agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorClassification {
    ModelUnavailable,
    RateLimited { retry_after: Option<Duration> },
    SpawnFailed,
    NetworkTransient,
    Unknown,
}

impl ErrorClassification {
    /// Whether another attempt could plausibly succeed.
    pub fn retryable(&self) -> bool {
        matches!(self, ErrorClassification::NetworkTransient)
    }

    /// Operator-facing classification name.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorClassification::ModelUnavailable => "ModelUnavailable",
            ErrorClassification::RateLimited { .. } => "RateLimited",
            ErrorClassification::SpawnFailed => "ProcessSpawnFailed",
            ErrorClassification::NetworkTransient => "TransientNetwork",
            ErrorClassification::Unknown => "UnknownAgentFailure",
        }
    }
}

impl std::fmt::Display for ErrorClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClassification::RateLimited {
                retry_after: Some(delay),
            } => write!(f, "{} (retry after {:?})", self.name(), delay),
            _ => f.write_str(self.name()),
        }
    }
}

/// One entry in the ordered rule list.
pub struct ClassificationRule {
    pub name: &'static str,
    matches: fn(i32, &str) -> bool,
    build: fn(&str) -> ErrorClassification,
}

impl ClassificationRule {
    pub fn matches(&self, exit_code: i32, stderr: &str) -> bool {
        (self.matches)(exit_code, stderr)
    }

    pub fn classification(&self, stderr: &str) -> ErrorClassification {
        (self.build)(stderr)
    }
}

static RATE_LIMIT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)rate[ _-]?limit|too many requests|\b429\b|quota|usage limit").unwrap()
});

static RETRY_AFTER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:retry[ _-]?after|try again in)\D{0,10}?(\d+(?:\.\d+)?)(?:\s*(ms|milliseconds?|s|secs?|seconds?|m|mins?|minutes?|h|hours?)\b)?",
    )
    .unwrap()
});

static MODEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)model[^\n]{0,80}?(not found|does not exist|unsupported|not supported|unavailable|not available)|(unknown|unsupported|invalid)[ _-]model|model_not_found",
    )
    .unwrap()
});

static SPAWN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)command not found|failed to spawn|spawn\s+\S+\s+enoent|executable file not found|is not recognized as an internal or external command",
    )
    .unwrap()
});

static NETWORK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)econnrefused|econnreset|etimedout|enotfound|eai_again|ehostunreach|enetunreach|connection (refused|reset|closed|aborted)|timed out|timeout|fetch failed|socket hang up|network|getaddrinfo|\b50[234]\b",
    )
    .unwrap()
});

/// Shell exit codes for "not executable" and "not found".
const SPAWN_EXIT_CODES: [i32; 2] = [126, 127];

/// The classification rules, evaluated top to bottom.
pub static RULES: [ClassificationRule; 4] = [
    ClassificationRule {
        name: "rate-limit",
        matches: |_, stderr| RATE_LIMIT_REGEX.is_match(stderr),
        build: |stderr| ErrorClassification::RateLimited {
            retry_after: extract_retry_after(stderr),
        },
    },
    ClassificationRule {
        name: "model-unavailable",
        matches: |_, stderr| MODEL_REGEX.is_match(stderr),
        build: |_| ErrorClassification::ModelUnavailable,
    },
    ClassificationRule {
        name: "spawn-failed",
        matches: |exit_code, stderr| {
            SPAWN_EXIT_CODES.contains(&exit_code) || SPAWN_REGEX.is_match(stderr)
        },
        build: |_| ErrorClassification::SpawnFailed,
    },
    ClassificationRule {
        name: "network",
        matches: |_, stderr| NETWORK_REGEX.is_match(stderr),
        build: |_| ErrorClassification::NetworkTransient,
    },
];

/// Classify a failed invocation. Never called with exit code 0.
pub fn classify(exit_code: i32, stderr: &str) -> ErrorClassification {
    RULES
        .iter()
        .find(|rule| rule.matches(exit_code, stderr))
        .map(|rule| rule.classification(stderr))
        .unwrap_or(ErrorClassification::Unknown)
}

/// Pull a retry-after hint ("retry after 30s", "try again in 2 minutes") out of stderr.
pub fn extract_retry_after(stderr: &str) -> Option<Duration> {
    let caps = RETRY_AFTER_REGEX.captures(stderr)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps
        .get(2)
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_default();

    let seconds = match unit.as_str() {
        "ms" | "millisecond" | "milliseconds" => value / 1000.0,
        "m" | "min" | "mins" | "minute" | "minutes" => value * 60.0,
        "h" | "hour" | "hours" => value * 3600.0,
        _ => value,
    };
    Some(Duration::from_secs_f64(seconds))
}
