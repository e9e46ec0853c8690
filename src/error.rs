use thiserror::Error;

/// Failure taxonomy for every gateway call. Each variant maps to a
/// distinct user-visible state; callers must never collapse two of them
/// into one generic error string.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiFailure {
    #[error("backend not reachable: {0}")]
    NotConnected(String),
    /// The call exceeded its deadline but the backend may still be
    /// working on it. Not an outage.
    #[error("no response within {timeout_ms}ms; backend is still processing")]
    Timeout { timeout_ms: u64 },
    #[error("rate limited by backend; wait before retrying")]
    RateLimited,
    #[error("request rejected: {0}")]
    Validation(String),
    #[error("no trained model for {symbol}")]
    ModelMissing { symbol: String },
    #[error("backend failure: {0}")]
    Unknown(String),
}

impl ApiFailure {
    /// Only transport faults and server-side errors earn another attempt.
    /// A timeout means the backend is still working, not failing.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiFailure::NotConnected(_) | ApiFailure::Unknown(_))
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiFailure::RateLimited)
    }

    /// Classify a non-2xx response. 429 is its own failure mode; other
    /// 4xx are caller mistakes and never retried.
    pub fn from_status(status: u16, body: &str) -> ApiFailure {
        let detail: String = body.trim().chars().take(300).collect();
        match status {
            429 => ApiFailure::RateLimited,
            400..=499 => ApiFailure::Validation(format!("HTTP {}: {}", status, detail)),
            _ => ApiFailure::Unknown(format!("HTTP {}: {}", status, detail)),
        }
    }
}

/// Per-symbol prediction errors arrive as free text. The backend reports
/// an untrained model with wording that always names the model or
/// training, so a substring check is the classification boundary.
pub fn is_model_missing_text(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    lower.contains("model") || lower.contains("training")
}
