use serde_json::Value;

/// HTTP status the API uses to signal that the caller is over its rate limit.
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// One request to issue, tied back to its coordinate by `index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub url: String,
    pub index: usize,
}

impl RequestDescriptor {
    pub fn new(url: String, index: usize) -> Self {
        Self { url, index }
    }
}

/// Result of a single request. Every descriptor produces exactly one.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(Value),
    HttpError { status: u16, message: Option<String> },
    Timeout,
    TransportError(String),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            FetchOutcome::HttpError {
                status: STATUS_TOO_MANY_REQUESTS,
                ..
            }
        )
    }

    /// Short description used in log lines and skip reports.
    pub fn describe(&self) -> String {
        match self {
            FetchOutcome::Success(_) => "ok".to_string(),
            FetchOutcome::HttpError {
                status,
                message: Some(message),
            } => format!("HTTP {}: {}", status, message),
            FetchOutcome::HttpError {
                status,
                message: None,
            } => format!("HTTP {}", status),
            FetchOutcome::Timeout => "timed out".to_string(),
            FetchOutcome::TransportError(message) => format!("transport error: {}", message),
        }
    }
}
