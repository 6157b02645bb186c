use thiserror::Error;

/// Unified error type for the entire portfolio-insight-core library.
/// Every fallible public function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Upload / Validation ─────────────────────────────────────────
    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("No portfolio uploaded")]
    NoPortfolio,

    // ── Market data ─────────────────────────────────────────────────
    #[error("Price source failed for {symbol}: {source}")]
    Upstream {
        symbol: String,
        #[source]
        source: FetchError,
    },

    // ── Advisor bridge ──────────────────────────────────────────────
    #[error("Advisor unavailable: {0}")]
    AdvisorUnavailable(String),

    // ── File I/O / Serialization ────────────────────────────────────
    #[error("File I/O error: {0}")]
    FileIO(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Typed failure from a single price-source call. The kind decides both
/// retry behavior (see [`FetchError::is_retryable`]) and how the registry
/// falls back to the next source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Symbol not found: {0}")]
    NotFound(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl FetchError {
    /// Transient failures are worth another attempt. `NotFound` and
    /// `MalformedResponse` are deterministic: retrying cannot change the
    /// answer.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout | FetchError::RateLimited | FetchError::Unavailable(_)
        )
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileIO(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

impl From<csv::Error> for CoreError {
    fn from(e: csv::Error) -> Self {
        CoreError::ValidationError(format!("Malformed spreadsheet: {e}"))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return FetchError::Timeout;
        }
        // Sanitize error message: strip query parameters from URLs to prevent
        // API key leakage. reqwest errors often contain full URLs with secrets.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        if e.is_decode() {
            FetchError::MalformedResponse(sanitized)
        } else {
            FetchError::Unavailable(sanitized)
        }
    }
}
