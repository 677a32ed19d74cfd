//! Error types for the forgeloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Provider failures carry their own classification so the retry policy
//! can be a plain function over `ErrorClass` instead of type sniffing.

use thiserror::Error;

/// The top-level error type for all forgeloop operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Whether a failed provider call may be attempted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    Fatal,
}

// --- Bounded context errors ---

/// A failed call to an LLM backend.
///
/// The `Display` output is the enriched, user-facing message.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Rate limited by the provider (429): {message}. Wait a moment before trying again")]
    RateLimited { message: String },

    #[error("The provider is overloaded (529): {message}. Try again shortly")]
    Overloaded { message: String },

    #[error("The provider is temporarily unavailable ({status_code}): {message}")]
    Unavailable { status_code: u16, message: String },

    #[error("The provider is experiencing issues ({status_code}): {message}")]
    ServerError { status_code: u16, message: String },

    #[error("Authentication failed (401): {0}. Check your API key")]
    Unauthorized(String),

    #[error("Access denied (403): {0}. Check that your API key can use this model")]
    Forbidden(String),

    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ProviderError>,
    },
}

impl ProviderError {
    /// Classify a non-success HTTP response.
    ///
    /// A vendor error code in the body (`{"error": {"type": ..., "code": ...}}`)
    /// wins over the status for rate-limit and overload conditions, since some
    /// gateways relay those with a generic status.
    pub fn from_status(status: u16, body: &str) -> Self {
        let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
        let error = parsed.as_ref().map(|v| &v["error"]);

        let code = error.and_then(|e| e["type"].as_str().or_else(|| e["code"].as_str()));
        let vendor_code = error.and_then(|e| e["code"].as_str());
        let message = error
            .and_then(|e| e["message"].as_str())
            .map(str::to_string)
            .unwrap_or_else(|| summarize_body(body));

        let is_rate_limit = matches!(code, Some("rate_limit_error" | "rate_limit_exceeded"))
            || vendor_code == Some("rate_limit_exceeded");

        if is_rate_limit {
            return Self::RateLimited { message };
        }
        if code == Some("overloaded_error") {
            return Self::Overloaded { message };
        }

        match status {
            429 => Self::RateLimited { message },
            529 => Self::Overloaded { message },
            502..=504 => Self::Unavailable {
                status_code: status,
                message,
            },
            401 => Self::Unauthorized(message),
            403 => Self::Forbidden(message),
            s if s >= 500 => Self::ServerError {
                status_code: s,
                message,
            },
            s => Self::ApiError {
                status_code: s,
                message,
            },
        }
    }

    /// Retryable: rate limits, overloads, gateway errors, and transport failures.
    pub fn classify(&self) -> ErrorClass {
        match self {
            Self::RateLimited { .. }
            | Self::Overloaded { .. }
            | Self::Unavailable { .. }
            | Self::Network(_)
            | Self::Timeout(_) => ErrorClass::Retryable,
            _ => ErrorClass::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.classify() == ErrorClass::Retryable
    }

    /// The HTTP status this error was built from, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::Overloaded { .. } => Some(529),
            Self::Unavailable { status_code, .. }
            | Self::ServerError { status_code, .. }
            | Self::ApiError { status_code, .. } => Some(*status_code),
            Self::Unauthorized(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::RetriesExhausted { last, .. } => last.status_code(),
            _ => None,
        }
    }
}

fn summarize_body(body: &str) -> String {
    const LIMIT: usize = 300;
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no response body".into();
    }
    match trimmed.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Permission denied: {tool_name} — {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    /// Two registered tool sets expose the same tool name.
    #[error("Duplicate tool name '{name}' (registered by '{first}' and '{second}')")]
    DuplicateTool {
        name: String,
        first: String,
        second: String,
    },
}
