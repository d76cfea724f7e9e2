use thiserror::Error;

/// Result alias used throughout the collector
pub type Result<T> = std::result::Result<T, CollectError>;

/// Failures raised inside provider adapters, extraction strategies, the capture
/// gate and persistence. Everything except `Storage` is converted into a
/// structured value before it reaches the session document.
#[derive(Debug, Error)]
pub enum CollectError {
    /// No credential configured, the provider is disabled for this session
    #[error("no credential configured for {provider}")]
    CredentialUnavailable { provider: String },

    /// Network failure or timeout
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx response
    #[error("HTTP error (status {status}): {message}")]
    Http { status: u16, message: String },

    /// Response did not have the expected shape
    #[error("parse error: {0}")]
    Parse(String),

    /// Every extraction strategy failed for the URL
    #[error("all extraction strategies failed for {url}")]
    ExtractionExhausted { url: String },

    /// Screenshot attempt failed
    #[error("capture failed: {0}")]
    CaptureFailure(String),

    /// Filesystem or serialization failure while persisting
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CollectError {
    pub fn no_credential(provider: impl Into<String>) -> Self {
        CollectError::CredentialUnavailable {
            provider: provider.into(),
        }
    }

    /// Stable tag written into serialized failures
    pub fn kind(&self) -> &'static str {
        match self {
            CollectError::CredentialUnavailable { .. } => "no_credential",
            CollectError::Transport(_) => "transport_error",
            CollectError::Http { .. } => "http_error",
            CollectError::Parse(_) => "parse_error",
            CollectError::ExtractionExhausted { .. } => "extraction_exhausted",
            CollectError::CaptureFailure(_) => "capture_failure",
            CollectError::Storage(_) => "storage_error",
            CollectError::Config(_) => "config_error",
        }
    }

    /// Status code for `Http` failures
    pub fn status(&self) -> Option<u16> {
        match self {
            CollectError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CollectError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CollectError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            CollectError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            CollectError::Transport(err.to_string())
        }
    }
}

impl From<std::io::Error> for CollectError {
    fn from(err: std::io::Error) -> Self {
        CollectError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for CollectError {
    fn from(err: serde_json::Error) -> Self {
        CollectError::Storage(err.to_string())
    }
}

impl From<fantoccini::error::CmdError> for CollectError {
    fn from(err: fantoccini::error::CmdError) -> Self {
        CollectError::CaptureFailure(err.to_string())
    }
}
