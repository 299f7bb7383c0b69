use thiserror::Error;

/// Errors of the segment loading layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("HTTP {status} for URL: {url}")]
    HttpStatus { status: u16, url: String },
    #[error("Timeout")]
    Timeout,
    #[error("Network unreachable")]
    Offline,
    #[error("Request failed after {max_retries} retries: {source}")]
    RetryExhausted {
        max_retries: u32,
        source: Box<NetError>,
    },
}

impl NetError {
    /// Creates an HTTP status error
    pub fn http_status(status: u16, url: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
        }
    }

    /// Creates an HTTP error from a generic string
    pub fn http<S: Into<String>>(msg: S) -> Self {
        Self::Http(msg.into())
    }

    /// Error that caused a retry loop to give up, or `self`.
    pub fn root(&self) -> &NetError {
        match self {
            Self::RetryExhausted { source, .. } => source.root(),
            other => other,
        }
    }

    /// Checks if this error is worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout | Self::Offline => true,
            Self::HttpStatus { status, .. } => {
                *status >= 500 || matches!(*status, 404 | 408 | 412 | 415 | 429)
            }
            Self::RetryExhausted { .. } => false,
        }
    }

    /// Whether the device looks disconnected, as opposed to a server error.
    pub fn is_offline(&self) -> bool {
        matches!(self.root(), Self::Offline)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), Self::Timeout)
    }

    /// Checks for a given HTTP status, looking through exhausted retries.
    pub fn is_http_error(&self, code: u16) -> bool {
        self.status_code() == Some(code)
    }

    /// `412 Precondition Failed`: the segment is not available yet.
    pub fn is_precondition_failed(&self) -> bool {
        self.is_http_error(412)
    }

    /// Gets the HTTP status code if this is an HTTP status error
    pub fn status_code(&self) -> Option<u16> {
        match self.root() {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type NetResult<T> = Result<T, NetError>;
