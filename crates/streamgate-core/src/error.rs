use thiserror::Error;

/// Main error type for the streamgate library
#[derive(Error, Debug)]
pub enum GateError {
    /// Upstream connection or parse failure while streaming.
    ///
    /// Carries everything that was emitted downstream before the failure.
    #[error("Stream transport error: {message}")]
    StreamTransport {
        message: String,
        partial_text: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The adapter output was requested more than once
    #[error("Stream already consumed: an adapter can only be read once")]
    StreamAlreadyConsumed,

    /// The stream was cancelled through its cancellation token
    #[error("Stream cancelled after {} bytes of output", partial_text.len())]
    StreamCancelled { partial_text: String },

    /// The rate limiter store could not be reached or answered badly
    #[error("Rate limiter backend error: {message}")]
    LimiterBackend {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl GateError {
    /// Create a transport error without a source
    pub fn transport(message: impl Into<String>, partial_text: impl Into<String>) -> Self {
        Self::StreamTransport {
            message: message.into(),
            partial_text: partial_text.into(),
            source: None,
        }
    }

    /// Create a transport error with source
    pub fn transport_with_source(
        message: impl Into<String>,
        partial_text: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::StreamTransport {
            message: message.into(),
            partial_text: partial_text.into(),
            source: Some(source.into()),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(partial_text: impl Into<String>) -> Self {
        Self::StreamCancelled {
            partial_text: partial_text.into(),
        }
    }

    /// Create a limiter backend error
    pub fn limiter_backend(message: impl Into<String>) -> Self {
        Self::LimiterBackend {
            message: message.into(),
            source: None,
        }
    }

    /// Create a limiter backend error with source
    pub fn limiter_backend_with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::LimiterBackend {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a serialization error
    pub fn serialization(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Serialization {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Text that reached the consumer before the stream stopped, if any.
    pub fn partial_text(&self) -> Option<&str> {
        match self {
            GateError::StreamTransport { partial_text, .. }
            | GateError::StreamCancelled { partial_text } => Some(partial_text),
            _ => None,
        }
    }

    /// Attach the accumulated output to a transport error raised below the adapter.
    pub(crate) fn with_partial_text(self, text: &str) -> Self {
        match self {
            GateError::StreamTransport {
                message, source, ..
            } => GateError::StreamTransport {
                message,
                partial_text: text.to_string(),
                source,
            },
            GateError::StreamCancelled { .. } => GateError::cancelled(text),
            GateError::Serialization { message, source } => GateError::StreamTransport {
                message,
                partial_text: text.to_string(),
                source: Some(source),
            },
            other => GateError::StreamTransport {
                message: other.to_string(),
                partial_text: text.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }

    /// Hint for callers layering their own retry policy.
    ///
    /// Nothing in this crate retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GateError::StreamTransport { .. } | GateError::LimiterBackend { .. }
        )
    }

    /// HTTP status a handler should answer with when this error surfaces
    /// before any bytes were written.
    pub fn status_code(&self) -> u16 {
        match self {
            GateError::StreamTransport { .. } => 502,
            GateError::LimiterBackend { .. } => 503,
            GateError::StreamCancelled { .. } => 499,
            _ => 500,
        }
    }
}

/// Convert from reqwest errors
impl From<reqwest::Error> for GateError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GateError::transport_with_source("Provider request timed out", "", err)
        } else if err.is_connect() {
            GateError::transport_with_source("Connection failed", "", err)
        } else {
            GateError::transport_with_source("HTTP request failed", "", err)
        }
    }
}

/// Convert from serde_json errors
impl From<serde_json::Error> for GateError {
    fn from(err: serde_json::Error) -> Self {
        GateError::serialization("JSON serialization failed", err)
    }
}
