//! Error handling for the meshsort crates.

use thiserror::Error;

/// Error type shared by every stage of a distributed sort run.
///
/// Each variant corresponds to one failure class of the shuffle. All of them
/// are fatal for the run: a partially shuffled node cannot be resumed, so
/// callers propagate these errors to the process boundary instead of
/// recovering locally.
#[derive(Error, Debug)]
pub enum SortError {
    #[error("Invalid configuration: {message}")]
    ConfigurationError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Connection failed: {message}")]
    ConnectionError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Protocol framing violated: {message}")]
    FramingError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("IO operation failed: {message}")]
    IoError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Internal error: {message}")]
    InternalError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

/// Result type alias for meshsort operations.
pub type Result<T> = std::result::Result<T, SortError>;

/// Error category for grouping related error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or inconsistent self-id, topology or tuning parameters
    Configuration,
    /// Accept-path or bounded-dial failures
    Network,
    /// Malformed or truncated wire frames
    Protocol,
    /// Local file read/write failures
    Storage,
    /// Broken internal invariants
    Internal,
}

/// Trait for error diagnostics surfaced at the process boundary.
pub trait Diagnose {
    /// Get the error category.
    fn category(&self) -> ErrorCategory;

    /// Whether the error aborts the run.
    fn is_fatal(&self) -> bool;

    /// Process exit status reported for this error.
    fn exit_code(&self) -> i32;
}

impl SortError {
    /// Create a configuration error with a custom message.
    pub fn configuration_error<S: Into<String>>(message: S) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with a custom message and source error.
    pub fn configuration_error_with_source<S: Into<String>, E: Into<anyhow::Error>>(
        message: S,
        source: E,
    ) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a connection error with a custom message.
    pub fn connection_error<S: Into<String>>(message: S) -> Self {
        Self::ConnectionError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error with a custom message and source error.
    pub fn connection_error_with_source<S: Into<String>, E: Into<anyhow::Error>>(
        message: S,
        source: E,
    ) -> Self {
        Self::ConnectionError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a framing error with a custom message.
    pub fn framing_error<S: Into<String>>(message: S) -> Self {
        Self::FramingError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a framing error with a custom message and source error.
    pub fn framing_error_with_source<S: Into<String>, E: Into<anyhow::Error>>(
        message: S,
        source: E,
    ) -> Self {
        Self::FramingError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create an IO error with a custom message.
    pub fn io_error<S: Into<String>>(message: S) -> Self {
        Self::IoError {
            message: message.into(),
            source: None,
        }
    }

    /// Create an IO error with a custom message and source error.
    pub fn io_error_with_source<S: Into<String>, E: Into<anyhow::Error>>(
        message: S,
        source: E,
    ) -> Self {
        Self::IoError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create an internal error with a custom message.
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
            source: None,
        }
    }

    /// Create an internal error with a custom message and source error.
    pub fn internal_error_with_source<S: Into<String>, E: Into<anyhow::Error>>(
        message: S,
        source: E,
    ) -> Self {
        Self::InternalError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// The message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            SortError::ConfigurationError { message, .. }
            | SortError::ConnectionError { message, .. }
            | SortError::FramingError { message, .. }
            | SortError::IoError { message, .. }
            | SortError::InternalError { message, .. } => message,
        }
    }
}

impl Diagnose for SortError {
    fn category(&self) -> ErrorCategory {
        match self {
            SortError::ConfigurationError { .. } => ErrorCategory::Configuration,
            SortError::ConnectionError { .. } => ErrorCategory::Network,
            SortError::FramingError { .. } => ErrorCategory::Protocol,
            SortError::IoError { .. } => ErrorCategory::Storage,
            SortError::InternalError { .. } => ErrorCategory::Internal,
        }
    }

    fn is_fatal(&self) -> bool {
        // Transient dial failures are retried inside the connection manager
        // and never become a SortError.
        true
    }

    fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Configuration => 2,
            ErrorCategory::Network => 3,
            ErrorCategory::Protocol => 4,
            ErrorCategory::Storage => 5,
            ErrorCategory::Internal => 70,
        }
    }
}

impl From<std::io::Error> for SortError {
    fn from(err: std::io::Error) -> Self {
        SortError::io_error_with_source(err.to_string(), err)
    }
}

/// Context helpers for adding rich context to errors.
pub mod context {
    use super::*;

    /// Extension trait for attaching a failure class and message to Results.
    pub trait ErrorContext<T> {
        fn with_configuration_context<F>(self, f: F) -> Result<T>
        where
            F: FnOnce() -> String;

        fn with_connection_context<F>(self, f: F) -> Result<T>
        where
            F: FnOnce() -> String;

        fn with_framing_context<F>(self, f: F) -> Result<T>
        where
            F: FnOnce() -> String;

        fn with_io_context<F>(self, f: F) -> Result<T>
        where
            F: FnOnce() -> String;
    }

    impl<T, E> ErrorContext<T> for std::result::Result<T, E>
    where
        E: Into<anyhow::Error>,
    {
        fn with_configuration_context<F>(self, f: F) -> Result<T>
        where
            F: FnOnce() -> String,
        {
            self.map_err(|e| SortError::configuration_error_with_source(f(), e.into()))
        }

        fn with_connection_context<F>(self, f: F) -> Result<T>
        where
            F: FnOnce() -> String,
        {
            self.map_err(|e| SortError::connection_error_with_source(f(), e.into()))
        }

        fn with_framing_context<F>(self, f: F) -> Result<T>
        where
            F: FnOnce() -> String,
        {
            self.map_err(|e| SortError::framing_error_with_source(f(), e.into()))
        }

        fn with_io_context<F>(self, f: F) -> Result<T>
        where
            F: FnOnce() -> String,
        {
            self.map_err(|e| SortError::io_error_with_source(f(), e.into()))
        }
    }
}

pub use context::ErrorContext;
