//! Failure types raised by addon-supplied capabilities

use thiserror::Error;

/// Boxed error used as the source of capability failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An action's side effect failed
#[derive(Debug, Error)]
#[error("action failed: {message}")]
pub struct ActionFailure {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ActionFailure {
    /// Create a failure with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a failure wrapping an underlying error
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A condition could not be evaluated
#[derive(Debug, Error)]
#[error("condition failed: {message}")]
pub struct ConditionFailure {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ConditionFailure {
    /// Create a failure with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a failure wrapping an underlying error
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A variable change listener failed while handling a notification
#[derive(Debug, Error)]
#[error("change listener failed: {message}")]
pub struct ListenerFailure {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ListenerFailure {
    /// Create a failure with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a failure wrapping an underlying error
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
