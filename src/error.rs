use miette::{Diagnostic, Result};
use thiserror::Error;

/// Main error type for the feed
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Event store error: {0}")]
    #[diagnostic(code(zuifeed::store))]
    Store(String),

    #[error("HTTP error: {0}")]
    #[diagnostic(code(zuifeed::http))]
    Http(#[from] reqwest::Error),

    #[error("Environment error: {0}")]
    #[diagnostic(code(zuifeed::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(zuifeed::config))]
    Config(String),

    #[error("Component error: {0}")]
    #[diagnostic(code(zuifeed::component))]
    Component(String),

    #[error(transparent)]
    #[diagnostic(code(zuifeed::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(zuifeed::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(zuifeed::other))]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type FeedResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Missing environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create component errors
pub fn component_error(message: &str) -> Error {
    Error::Component(message.to_string())
}

/// Helper to create event store errors
pub fn store_error(message: &str) -> Error {
    Error::Store(message.to_string())
}
