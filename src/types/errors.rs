//! Error types for xfaas.

use thiserror::Error;

/// Default result type for xfaas.
pub type XfaasResult<T> = Result<T, XfaasError>;

/// Errors that can surface from xfaas.
///
/// Provider-level failures are never represented here: they are captured as
/// [`Outcome::Failure`](crate::types::responses::Outcome::Failure) data inside a
/// [`DispatchReport`](crate::types::responses::DispatchReport).
#[derive(Error, Debug)]
pub enum XfaasError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider '{0}' is registered more than once")]
    DuplicateProvider(String),

    #[error("Provider '{0}' is not registered")]
    UnknownProvider(String),
}

impl XfaasError {
    /// Creates a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors caused by an invalid dispatch invocation.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::DuplicateProvider(_) | Self::UnknownProvider(_)
        )
    }
}
