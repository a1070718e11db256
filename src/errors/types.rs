//! # Error Types
//!
//! Comprehensive error types for the kubegate server using `thiserror`.

use std::fmt;

/// Custom result type for kubegate operations
pub type Result<T> = std::result::Result<T, KubegateError>;

/// Main error type for the kubegate server
#[derive(thiserror::Error, Debug)]
pub enum KubegateError {
    /// Configuration errors (parse or load failures)
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Validation errors on configuration or arguments
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Authentication and authorization errors
    #[error("Authentication error: {message}")]
    Auth {
        message: String,
        error_type: AuthErrorType,
    },

    /// A tool call named a target not in the current target set
    #[error("unknown target \"{target}\"")]
    UnknownTarget { target: String },

    /// A Kubernetes request matched the denied-resources list
    #[error("resource not allowed: {}", format_gvk(.group, .version, .kind))]
    ResourceDenied {
        group: String,
        version: String,
        kind: String,
    },

    /// OAuth token exchange failure
    #[error("token exchange failed{}: {message}", .status.map(|s| format!(" with status {}", s)).unwrap_or_default())]
    TokenExchange {
        message: String,
        status: Option<u16>,
    },

    /// Discovery API failure while capturing cluster state
    #[error("discovery failed: {message}")]
    Discovery {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Connection, TLS, or protocol-layer error from the Kubernetes client
    #[error("transport error: {context}")]
    Transport {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// Context cancellation; the request terminates without further output
    #[error("operation cancelled: {operation}")]
    Cancelled { operation: String },

    /// Internal server errors
    #[error("Internal server error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

fn format_gvk(group: &str, version: &str, kind: &str) -> String {
    format!("{}/{}, Kind={}", group, version, kind)
}

/// Authentication error subtypes, matching the `error` attribute of the
/// `WWW-Authenticate` challenge sent on 401 responses.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthErrorType {
    MissingToken,
    InvalidToken,
}

impl fmt::Display for AuthErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthErrorType::MissingToken => write!(f, "missing_token"),
            AuthErrorType::InvalidToken => write!(f, "invalid_token"),
        }
    }
}

impl KubegateError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create an authentication error
    pub fn auth<S: Into<String>>(message: S, error_type: AuthErrorType) -> Self {
        Self::Auth { message: message.into(), error_type }
    }

    /// Create an unknown-target error
    pub fn unknown_target<S: Into<String>>(target: S) -> Self {
        Self::UnknownTarget { target: target.into() }
    }

    /// Create a resource-denied error for the given group/version/kind
    pub fn resource_denied<G, V, K>(group: G, version: V, kind: K) -> Self
    where
        G: Into<String>,
        V: Into<String>,
        K: Into<String>,
    {
        Self::ResourceDenied { group: group.into(), version: version.into(), kind: kind.into() }
    }

    /// Create a token-exchange error
    pub fn token_exchange<S: Into<String>>(message: S, status: Option<u16>) -> Self {
        Self::TokenExchange { message: message.into(), status }
    }

    /// Create a discovery error
    pub fn discovery<S: Into<String>>(message: S) -> Self {
        Self::Discovery { message: message.into(), source: None }
    }

    /// Create a transport error with context
    pub fn transport<S: Into<String>>(
        context: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Transport { context: context.into(), source }
    }

    /// Create an internal server error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Create a cancellation error
    pub fn cancelled<S: Into<String>>(operation: S) -> Self {
        Self::Cancelled { operation: operation.into() }
    }

    /// Get the HTTP status code that should be returned for this error
    pub fn status_code(&self) -> u16 {
        match self {
            KubegateError::Config { .. } => 500,
            KubegateError::Validation { .. } => 400,
            KubegateError::Auth { .. } => 401,
            KubegateError::UnknownTarget { .. } => 404,
            KubegateError::ResourceDenied { .. } => 403,
            KubegateError::TokenExchange { .. } => 502,
            KubegateError::Discovery { .. } => 502,
            KubegateError::Transport { .. } => 502,
            KubegateError::Io { .. } => 500,
            KubegateError::Serialization { .. } => 400,
            KubegateError::Cancelled { .. } => 499,
            KubegateError::Internal { .. } => 500,
        }
    }

    /// Check if this error kind may only arise from a reload attempt.
    ///
    /// Errors raised during a reload must never poison the running
    /// configuration or the advertised catalog.
    pub fn is_reload_safe(&self) -> bool {
        matches!(
            self,
            KubegateError::Config { .. }
                | KubegateError::Validation { .. }
                | KubegateError::Discovery { .. }
        )
    }
}

// Error conversions for common external error types
impl From<std::io::Error> for KubegateError {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<serde_json::Error> for KubegateError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

impl From<toml::de::Error> for KubegateError {
    fn from(error: toml::de::Error) -> Self {
        Self::config_with_source("Configuration parsing failed", Box::new(error))
    }
}

impl From<kube::Error> for KubegateError {
    fn from(error: kube::Error) -> Self {
        match error {
            kube::Error::Service(source) => {
                // Unwrap access-control denials raised inside the client's
                // service stack so callers see the original error kind.
                match source.downcast::<KubegateError>() {
                    Ok(inner) => *inner,
                    Err(source) => Self::Transport {
                        context: "Kubernetes request failed".to_string(),
                        source,
                    },
                }
            }
            other => Self::Transport {
                context: "Kubernetes request failed".to_string(),
                source: Box::new(other),
            },
        }
    }
}

impl From<reqwest::Error> for KubegateError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport { context: "HTTP request failed".to_string(), source: Box::new(error) }
    }
}

impl From<validator::ValidationErrors> for KubegateError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}
