//! Unified error types for pictor

use thiserror::Error;

/// Classification of remote-surface failures.
///
/// The surface is an uncontrolled web application, so every operation against
/// it carries one of these kinds. `ElementNotFound` and `Timeout` are the
/// usual retryable suspects; `Network` covers navigation and transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceErrorKind {
    Network,
    ElementNotFound,
    Timeout,
    Unknown,
}

impl std::fmt::Display for SurfaceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceErrorKind::Network => write!(f, "network"),
            SurfaceErrorKind::ElementNotFound => write!(f, "element-not-found"),
            SurfaceErrorKind::Timeout => write!(f, "timeout"),
            SurfaceErrorKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Unified error type for all pictor operations
#[derive(Error, Debug)]
pub enum PictorError {
    // Precondition failures - surfaced before any browser work
    #[error("unusable prompt source: {0}")]
    EmptyPrompt(String),

    #[error("unusable session file: {0}")]
    MissingSession(String),

    // Remote surface failures
    #[error("surface {kind} failure: {message}")]
    Surface {
        kind: SurfaceErrorKind,
        message: String,
    },

    // Terminal run failure after retry exhaustion
    #[error("generation failed after {attempts} attempt(s): {reason}")]
    GenerationFailed { attempts: u32, reason: String },

    // Artifact naming exhausted every disambiguation suffix
    #[error("artifact name conflict: {0}")]
    WriteConflict(String),

    #[error("configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl PictorError {
    /// Build a surface error with the given kind.
    pub fn surface(kind: SurfaceErrorKind, message: impl Into<String>) -> Self {
        Self::Surface {
            kind,
            message: message.into(),
        }
    }
}

/// Result type alias using PictorError
pub type Result<T> = std::result::Result<T, PictorError>;
