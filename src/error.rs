//! Error types for Parley

use thiserror::Error;

use crate::session::{SessionState, Stage};

/// Result type alias for Parley operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Parley
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing credential, empty scenario, bad settings)
    #[error("configuration error: {0}")]
    Config(String),

    /// Microphone denied or absent
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// A remote call failed, timed out, or returned something unusable
    #[error("{stage} failed: {message}")]
    Service {
        /// Stage the failing call belonged to
        stage: Stage,
        /// Provider or transport detail
        message: String,
    },

    /// Operation not valid from the current session state
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        /// State the session was in
        state: SessionState,
        /// Operation that was attempted
        action: &'static str,
    },

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Build a service error for `stage`
    pub fn service(stage: Stage, message: impl Into<String>) -> Self {
        Self::Service {
            stage,
            message: message.into(),
        }
    }

    /// Stage of a service error, if this is one
    #[must_use]
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::Service { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Re-label any error as a failure of `stage`
    ///
    /// Transport and decoding errors from providers surface to the session
    /// as the stage they interrupted
    #[must_use]
    pub fn at_stage(self, stage: Stage) -> Self {
        match self {
            Self::Service { .. } => self,
            other => Self::service(stage, other.to_string()),
        }
    }
}
