//! abrlab core - adaptive-bitrate playback session controller
//!
//! Drives an external adaptive-streaming engine through manifest
//! acquisition, quality selection and buffering, while exposing live
//! metrics, a simulated network throttle and a segment lifecycle timeline.
//! Two sessions can be composed for side-by-side comparison.

pub mod config;
pub mod media;
pub mod metrics;
pub mod segments;
pub mod session;
pub mod sync;
pub mod throttle;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::AbrLabConfig;
pub use media::{EngineErrorKind, MediaEngine, MediaSurface, QualityLevel, RenderSurface};
pub use metrics::MetricsSnapshot;
pub use session::{
    InitError, Lifecycle, SessionError, SessionHandle, StreamTarget, TargetError, spawn_session,
};
pub use sync::{ComparisonReport, DualSessionSynchronizer, SessionSlot};
pub use throttle::{ThrottleError, ThrottleProfile};

/// Errors that can bubble up from any abrlab subsystem.
#[derive(Debug, thiserror::Error)]
pub enum AbrLabError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Stream target error: {0}")]
    Target(#[from] TargetError),

    #[error("Throttle error: {0}")]
    Throttle(#[from] ThrottleError),

    #[error("Manifest diagnostic error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

impl AbrLabError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            AbrLabError::Session(e) => match e {
                SessionError::Closed => "Playback session is no longer running".to_string(),
                SessionError::Init { error, .. } => match error {
                    InitError::EngineUnsupported => {
                        "Adaptive streaming is not supported on this platform".to_string()
                    }
                    InitError::AlreadyInitialized => {
                        "Playback session is already initialized".to_string()
                    }
                    InitError::SessionDestroyed => {
                        "Playback session was destroyed; start a new one".to_string()
                    }
                },
            },
            AbrLabError::Target(TargetError::InvalidUrl { url, .. }) => {
                format!("Not a valid stream URL: {url}")
            }
            AbrLabError::Target(TargetError::EmptyFileName) => "No file selected".to_string(),
            AbrLabError::Throttle(ThrottleError::InvalidProfile { name }) => {
                format!("Unknown network profile: {name}")
            }
            AbrLabError::Serialization(_) => "Could not render diagnostics".to_string(),
            AbrLabError::Configuration { reason } => format!("Configuration error: {reason}"),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AbrLabError::Target(_) | AbrLabError::Throttle(_) | AbrLabError::Configuration { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AbrLabError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_errors() {
        let err: AbrLabError = "fast4g".parse::<ThrottleProfile>().unwrap_err().into();
        assert!(err.is_user_error());
        assert_eq!(err.user_message(), "Unknown network profile: fast4g");

        let err: AbrLabError = SessionError::Closed.into();
        assert!(!err.is_user_error());
    }
}
