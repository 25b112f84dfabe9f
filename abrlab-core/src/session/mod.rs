//! Playback session controller.
//!
//! Each session is an actor task owning the engine adapter, the render
//! surface, its timers and all session state. Callers talk to it through a
//! cloneable `SessionHandle`; engine events and timer ticks arrive on
//! internal channels and are processed one at a time with commands.

pub mod actor;
pub mod commands;
pub mod controller;
pub mod handle;
pub mod observers;
pub mod recovery;
pub mod state;
pub mod timers;

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

pub use actor::spawn_session;
pub use handle::SessionHandle;
pub use observers::PlaybackPosition;
pub use recovery::{RecoveryAction, RecoveryPolicy};
pub use state::{LogEntry, LogLevel, SessionState};
pub use timers::TimerKind;

use crate::media::RenderSurface;

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    Uninitialized,
    Ready,
    Loading,
    Playing,
    Paused,
    Errored,
    Destroyed,
}

impl Lifecycle {
    /// Whether play, pause and seek are meaningful in this state.
    pub fn accepts_control(self) -> bool {
        matches!(
            self,
            Lifecycle::Ready | Lifecycle::Loading | Lifecycle::Playing | Lifecycle::Paused
        )
    }

    /// Whether a new stream may be loaded in this state.
    pub fn accepts_load(self) -> bool {
        self.accepts_control() || self == Lifecycle::Errored
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::Uninitialized => "uninitialized",
            Lifecycle::Ready => "ready",
            Lifecycle::Loading => "loading",
            Lifecycle::Playing => "playing",
            Lifecycle::Paused => "paused",
            Lifecycle::Errored => "errored",
            Lifecycle::Destroyed => "destroyed",
        };
        write!(f, "{name}")
    }
}

/// How a stream target is delivered to the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Manifest-driven adaptive stream, loaded through the engine
    Adaptive,
    /// Single progressive file assigned directly to the surface
    Progressive,
    /// Local upload assigned directly to the surface
    Uploaded,
}

/// Errors building a `StreamTarget`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("Invalid stream URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Uploaded file name is empty")]
    EmptyFileName,
}

/// Stream a session loads. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamTarget {
    url: String,
    label: String,
    kind: StreamKind,
}

impl StreamTarget {
    /// Adaptive stream from an absolute manifest URL.
    pub fn adaptive(url: &str, label: impl Into<String>) -> Result<Self, TargetError> {
        Self::remote(url, label.into(), StreamKind::Adaptive)
    }

    /// Progressive file from an absolute URL.
    pub fn progressive(url: &str, label: impl Into<String>) -> Result<Self, TargetError> {
        Self::remote(url, label.into(), StreamKind::Progressive)
    }

    /// Locally uploaded file, addressed by name.
    pub fn uploaded(file_name: &str) -> Result<Self, TargetError> {
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(TargetError::EmptyFileName);
        }
        Ok(Self {
            url: file_name.to_string(),
            label: file_name.to_string(),
            kind: StreamKind::Uploaded,
        })
    }

    fn remote(url: &str, label: String, kind: StreamKind) -> Result<Self, TargetError> {
        let parsed = Url::parse(url).map_err(|e| TargetError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            url: parsed.to_string(),
            label,
            kind,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }
}

/// Initialization failures returned synchronously to the caller.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone, Copy)]
pub enum InitError {
    #[error("Adaptive streaming is not supported by this engine")]
    EngineUnsupported,
    #[error("Session is already initialized")]
    AlreadyInitialized,
    #[error("Session has been destroyed")]
    SessionDestroyed,
}

/// Failures of a session handle call.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session actor is gone
    #[error("Session actor has shut down")]
    Closed,
    /// Initialization was refused; the surface is handed back
    #[error("Session initialization failed: {error}")]
    Init {
        #[source]
        error: InitError,
        surface: RenderSurface,
    },
}

impl SessionError {
    pub fn init_error(&self) -> Option<InitError> {
        match self {
            SessionError::Init { error, .. } => Some(*error),
            SessionError::Closed => None,
        }
    }

    /// Recovers the render surface from a refused initialization.
    pub fn into_surface(self) -> Option<RenderSurface> {
        match self {
            SessionError::Init { surface, .. } => Some(surface),
            SessionError::Closed => None,
        }
    }
}
