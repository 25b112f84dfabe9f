//! Command definitions for the session actor.

use std::time::Duration;

use tokio::sync::oneshot;

use super::observers::PlaybackPosition;
use super::state::{LogEntry, SessionState};
use super::timers::TimerKind;
use super::{InitError, Lifecycle, StreamTarget};
use crate::media::{LevelSelection, RenderSurface};
use crate::metrics::MetricsSnapshot;
use crate::segments::TimelineSnapshot;
use crate::throttle::ThrottleProfile;

/// Result of an initialize request. A refused surface is handed back.
pub type InitResult = Result<(), (InitError, RenderSurface)>;

/// Commands that can be sent to a session actor.
///
/// Every command carries a responder so callers observe the command as
/// applied once the handle call returns.
pub enum SessionCommand {
    /// Bind a render surface and attach the engine.
    Initialize {
        surface: RenderSurface,
        responder: oneshot::Sender<InitResult>,
    },
    /// Load a stream now.
    Load {
        target: StreamTarget,
        responder: oneshot::Sender<()>,
    },
    /// Load a stream after the configured start delay.
    LoadDeferred {
        target: StreamTarget,
        responder: oneshot::Sender<()>,
    },
    Play {
        responder: oneshot::Sender<()>,
    },
    Pause {
        responder: oneshot::Sender<()>,
    },
    Seek {
        time_sec: f64,
        responder: oneshot::Sender<()>,
    },
    /// Replace the active throttle profile.
    SetThrottle {
        profile: ThrottleProfile,
        responder: oneshot::Sender<()>,
    },
    /// Resolve a profile by name, falling back to unlimited.
    SetThrottleByName {
        name: String,
        responder: oneshot::Sender<ThrottleProfile>,
    },
    SetQualityLevel {
        selection: LevelSelection,
        responder: oneshot::Sender<()>,
    },
    /// Start or re-pace metrics polling; `None` uses the default interval.
    StartMetrics {
        interval: Option<Duration>,
        responder: oneshot::Sender<Duration>,
    },
    StopMetrics {
        responder: oneshot::Sender<()>,
    },
    /// Feed a playback position as if polled from the surface.
    ReportPlayback {
        position: PlaybackPosition,
        responder: oneshot::Sender<()>,
    },
    OnMetrics {
        observer: Box<dyn Fn(&MetricsSnapshot) + Send>,
    },
    OnLog {
        observer: Box<dyn Fn(&LogEntry) + Send>,
    },
    OnManifest {
        observer: Box<dyn Fn(&str) + Send>,
    },
    OnSegments {
        observer: Box<dyn Fn(&TimelineSnapshot) + Send>,
    },
    OnPlayback {
        observer: Box<dyn Fn(&PlaybackPosition) + Send>,
    },
    GetState {
        responder: oneshot::Sender<SessionState>,
    },
    GetMetrics {
        responder: oneshot::Sender<MetricsSnapshot>,
    },
    GetSegments {
        responder: oneshot::Sender<TimelineSnapshot>,
    },
    GetLogs {
        responder: oneshot::Sender<Vec<LogEntry>>,
    },
    GetLifecycle {
        responder: oneshot::Sender<Lifecycle>,
    },
    GetCurrentTime {
        responder: oneshot::Sender<f64>,
    },
    GetThrottle {
        responder: oneshot::Sender<ThrottleProfile>,
    },
    GetActiveTimers {
        responder: oneshot::Sender<Vec<TimerKind>>,
    },
    /// Tear the session down and hand the surface back.
    Destroy {
        responder: oneshot::Sender<Option<RenderSurface>>,
    },
}

impl SessionCommand {
    /// Returns string representation of command type for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionCommand::Initialize { .. } => "Initialize",
            SessionCommand::Load { .. } => "Load",
            SessionCommand::LoadDeferred { .. } => "LoadDeferred",
            SessionCommand::Play { .. } => "Play",
            SessionCommand::Pause { .. } => "Pause",
            SessionCommand::Seek { .. } => "Seek",
            SessionCommand::SetThrottle { .. } => "SetThrottle",
            SessionCommand::SetThrottleByName { .. } => "SetThrottleByName",
            SessionCommand::SetQualityLevel { .. } => "SetQualityLevel",
            SessionCommand::StartMetrics { .. } => "StartMetrics",
            SessionCommand::StopMetrics { .. } => "StopMetrics",
            SessionCommand::ReportPlayback { .. } => "ReportPlayback",
            SessionCommand::OnMetrics { .. } => "OnMetrics",
            SessionCommand::OnLog { .. } => "OnLog",
            SessionCommand::OnManifest { .. } => "OnManifest",
            SessionCommand::OnSegments { .. } => "OnSegments",
            SessionCommand::OnPlayback { .. } => "OnPlayback",
            SessionCommand::GetState { .. } => "GetState",
            SessionCommand::GetMetrics { .. } => "GetMetrics",
            SessionCommand::GetSegments { .. } => "GetSegments",
            SessionCommand::GetLogs { .. } => "GetLogs",
            SessionCommand::GetLifecycle { .. } => "GetLifecycle",
            SessionCommand::GetCurrentTime { .. } => "GetCurrentTime",
            SessionCommand::GetThrottle { .. } => "GetThrottle",
            SessionCommand::GetActiveTimers { .. } => "GetActiveTimers",
            SessionCommand::Destroy { .. } => "Destroy",
        }
    }
}
