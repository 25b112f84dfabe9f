//! Handle for communicating with a session actor.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::commands::SessionCommand;
use super::observers::PlaybackPosition;
use super::state::{LogEntry, SessionState};
use super::timers::TimerKind;
use super::{Lifecycle, SessionError, SessionId, StreamTarget};
use crate::media::{LevelSelection, RenderSurface};
use crate::metrics::MetricsSnapshot;
use crate::segments::TimelineSnapshot;
use crate::throttle::ThrottleProfile;

/// Handle for communicating with a session actor.
///
/// Cheap to clone. Every call returns once the actor has applied the
/// command; `SessionError::Closed` means the actor is gone.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    id: SessionId,
    label: String,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Creates a new handle with the given command sender.
    pub fn new(id: SessionId, label: String, sender: mpsc::Sender<SessionCommand>) -> Self {
        Self { id, label, sender }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (responder, rx) = oneshot::channel();
        self.send(build(responder)).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Binds a render surface to the session and attaches the engine.
    ///
    /// # Errors
    /// - `SessionError::Init` - Engine unsupported, already initialized or
    ///   session destroyed; the surface is returned inside the error
    /// - `SessionError::Closed` - Session actor is gone
    pub async fn initialize(&self, surface: RenderSurface) -> Result<(), SessionError> {
        let result = self
            .request(|responder| SessionCommand::Initialize { surface, responder })
            .await?;
        result.map_err(|(error, surface)| SessionError::Init { error, surface })
    }

    /// Loads a stream. Manifest acquisition continues asynchronously.
    pub async fn load(&self, target: StreamTarget) -> Result<(), SessionError> {
        self.request(|responder| SessionCommand::Load { target, responder })
            .await
    }

    /// Loads a stream after the configured start delay.
    pub async fn load_deferred(&self, target: StreamTarget) -> Result<(), SessionError> {
        self.request(|responder| SessionCommand::LoadDeferred { target, responder })
            .await
    }

    pub async fn play(&self) -> Result<(), SessionError> {
        self.request(|responder| SessionCommand::Play { responder })
            .await
    }

    pub async fn pause(&self) -> Result<(), SessionError> {
        self.request(|responder| SessionCommand::Pause { responder })
            .await
    }

    pub async fn seek(&self, time_sec: f64) -> Result<(), SessionError> {
        self.request(|responder| SessionCommand::Seek {
            time_sec,
            responder,
        })
        .await
    }

    /// Replaces the session's throttle profile.
    pub async fn set_throttle(&self, profile: ThrottleProfile) -> Result<(), SessionError> {
        self.request(|responder| SessionCommand::SetThrottle { profile, responder })
            .await
    }

    /// Applies a profile by name and returns the profile actually applied.
    ///
    /// Unknown names are logged as a warning and treated as unlimited.
    pub async fn set_throttle_by_name(&self, name: &str) -> Result<ThrottleProfile, SessionError> {
        let name = name.to_string();
        self.request(|responder| SessionCommand::SetThrottleByName { name, responder })
            .await
    }

    /// Overrides the engine's level selection.
    pub async fn set_quality_level(&self, selection: LevelSelection) -> Result<(), SessionError> {
        self.request(|responder| SessionCommand::SetQualityLevel {
            selection,
            responder,
        })
        .await
    }

    /// Starts metrics polling and returns the effective interval.
    ///
    /// Intervals below the configured minimum are clamped. Calling it again
    /// with the running interval keeps the existing cadence.
    pub async fn start_metrics_update(
        &self,
        interval: Option<Duration>,
    ) -> Result<Duration, SessionError> {
        self.request(|responder| SessionCommand::StartMetrics {
            interval,
            responder,
        })
        .await
    }

    pub async fn stop_metrics_update(&self) -> Result<(), SessionError> {
        self.request(|responder| SessionCommand::StopMetrics { responder })
            .await
    }

    /// Feeds a playback position to the session as if polled from its surface.
    pub async fn report_playback(
        &self,
        current_time: f64,
        duration: Option<f64>,
    ) -> Result<(), SessionError> {
        let position = PlaybackPosition {
            current_time,
            duration,
        };
        self.request(|responder| SessionCommand::ReportPlayback {
            position,
            responder,
        })
        .await
    }

    pub async fn on_metrics<F>(&self, observer: F) -> Result<(), SessionError>
    where
        F: Fn(&MetricsSnapshot) + Send + 'static,
    {
        self.send(SessionCommand::OnMetrics {
            observer: Box::new(observer),
        })
        .await
    }

    pub async fn on_log<F>(&self, observer: F) -> Result<(), SessionError>
    where
        F: Fn(&LogEntry) + Send + 'static,
    {
        self.send(SessionCommand::OnLog {
            observer: Box::new(observer),
        })
        .await
    }

    /// Registers for the pretty-printed JSON manifest diagnostic.
    pub async fn on_manifest<F>(&self, observer: F) -> Result<(), SessionError>
    where
        F: Fn(&str) + Send + 'static,
    {
        self.send(SessionCommand::OnManifest {
            observer: Box::new(observer),
        })
        .await
    }

    pub async fn on_segments<F>(&self, observer: F) -> Result<(), SessionError>
    where
        F: Fn(&TimelineSnapshot) + Send + 'static,
    {
        self.send(SessionCommand::OnSegments {
            observer: Box::new(observer),
        })
        .await
    }

    pub async fn on_playback<F>(&self, observer: F) -> Result<(), SessionError>
    where
        F: Fn(&PlaybackPosition) + Send + 'static,
    {
        self.send(SessionCommand::OnPlayback {
            observer: Box::new(observer),
        })
        .await
    }

    pub async fn state(&self) -> Result<SessionState, SessionError> {
        self.request(|responder| SessionCommand::GetState { responder })
            .await
    }

    pub async fn metrics(&self) -> Result<MetricsSnapshot, SessionError> {
        self.request(|responder| SessionCommand::GetMetrics { responder })
            .await
    }

    pub async fn segments(&self) -> Result<TimelineSnapshot, SessionError> {
        self.request(|responder| SessionCommand::GetSegments { responder })
            .await
    }

    /// Session log, newest entry first.
    pub async fn logs(&self) -> Result<Vec<LogEntry>, SessionError> {
        self.request(|responder| SessionCommand::GetLogs { responder })
            .await
    }

    pub async fn lifecycle(&self) -> Result<Lifecycle, SessionError> {
        self.request(|responder| SessionCommand::GetLifecycle { responder })
            .await
    }

    /// Playback position of the bound surface, 0 when none is bound.
    pub async fn current_time(&self) -> Result<f64, SessionError> {
        self.request(|responder| SessionCommand::GetCurrentTime { responder })
            .await
    }

    pub async fn throttle(&self) -> Result<ThrottleProfile, SessionError> {
        self.request(|responder| SessionCommand::GetThrottle { responder })
            .await
    }

    /// Timers currently owned by the session.
    pub async fn active_timers(&self) -> Result<Vec<TimerKind>, SessionError> {
        self.request(|responder| SessionCommand::GetActiveTimers { responder })
            .await
    }

    /// Destroys the session and hands back its render surface.
    ///
    /// Returns `None` when no surface was bound or the session was already
    /// destroyed. Once this returns, no timer or observer of the session
    /// fires again.
    pub async fn destroy(&self) -> Result<Option<RenderSurface>, SessionError> {
        self.request(|responder| SessionCommand::Destroy { responder })
            .await
    }
}
