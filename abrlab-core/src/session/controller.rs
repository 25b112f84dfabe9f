//! Session controller: all state and behavior of one playback session.
//!
//! Runs inside the session actor. Every method is synchronous; the actor
//! serializes commands, engine events and timer ticks onto it.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

use super::commands::InitResult;
use super::observers::{Observers, PlaybackPosition};
use super::recovery::{RecoveryAction, RecoveryPolicy};
use super::state::{LogBuffer, LogEntry, LogLevel, SessionState};
use super::timers::{TimerArena, TimerKind, TimerTick};
use super::{InitError, Lifecycle, SessionId, StreamKind, StreamTarget};
use crate::config::AbrLabConfig;
use crate::media::{
    EngineAdapter, EngineEvent, EngineFailure, LevelSelection, MediaEngine, MediaEvent,
    QualityLevel, RenderSurface,
};
use crate::metrics::{self, MetricsSnapshot, PlaybackSample};
use crate::segments::{SegmentTimeline, TimelineSnapshot};
use crate::throttle::{ThrottleProfile, ThrottleSimulator};

#[derive(Serialize)]
struct ManifestLevel<'a> {
    bitrate: u64,
    width: u32,
    height: u32,
    codecs: &'a str,
}

#[derive(Serialize)]
struct ManifestDiagnostic<'a> {
    levels: Vec<ManifestLevel<'a>>,
    url: &'a str,
}

/// State and behavior of one playback session.
pub struct SessionController {
    id: SessionId,
    label: String,
    config: AbrLabConfig,
    adapter: EngineAdapter,
    surface: Option<RenderSurface>,
    engine_events: Option<mpsc::UnboundedReceiver<EngineEvent>>,
    lifecycle: Lifecycle,
    target: Option<StreamTarget>,
    deferred_target: Option<StreamTarget>,
    metrics: MetricsSnapshot,
    throttle: ThrottleSimulator,
    timeline: SegmentTimeline,
    logs: LogBuffer,
    recovery: RecoveryPolicy,
    timers: TimerArena,
    observers: Observers,
}

impl SessionController {
    /// Creates a controller and the receiver its timer ticks arrive on.
    pub fn new(
        engine: Box<dyn MediaEngine>,
        config: AbrLabConfig,
        label: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<TimerTick>) {
        let (timers, ticks) = TimerArena::new();
        let controller = Self {
            id: SessionId::new(),
            label: label.into(),
            adapter: EngineAdapter::new(engine),
            surface: None,
            engine_events: None,
            lifecycle: Lifecycle::Uninitialized,
            target: None,
            deferred_target: None,
            metrics: MetricsSnapshot::default(),
            throttle: ThrottleSimulator::new(),
            timeline: SegmentTimeline::new(config.tracker.clone()),
            logs: LogBuffer::new(config.session.log_capacity),
            recovery: RecoveryPolicy::new(),
            timers,
            observers: Observers::default(),
            config,
        };
        (controller, ticks)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Next raw engine event; pends forever while no engine is attached.
    pub async fn next_engine_event(&mut self) -> EngineEvent {
        if let Some(events) = self.engine_events.as_mut() {
            if let Some(event) = events.recv().await {
                return event;
            }
            self.engine_events = None;
        }
        std::future::pending().await
    }

    fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry::new(level, message);
        match level {
            LogLevel::Info => tracing::info!(session = %self.label, "{}", entry.message),
            LogLevel::Warn => tracing::warn!(session = %self.label, "{}", entry.message),
            LogLevel::Error => tracing::error!(session = %self.label, "{}", entry.message),
        }
        self.observers.logs.notify(&entry);
        self.logs.push(entry);
    }

    /// Binds the render surface and attaches the engine.
    pub fn initialize(&mut self, mut surface: RenderSurface) -> InitResult {
        match self.lifecycle {
            Lifecycle::Destroyed => return Err((InitError::SessionDestroyed, surface)),
            Lifecycle::Uninitialized => {}
            _ => return Err((InitError::AlreadyInitialized, surface)),
        }
        if !self.adapter.supports_adaptive_streaming() {
            self.log(LogLevel::Error, "Adaptive streaming is not supported on this platform");
            return Err((InitError::EngineUnsupported, surface));
        }

        let events = self.adapter.attach(surface.as_mut());
        self.engine_events = Some(events);
        self.surface = Some(surface);
        self.adapter.set_buffer_config(self.config.buffer.default);
        self.lifecycle = Lifecycle::Ready;
        self.timers
            .start_interval(TimerKind::PlaybackPoll, self.config.session.playback_poll_interval);
        self.log(LogLevel::Info, "Media engine initialized successfully");
        Ok(())
    }

    /// Loads a stream, replacing whatever was loaded or loading.
    pub fn load(&mut self, target: StreamTarget) {
        if self.lifecycle == Lifecycle::Destroyed {
            self.log(LogLevel::Warn, "Cannot load source: session destroyed");
            return;
        }
        if !self.adapter.is_attached() || !self.lifecycle.accepts_load() {
            self.log(LogLevel::Error, "Cannot load source: engine not initialized");
            return;
        }

        self.timers.cancel(TimerKind::DeferredLoad);
        self.timers.cancel(TimerKind::LookAhead);
        self.deferred_target = None;
        self.timeline.clear();
        self.recovery.reset();
        self.metrics = MetricsSnapshot::default();

        self.log(LogLevel::Info, format!("Loading source: {}", target.url()));
        // Direct sources never produce a manifest, so they are ready at once.
        self.lifecycle = match target.kind() {
            StreamKind::Adaptive => {
                self.adapter.load_source(target.url());
                Lifecycle::Loading
            }
            StreamKind::Progressive | StreamKind::Uploaded => {
                if let Some(surface) = self.surface.as_mut() {
                    surface.set_source(target.url());
                }
                Lifecycle::Ready
            }
        };

        self.target = Some(target);
        self.notify_segments();
    }

    /// Schedules a load after the configured start delay.
    pub fn load_deferred(&mut self, target: StreamTarget) {
        if !self.adapter.is_attached() || !self.lifecycle.accepts_load() {
            self.log(LogLevel::Error, "Cannot load source: engine not initialized");
            return;
        }
        tracing::debug!(session = %self.label, "Deferring load of {}", target.url());
        self.deferred_target = Some(target);
        self.timers
            .start_once(TimerKind::DeferredLoad, self.config.session.deferred_start_delay);
    }

    fn control_allowed(&mut self, operation: &str) -> bool {
        if self.lifecycle.accepts_control() {
            return true;
        }
        self.log(
            LogLevel::Warn,
            format!("Cannot {operation}: session is {}", self.lifecycle),
        );
        false
    }

    pub fn play(&mut self) {
        if !self.control_allowed("play") {
            return;
        }
        if let Some(surface) = self.surface.as_mut() {
            surface.play();
        }
        self.lifecycle = Lifecycle::Playing;
    }

    pub fn pause(&mut self) {
        if !self.control_allowed("pause") {
            return;
        }
        if let Some(surface) = self.surface.as_mut() {
            surface.pause();
        }
        self.lifecycle = Lifecycle::Paused;
    }

    /// Seeks the surface. Negative and non-finite times clamp to 0.
    pub fn seek(&mut self, time_sec: f64) {
        if !self.control_allowed("seek") {
            return;
        }
        let time_sec = if time_sec.is_finite() { time_sec.max(0.0) } else { 0.0 };
        if let Some(surface) = self.surface.as_mut() {
            surface.seek(time_sec);
        }
        tracing::debug!(session = %self.label, "Seeked to {:.1}s", time_sec);
    }

    /// Applies a throttle profile, replacing the active one.
    pub fn set_throttle(&mut self, profile: ThrottleProfile) {
        if self.lifecycle == Lifecycle::Destroyed {
            self.log(LogLevel::Warn, "Cannot throttle: session destroyed");
            return;
        }
        let outcome = self
            .throttle
            .apply(&mut self.adapter, profile, &self.config.buffer);

        if profile.is_unlimited() {
            self.log(LogLevel::Info, "Bandwidth limit removed");
        } else {
            self.log(
                LogLevel::Info,
                format!("Bandwidth limited to {}kbps", profile.cap_kbps()),
            );
        }
        if outcome.demoted_to.is_some() {
            self.log(LogLevel::Info, "Switched to lower quality due to bandwidth limit");
        }
        self.refresh_metrics();
    }

    /// Resolves a profile name and applies it; unknown names mean unlimited.
    pub fn set_throttle_by_name(&mut self, name: &str) -> ThrottleProfile {
        let profile = match name.parse::<ThrottleProfile>() {
            Ok(profile) => profile,
            Err(e) => {
                self.log(LogLevel::Warn, format!("{e}, using unlimited"));
                ThrottleProfile::unlimited()
            }
        };
        self.set_throttle(profile);
        profile
    }

    /// Manually overrides level selection.
    pub fn set_quality_level(&mut self, selection: LevelSelection) {
        if !self.adapter.is_attached() {
            self.log(LogLevel::Warn, "Cannot change quality: engine not initialized");
            return;
        }
        self.adapter.set_level_selection(selection);
        self.log(
            LogLevel::Info,
            format!("Quality level changed to: {}", selection.as_index()),
        );
        self.refresh_metrics();
    }

    /// Starts metrics polling. Restarting at the running interval is a no-op.
    pub fn start_metrics_update(&mut self, interval: Option<Duration>) -> Duration {
        let interval = self
            .config
            .metrics
            .clamp_interval(interval.unwrap_or(self.config.metrics.default_interval));
        if self.lifecycle == Lifecycle::Destroyed {
            self.log(LogLevel::Warn, "Cannot start metrics: session destroyed");
            return interval;
        }
        if self.timers.period(TimerKind::MetricsPoll) == Some(interval) {
            tracing::debug!(session = %self.label, "Metrics polling already running");
            return interval;
        }
        self.timers.start_interval(TimerKind::MetricsPoll, interval);
        interval
    }

    pub fn stop_metrics_update(&mut self) {
        self.timers.cancel(TimerKind::MetricsPoll);
    }

    pub fn on_metrics(&mut self, observer: Box<dyn Fn(&MetricsSnapshot) + Send>) {
        self.observers.metrics.register(observer);
    }

    pub fn on_log(&mut self, observer: Box<dyn Fn(&LogEntry) + Send>) {
        self.observers.logs.register(observer);
    }

    pub fn on_manifest(&mut self, observer: Box<dyn Fn(&str) + Send>) {
        self.observers.manifest.register(observer);
    }

    pub fn on_segments(&mut self, observer: Box<dyn Fn(&TimelineSnapshot) + Send>) {
        self.observers.segments.register(observer);
    }

    pub fn on_playback(&mut self, observer: Box<dyn Fn(&PlaybackPosition) + Send>) {
        self.observers.playback.register(observer);
    }

    /// Handles one timer tick; stale ticks are dropped.
    pub fn handle_tick(&mut self, tick: TimerTick) {
        if !self.timers.accept(&tick) {
            tracing::trace!(session = %self.label, "Dropping stale {:?} tick", tick.kind);
            return;
        }
        match tick.kind {
            TimerKind::MetricsPoll => self.refresh_metrics(),
            TimerKind::PlaybackPoll => self.poll_playback(),
            TimerKind::LookAhead => self.lookahead_tick(),
            TimerKind::DeferredLoad => {
                if let Some(target) = self.deferred_target.take() {
                    self.load(target);
                }
            }
        }
    }

    fn sample(&self) -> PlaybackSample {
        match self.surface.as_ref() {
            Some(surface) => PlaybackSample {
                current_time: surface.current_time(),
                duration: surface.duration(),
                buffered_end: surface.buffered_end(),
                dropped_frames: surface.dropped_frames(),
            },
            None => PlaybackSample::default(),
        }
    }

    fn refresh_metrics(&mut self) {
        let levels = self.adapter.levels();
        let current = self.adapter.current_level().map(|level| level.index);
        self.metrics = metrics::compute(&levels, current, &self.sample());
        self.observers.metrics.notify(&self.metrics);
    }

    fn poll_playback(&mut self) {
        let Some(surface) = self.surface.as_ref() else {
            return;
        };
        let position = PlaybackPosition {
            current_time: surface.current_time(),
            duration: surface.duration(),
        };
        self.report_playback(position);
    }

    /// Applies a playback position to observers and the segment timeline.
    pub fn report_playback(&mut self, position: PlaybackPosition) {
        if self.lifecycle == Lifecycle::Destroyed {
            return;
        }
        self.observers.playback.notify(&position);
        if self.timeline.advance(position.current_time, position.duration) {
            self.ensure_lookahead();
            self.notify_segments();
        }
    }

    /// Restarts the look-ahead timer when pending segments enter the window.
    fn ensure_lookahead(&mut self) {
        if self.lifecycle == Lifecycle::Errored
            || self.timers.is_running(TimerKind::LookAhead)
            || !self.timeline.has_pending_in_window()
        {
            return;
        }
        self.timers
            .start_interval(TimerKind::LookAhead, self.config.tracker.lookahead_interval);
    }

    fn lookahead_tick(&mut self) {
        if self.timeline.advance_lookahead().is_some() {
            self.notify_segments();
        }
        if !self.timeline.has_pending_in_window() {
            self.timers.cancel(TimerKind::LookAhead);
            tracing::debug!(session = %self.label, "Look-ahead window filled");
        }
    }

    fn notify_segments(&self) {
        if !self.observers.segments.is_empty() {
            self.observers.segments.notify(&self.timeline.snapshot());
        }
    }

    /// Handles one raw engine event.
    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        if self.lifecycle == Lifecycle::Destroyed {
            return;
        }
        tracing::trace!(session = %self.label, "Engine event {}", event.as_str());
        let Some(event) = self.adapter.translate(event) else {
            return;
        };
        if event.is_progress() {
            self.recovery.on_progress();
        }

        match event {
            MediaEvent::ManifestReady { url, levels } => self.on_manifest_ready(&url, &levels),
            MediaEvent::PlaylistLoaded { level, fragments } => {
                let default_bitrate = self
                    .adapter
                    .current_level()
                    .map(|current| current.bitrate_bps)
                    .unwrap_or_else(|| self.adapter.bandwidth_estimate());
                self.timeline.ingest(&fragments, default_bitrate);
                tracing::debug!(
                    session = %self.label,
                    "Playlist for level {} has {} segments",
                    level,
                    self.timeline.len()
                );
                if let Some(surface) = self.surface.as_ref() {
                    let (current_time, duration) = (surface.current_time(), surface.duration());
                    self.timeline.advance(current_time, duration);
                }
                self.ensure_lookahead();
                self.notify_segments();
            }
            MediaEvent::LevelSwitched { level } => {
                self.log(LogLevel::Info, format!("Quality switched to: {}", level.label()));
                self.refresh_metrics();
            }
            MediaEvent::FragmentLoaded { fragment } => {
                if self.timeline.mark_fragment_loaded(&fragment).is_some() {
                    self.notify_segments();
                }
                self.refresh_metrics();
            }
            MediaEvent::Error(failure) => self.on_engine_error(failure),
            MediaEvent::BufferAppended => self.refresh_metrics(),
            MediaEvent::BufferEndOfStream => self.log(LogLevel::Info, "Buffer end of stream"),
        }
    }

    fn on_manifest_ready(&mut self, url: &str, levels: &[QualityLevel]) {
        self.log(
            LogLevel::Info,
            format!("Manifest loaded with {} quality levels", levels.len()),
        );

        let diagnostic = ManifestDiagnostic {
            levels: levels
                .iter()
                .map(|level| ManifestLevel {
                    bitrate: level.bitrate_bps,
                    width: level.width,
                    height: level.height,
                    codecs: &level.codec,
                })
                .collect(),
            url,
        };
        match serde_json::to_string_pretty(&diagnostic) {
            Ok(text) => self.observers.manifest.notify(&text),
            Err(e) => tracing::warn!(session = %self.label, "Manifest diagnostic failed: {}", e),
        }

        if self.throttle.reevaluate(&mut self.adapter).is_some() {
            self.log(LogLevel::Info, "Switched to lower quality due to bandwidth limit");
        }
        if self.lifecycle == Lifecycle::Loading {
            self.lifecycle = Lifecycle::Ready;
        }
        self.refresh_metrics();
    }

    fn on_engine_error(&mut self, failure: EngineFailure) {
        let message = format!("{} error: {}", failure.kind, failure.details);
        if !failure.fatal {
            self.log(LogLevel::Warn, message);
            if let Some(index) = failure.fragment_index
                && self.timeline.mark_error(index)
            {
                self.notify_segments();
            }
            return;
        }

        self.log(LogLevel::Error, message);
        match self.recovery.on_fatal(failure.kind) {
            RecoveryAction::Reload => {
                self.log(LogLevel::Error, "Fatal network error encountered, trying to recover");
                self.adapter.start_load();
            }
            RecoveryAction::RecoverMedia => {
                self.log(LogLevel::Error, "Fatal media error encountered, trying to recover");
                self.adapter.recover_media_error();
            }
            RecoveryAction::GiveUp => {
                self.log(LogLevel::Error, "Fatal error, cannot recover");
                self.timers.cancel(TimerKind::LookAhead);
                self.lifecycle = Lifecycle::Errored;
            }
        }
    }

    /// Releases the engine and every timer and observer, returning the surface.
    pub fn destroy(&mut self) -> Option<RenderSurface> {
        if self.lifecycle == Lifecycle::Destroyed {
            return None;
        }
        let cancelled = self.timers.cancel_all();
        self.adapter.destroy();
        self.engine_events = None;
        self.deferred_target = None;
        self.throttle.reset();
        self.timeline.clear();
        self.lifecycle = Lifecycle::Destroyed;
        tracing::debug!(session = %self.label, "Cancelled {} timers", cancelled);
        self.log(LogLevel::Info, "Session destroyed");
        self.observers.clear();
        self.surface.take()
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            id: self.id,
            label: self.label.clone(),
            lifecycle: self.lifecycle,
            target: self.target.clone(),
            metrics: self.metrics.clone(),
            throttle: self.throttle.active(),
            segments: self.timeline.snapshot(),
            logs: self.logs.entries(),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.clone()
    }

    pub fn segments(&self) -> TimelineSnapshot {
        self.timeline.snapshot()
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs.entries()
    }

    pub fn current_time(&self) -> f64 {
        self.surface
            .as_ref()
            .map(|surface| surface.current_time())
            .unwrap_or(0.0)
    }

    pub fn throttle(&self) -> ThrottleProfile {
        self.throttle.active()
    }

    pub fn active_timers(&self) -> Vec<TimerKind> {
        self.timers.active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::test_mocks::{
        MockEngine, MockEngineProbe, MockSurface, MockSurfaceProbe, sample_levels,
    };

    const STREAM: &str = "https://test-streams.mux.dev/x36xhzz/x36xhzz.m3u8";

    fn ready_controller() -> (SessionController, MockEngineProbe, MockSurfaceProbe) {
        let (engine, engine_probe) = MockEngine::new(sample_levels());
        let (mut controller, _ticks) =
            SessionController::new(Box::new(engine), AbrLabConfig::default(), "test");
        let (surface, surface_probe) = MockSurface::new();
        assert!(controller.initialize(Box::new(surface)).is_ok());
        (controller, engine_probe, surface_probe)
    }

    fn drain_events(controller: &mut SessionController) {
        while let Some(events) = controller.engine_events.as_mut() {
            match events.try_recv() {
                Ok(event) => controller.handle_engine_event(event),
                Err(_) => break,
            }
        }
    }

    fn messages(controller: &SessionController) -> Vec<String> {
        controller.logs().into_iter().map(|e| e.message).collect()
    }

    #[test]
    fn test_engine_events_pend_until_attached() {
        let (engine, _) = MockEngine::new(sample_levels());
        let (mut controller, _ticks) =
            SessionController::new(Box::new(engine), AbrLabConfig::default(), "test");
        let mut next = tokio_test::task::spawn(controller.next_engine_event());
        tokio_test::assert_pending!(next.poll());
    }

    #[tokio::test]
    async fn test_engine_event_wakes_actor() {
        let (mut controller, engine, _) = ready_controller();
        let mut next = tokio_test::task::spawn(controller.next_engine_event());
        tokio_test::assert_pending!(next.poll());

        engine.emit(EngineEvent::BufferAppended);
        assert!(next.is_woken());
        tokio_test::assert_ready_eq!(next.poll(), EngineEvent::BufferAppended);
    }

    #[tokio::test]
    async fn test_initialize_twice_is_refused() {
        let (mut controller, _, _) = ready_controller();
        let (surface, _) = MockSurface::new();
        let (error, _surface) = controller.initialize(Box::new(surface)).unwrap_err();
        assert_eq!(error, InitError::AlreadyInitialized);
    }

    #[tokio::test]
    async fn test_unsupported_engine_returns_surface() {
        let (engine, _) = MockEngine::unsupported();
        let (mut controller, _ticks) =
            SessionController::new(Box::new(engine), AbrLabConfig::default(), "test");
        let (surface, _) = MockSurface::new();

        let (error, _surface) = controller.initialize(Box::new(surface)).unwrap_err();
        assert_eq!(error, InitError::EngineUnsupported);
        assert_eq!(controller.lifecycle(), Lifecycle::Uninitialized);
    }

    #[tokio::test]
    async fn test_control_before_initialize_warns() {
        let (engine, _) = MockEngine::new(sample_levels());
        let (mut controller, _ticks) =
            SessionController::new(Box::new(engine), AbrLabConfig::default(), "test");

        controller.play();
        controller.seek(3.0);

        assert_eq!(controller.lifecycle(), Lifecycle::Uninitialized);
        let logs = controller.logs();
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|e| e.level == LogLevel::Warn));
        assert_eq!(logs[0].message, "Cannot seek: session is uninitialized");
    }

    #[tokio::test]
    async fn test_load_flows_through_manifest_and_playlist() {
        let (mut controller, engine_probe, _) = ready_controller();
        let target = StreamTarget::adaptive(STREAM, "Big Buck Bunny").unwrap();

        controller.load(target);
        assert_eq!(controller.lifecycle(), Lifecycle::Loading);
        drain_events(&mut controller);

        assert_eq!(engine_probe.loaded_sources(), vec![STREAM]);
        assert_eq!(controller.lifecycle(), Lifecycle::Ready);
        assert_eq!(controller.segments().segments.len(), 10);
        assert!(controller.active_timers().contains(&TimerKind::LookAhead));
        let log = messages(&controller);
        assert!(log.contains(&"Manifest loaded with 3 quality levels".to_string()));
        assert!(log.contains(&"Quality switched to: 1080p (3000kbps)".to_string()));
        assert_eq!(controller.metrics().current_level_index, 2);
    }

    #[tokio::test]
    async fn test_progressive_target_bypasses_engine() {
        let (mut controller, engine_probe, surface_probe) = ready_controller();
        let target = StreamTarget::progressive("https://example.com/clip.mp4", "clip").unwrap();

        controller.load(target);
        assert!(engine_probe.loaded_sources().is_empty());
        assert_eq!(surface_probe.sources(), vec!["https://example.com/clip.mp4"]);
        assert_eq!(controller.lifecycle(), Lifecycle::Ready);

        controller.play();
        assert_eq!(controller.lifecycle(), Lifecycle::Playing);
    }

    #[tokio::test]
    async fn test_network_recovery_once_then_gives_up() {
        let (mut controller, engine_probe, _) = ready_controller();
        controller.load(StreamTarget::adaptive(STREAM, "bbb").unwrap());
        drain_events(&mut controller);

        engine_probe.emit_error("networkError", "manifestLoadError", true);
        drain_events(&mut controller);
        assert_eq!(engine_probe.start_load_calls(), 1);
        assert_eq!(controller.lifecycle(), Lifecycle::Ready);

        engine_probe.emit_error("networkError", "manifestLoadError", true);
        drain_events(&mut controller);
        assert_eq!(engine_probe.start_load_calls(), 1);
        assert_eq!(controller.lifecycle(), Lifecycle::Errored);
        assert_eq!(messages(&controller)[0], "Fatal error, cannot recover");
    }

    #[tokio::test]
    async fn test_progress_resets_recovery_budget() {
        let (mut controller, engine_probe, _) = ready_controller();
        controller.load(StreamTarget::adaptive(STREAM, "bbb").unwrap());
        drain_events(&mut controller);

        engine_probe.emit_error("mediaError", "bufferStalledError", true);
        engine_probe.emit(EngineEvent::BufferAppended);
        engine_probe.emit_error("mediaError", "bufferStalledError", true);
        drain_events(&mut controller);

        assert_eq!(engine_probe.recover_media_calls(), 2);
        assert_ne!(controller.lifecycle(), Lifecycle::Errored);
    }

    #[tokio::test]
    async fn test_other_fatal_errors_surface_immediately() {
        let (mut controller, engine_probe, _) = ready_controller();
        controller.load(StreamTarget::adaptive(STREAM, "bbb").unwrap());
        drain_events(&mut controller);

        engine_probe.emit_error("keySystemError", "keySystemNoKeys", true);
        drain_events(&mut controller);

        assert_eq!(controller.lifecycle(), Lifecycle::Errored);
        assert_eq!(engine_probe.start_load_calls(), 0);
        assert!(messages(&controller).contains(&"other error: keySystemNoKeys".to_string()));

        // Errored sessions may be reloaded.
        controller.load(StreamTarget::adaptive(STREAM, "bbb").unwrap());
        assert_eq!(controller.lifecycle(), Lifecycle::Loading);
    }

    #[tokio::test]
    async fn test_non_fatal_fragment_error_marks_segment() {
        let (mut controller, engine_probe, _) = ready_controller();
        controller.load(StreamTarget::adaptive(STREAM, "bbb").unwrap());
        drain_events(&mut controller);

        engine_probe.emit(EngineEvent::Error {
            error_type: "networkError".to_string(),
            details: "fragLoadError".to_string(),
            fatal: false,
            fragment: Some(4),
        });
        drain_events(&mut controller);

        let segments = controller.segments();
        assert_eq!(segments.segments[4].status, crate::segments::SegmentStatus::Error);
        assert_eq!(engine_probe.start_load_calls(), 0);
        assert_eq!(controller.logs()[0].level, LogLevel::Warn);
    }

    #[tokio::test]
    async fn test_throttle_logs_and_demotes() {
        let (mut controller, engine_probe, _) = ready_controller();
        controller.load(StreamTarget::adaptive(STREAM, "bbb").unwrap());
        drain_events(&mut controller);

        controller.set_throttle(ThrottleProfile::custom(1_000_000, 0));
        assert_eq!(engine_probe.current_level(), Some(0));
        let log = messages(&controller);
        assert_eq!(log[0], "Switched to lower quality due to bandwidth limit");
        assert_eq!(log[1], "Bandwidth limited to 1000kbps");
        assert_eq!(controller.metrics().bitrate_kbps, 400);

        controller.set_throttle(ThrottleProfile::unlimited());
        assert_eq!(engine_probe.current_level(), Some(2));
        assert_eq!(messages(&controller)[0], "Bandwidth limit removed");
    }

    #[tokio::test]
    async fn test_throttle_before_manifest_applies_on_arrival() {
        let (mut controller, engine_probe, _) = ready_controller();
        controller.set_throttle(ThrottleProfile::slow_3g());

        controller.load(StreamTarget::adaptive(STREAM, "bbb").unwrap());
        drain_events(&mut controller);

        assert_eq!(engine_probe.current_level(), Some(0));
        assert_eq!(controller.metrics().quality_label, "360p (400kbps)");
    }

    #[tokio::test]
    async fn test_unknown_profile_name_means_unlimited() {
        let (mut controller, _, _) = ready_controller();
        let applied = controller.set_throttle_by_name("dialup");
        assert_eq!(applied, ThrottleProfile::unlimited());
        let logs = controller.logs();
        assert_eq!(logs[1].level, LogLevel::Warn);
        assert!(logs[1].message.contains("dialup"));
    }

    #[tokio::test]
    async fn test_manifest_diagnostic_is_pretty_json() {
        use std::sync::{Arc, Mutex};

        let (mut controller, _, _) = ready_controller();
        let captured = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&captured);
        controller.on_manifest(Box::new(move |text: &str| {
            *sink.lock().unwrap() = text.to_string();
        }));

        controller.load(StreamTarget::adaptive(STREAM, "bbb").unwrap());
        drain_events(&mut controller);

        let text = captured.lock().unwrap().clone();
        assert!(text.contains('\n'));
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["url"], STREAM);
        assert_eq!(json["levels"][1]["bitrate"], 1_200_000);
        assert_eq!(json["levels"][0]["codecs"], "avc1.4d401e");
    }

    #[tokio::test]
    async fn test_destroy_returns_surface_and_is_terminal() {
        let (mut controller, engine_probe, _) = ready_controller();
        let surface = controller.destroy();
        assert!(surface.is_some());
        assert!(engine_probe.is_destroyed());
        assert!(controller.active_timers().is_empty());
        assert_eq!(controller.lifecycle(), Lifecycle::Destroyed);
        assert!(controller.destroy().is_none());

        let (error, _) = controller.initialize(surface.unwrap()).unwrap_err();
        assert_eq!(error, InitError::SessionDestroyed);
    }
}
