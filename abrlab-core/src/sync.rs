//! Dual-session synchronizer for side-by-side comparison.
//!
//! Session A is the reference stream and is kept unthrottled by every
//! programmatic reset; session B carries the network profile under test.
//! Seeks flow from A to B only.

use std::fmt;
use std::time::Duration;

use futures::future;
use serde::Serialize;

use crate::media::RenderSurface;
use crate::metrics::MetricsSnapshot;
use crate::session::{SessionError, SessionHandle, StreamTarget};
use crate::throttle::ThrottleProfile;

/// Addresses one of the two compared sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSlot {
    A,
    B,
}

impl fmt::Display for SessionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionSlot::A => write!(f, "A"),
            SessionSlot::B => write!(f, "B"),
        }
    }
}

/// Metrics of both sessions at one instant, with B-minus-A deltas.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub a: MetricsSnapshot,
    pub b: MetricsSnapshot,
    pub a_throttle: ThrottleProfile,
    pub b_throttle: ThrottleProfile,
    pub bitrate_delta_kbps: i64,
    pub buffer_delta_sec: f64,
}

impl ComparisonReport {
    pub fn new(
        a: MetricsSnapshot,
        b: MetricsSnapshot,
        a_throttle: ThrottleProfile,
        b_throttle: ThrottleProfile,
    ) -> Self {
        let bitrate_delta_kbps = b.bitrate_kbps as i64 - a.bitrate_kbps as i64;
        let buffer_delta_sec = ((b.buffer_health_sec - a.buffer_health_sec) * 10.0).round() / 10.0;
        Self {
            a,
            b,
            a_throttle,
            b_throttle,
            bitrate_delta_kbps,
            buffer_delta_sec,
        }
    }
}

/// Owns two independently controllable sessions.
#[derive(Debug, Clone)]
pub struct DualSessionSynchronizer {
    a: SessionHandle,
    b: SessionHandle,
}

fn both(results: (Result<(), SessionError>, Result<(), SessionError>)) -> Result<(), SessionError> {
    results.0?;
    results.1
}

impl DualSessionSynchronizer {
    pub fn new(a: SessionHandle, b: SessionHandle) -> Self {
        Self { a, b }
    }

    pub fn session(&self, slot: SessionSlot) -> &SessionHandle {
        match slot {
            SessionSlot::A => &self.a,
            SessionSlot::B => &self.b,
        }
    }

    /// Binds one surface to each session.
    ///
    /// A surface refused by one session comes back inside its error.
    pub async fn initialize(
        &self,
        surface_a: RenderSurface,
        surface_b: RenderSurface,
    ) -> Result<(), SessionError> {
        both(future::join(self.a.initialize(surface_a), self.b.initialize(surface_b)).await)
    }

    /// Loads the same stream on both sessions.
    pub async fn load_both(&self, target: StreamTarget) -> Result<(), SessionError> {
        both(future::join(self.a.load(target.clone()), self.b.load(target)).await)
    }

    /// Preselects the same stream on both sessions after the start delay.
    pub async fn load_both_deferred(&self, target: StreamTarget) -> Result<(), SessionError> {
        both(
            future::join(
                self.a.load_deferred(target.clone()),
                self.b.load_deferred(target),
            )
            .await,
        )
    }

    pub async fn sync_play(&self) -> Result<(), SessionError> {
        both(future::join(self.a.play(), self.b.play()).await)
    }

    pub async fn sync_pause(&self) -> Result<(), SessionError> {
        both(future::join(self.a.pause(), self.b.pause()).await)
    }

    /// Seeks B to A's current position and returns that position.
    pub async fn sync_seek(&self) -> Result<f64, SessionError> {
        let time_sec = self.a.current_time().await?;
        self.b.seek(time_sec).await?;
        tracing::debug!("Synchronized B to A at {:.1}s", time_sec);
        Ok(time_sec)
    }

    /// Applies a profile to one session only.
    pub async fn set_throttle(
        &self,
        slot: SessionSlot,
        profile: ThrottleProfile,
    ) -> Result<(), SessionError> {
        self.session(slot).set_throttle(profile).await
    }

    /// Resets A to unlimited and applies `profile` to B.
    pub async fn apply_network_profile(&self, profile: ThrottleProfile) -> Result<(), SessionError> {
        tracing::info!("Applying network profile {} to B", profile.name);
        both(
            future::join(
                self.a.set_throttle(ThrottleProfile::unlimited()),
                self.b.set_throttle(profile),
            )
            .await,
        )
    }

    /// Named variant of `apply_network_profile`; returns the profile B received.
    pub async fn apply_network_profile_by_name(
        &self,
        name: &str,
    ) -> Result<ThrottleProfile, SessionError> {
        let (a, b) = future::join(
            self.a.set_throttle(ThrottleProfile::unlimited()),
            self.b.set_throttle_by_name(name),
        )
        .await;
        a?;
        b
    }

    /// Puts both sessions back to unlimited.
    pub async fn reset(&self) -> Result<(), SessionError> {
        both(
            future::join(
                self.a.set_throttle(ThrottleProfile::unlimited()),
                self.b.set_throttle(ThrottleProfile::unlimited()),
            )
            .await,
        )
    }

    pub async fn start_metrics_update(&self, interval: Option<Duration>) -> Result<(), SessionError> {
        let (a, b) = future::join(
            self.a.start_metrics_update(interval),
            self.b.start_metrics_update(interval),
        )
        .await;
        a?;
        b.map(|_| ())
    }

    /// Reads both sessions' metrics and throttle for comparison.
    pub async fn compare(&self) -> Result<ComparisonReport, SessionError> {
        let (a_metrics, b_metrics) = future::join(self.a.metrics(), self.b.metrics()).await;
        let (a_throttle, b_throttle) = future::join(self.a.throttle(), self.b.throttle()).await;
        Ok(ComparisonReport::new(
            a_metrics?,
            b_metrics?,
            a_throttle?,
            b_throttle?,
        ))
    }

    /// Destroys both sessions and returns their surfaces.
    pub async fn destroy(
        &self,
    ) -> Result<(Option<RenderSurface>, Option<RenderSurface>), SessionError> {
        let (a, b) = future::join(self.a.destroy(), self.b.destroy()).await;
        Ok((a?, b?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AbrLabConfig;
    use crate::media::test_mocks::{
        MockEngine, MockEngineProbe, MockSurface, MockSurfaceProbe, sample_levels,
    };
    use crate::session::{Lifecycle, spawn_session};

    const STREAM: &str = "https://test-streams.mux.dev/x36xhzz/x36xhzz.m3u8";

    struct Pair {
        sync: DualSessionSynchronizer,
        engine_a: MockEngineProbe,
        engine_b: MockEngineProbe,
        surface_a: MockSurfaceProbe,
        surface_b: MockSurfaceProbe,
    }

    async fn pair() -> Pair {
        let (engine_a, engine_a_probe) = MockEngine::new(sample_levels());
        let (engine_b, engine_b_probe) = MockEngine::new(sample_levels());
        let sync = DualSessionSynchronizer::new(
            spawn_session(engine_a, AbrLabConfig::default(), "A"),
            spawn_session(engine_b, AbrLabConfig::default(), "B"),
        );
        let (surface_a, surface_a_probe) = MockSurface::new();
        let (surface_b, surface_b_probe) = MockSurface::new();
        sync.initialize(Box::new(surface_a), Box::new(surface_b))
            .await
            .unwrap();
        Pair {
            sync,
            engine_a: engine_a_probe,
            engine_b: engine_b_probe,
            surface_a: surface_a_probe,
            surface_b: surface_b_probe,
        }
    }

    #[tokio::test]
    async fn test_sync_seek_moves_b_only() {
        let pair = pair().await;
        pair.surface_a.set_position(42.5, Some(600.0));

        let time = pair.sync.sync_seek().await.unwrap();

        assert_eq!(time, 42.5);
        assert_eq!(pair.surface_b.seeks(), vec![42.5]);
        assert!(pair.surface_a.seeks().is_empty());
    }

    #[tokio::test]
    async fn test_play_and_pause_reach_both() {
        let pair = pair().await;
        pair.sync.sync_play().await.unwrap();
        assert!(pair.surface_a.is_playing());
        assert!(pair.surface_b.is_playing());

        pair.sync.sync_pause().await.unwrap();
        assert_eq!(pair.surface_a.pause_calls(), 1);
        assert_eq!(pair.surface_b.pause_calls(), 1);
        assert_eq!(
            pair.sync.session(SessionSlot::B).lifecycle().await.unwrap(),
            Lifecycle::Paused
        );
    }

    #[tokio::test]
    async fn test_throttle_on_b_leaves_a_alone() {
        let pair = pair().await;
        pair.sync.load_both(StreamTarget::adaptive(STREAM, "bbb").unwrap()).await.unwrap();

        pair.sync
            .set_throttle(SessionSlot::B, ThrottleProfile::slow_3g())
            .await
            .unwrap();

        assert_eq!(pair.engine_b.current_level(), Some(0));
        assert_eq!(pair.engine_a.current_level(), Some(2));
        assert_eq!(pair.engine_a.ceiling(), None);
        assert_eq!(
            pair.sync.session(SessionSlot::A).throttle().await.unwrap(),
            ThrottleProfile::unlimited()
        );
    }

    #[tokio::test]
    async fn test_network_profile_resets_a() {
        let pair = pair().await;
        pair.sync
            .set_throttle(SessionSlot::A, ThrottleProfile::fast_3g())
            .await
            .unwrap();

        let applied = pair.sync.apply_network_profile_by_name("2g").await.unwrap();
        assert_eq!(applied.download_bps_cap, 250_000);

        let report = pair.sync.compare().await.unwrap();
        assert_eq!(report.a_throttle, ThrottleProfile::unlimited());
        assert_eq!(report.b_throttle, applied);

        pair.sync.reset().await.unwrap();
        let report = pair.sync.compare().await.unwrap();
        assert_eq!(report.b_throttle, ThrottleProfile::unlimited());
    }

    #[tokio::test]
    async fn test_compare_reports_deltas() {
        let pair = pair().await;
        pair.sync.load_both(StreamTarget::adaptive(STREAM, "bbb").unwrap()).await.unwrap();
        pair.sync.apply_network_profile(ThrottleProfile::slow_3g()).await.unwrap();

        let report = pair.sync.compare().await.unwrap();
        assert_eq!(report.a.bitrate_kbps, 3000);
        assert_eq!(report.b.bitrate_kbps, 400);
        assert_eq!(report.bitrate_delta_kbps, -2600);
    }

    #[tokio::test]
    async fn test_destroy_returns_both_surfaces() {
        let pair = pair().await;
        let (a, b) = pair.sync.destroy().await.unwrap();
        assert!(a.is_some());
        assert!(b.is_some());
        assert!(pair.engine_a.is_destroyed());
        assert!(pair.engine_b.is_destroyed());
    }
}
