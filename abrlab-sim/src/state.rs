//! Shared state behind a simulated engine/surface pair.
//!
//! The engine and the surface are two views over one `SimState`: the
//! engine side fetches fragments into the buffer, the surface side plays
//! them out. `SimulationDriver` advances both by a time step.

use std::time::Duration;

use abrlab_core::config::{BufferConfig, BufferProfiles};
use abrlab_core::media::level::{highest_level_within, lowest_bitrate_level, normalize_levels};
use abrlab_core::media::{EngineEvent, EngineEventSink, LevelSelection};
use serde::Serialize;

use crate::content::SimulatedContent;
use crate::network::NetworkSimulator;

/// Estimate the engine reports before any fragment has been measured.
pub const INITIAL_ESTIMATE_BPS: u64 = 500_000;

/// Share of the effective estimate a level's bitrate may use.
pub const ABR_SAFETY_FACTOR: f64 = 0.9;

/// Weight of the newest throughput sample in the estimate.
const ESTIMATE_SMOOTHING: f64 = 0.5;

/// Fault classes the driver can inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Network,
    Media,
}

impl Fault {
    fn error_type(self) -> &'static str {
        match self {
            Fault::Network => "networkError",
            Fault::Media => "mediaError",
        }
    }

    fn details(self) -> &'static str {
        match self {
            Fault::Network => "fragLoadError",
            Fault::Media => "bufferAppendError",
        }
    }
}

/// Counters describing what a simulated player has done so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimStats {
    pub fragments_loaded: u64,
    pub failed_requests: u64,
    pub level_switches: u64,
    pub stall_time_sec: f64,
    pub estimate_bps: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ManifestState {
    Idle,
    Pending { remaining: Duration },
    Ready,
}

#[derive(Debug, Clone, Copy)]
struct Download {
    index: usize,
    level: usize,
    size_bytes: u64,
    remaining_bits: f64,
    elapsed_sec: f64,
}

#[derive(Debug)]
pub(crate) struct SimState {
    content: SimulatedContent,
    network: NetworkSimulator,

    sink: Option<EngineEventSink>,
    destroyed: bool,
    source: Option<String>,
    manifest: ManifestState,
    selection: LevelSelection,
    current_level: Option<usize>,
    ceiling: Option<u64>,
    buffer_config: BufferConfig,
    estimate_bps: u64,
    loading: bool,
    next_fragment: usize,
    download: Option<Download>,
    eos_sent: bool,

    playing: bool,
    stalled: bool,
    current_time: f64,
    buffered_start: f64,
    buffered_end: f64,
    dropped_frames: u64,
    direct_source: Option<String>,

    stats: SimStats,
}

impl SimState {
    pub(crate) fn new(content: SimulatedContent, network: NetworkSimulator) -> Self {
        Self {
            content,
            network,
            sink: None,
            destroyed: false,
            source: None,
            manifest: ManifestState::Idle,
            selection: LevelSelection::Auto,
            current_level: None,
            ceiling: None,
            buffer_config: BufferProfiles::default().default,
            estimate_bps: INITIAL_ESTIMATE_BPS,
            loading: false,
            next_fragment: 0,
            download: None,
            eos_sent: false,
            playing: false,
            stalled: false,
            current_time: 0.0,
            buffered_start: 0.0,
            buffered_end: 0.0,
            dropped_frames: 0,
            direct_source: None,
            stats: SimStats::default(),
        }
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(sink) = &self.sink {
            sink.emit(event);
        }
    }

    fn manifest_ready(&self) -> bool {
        self.manifest == ManifestState::Ready
    }

    fn reset_buffer_at(&mut self, time_sec: f64) {
        let index = (time_sec / self.content.segment_duration()).floor() as usize;
        let index = index.min(self.content.fragment_count());
        let start = index as f64 * self.content.segment_duration();
        self.next_fragment = index;
        self.download = None;
        self.eos_sent = false;
        self.buffered_start = start;
        self.buffered_end = start;
    }

    // Engine side

    pub(crate) fn attach(&mut self, events: EngineEventSink) {
        self.sink = Some(events);
    }

    pub(crate) fn detach(&mut self) {
        self.sink = None;
        self.loading = false;
        self.download = None;
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub(crate) fn load_source(&mut self, url: &str) {
        self.source = Some(url.to_string());
        self.direct_source = None;
        self.manifest = ManifestState::Pending {
            remaining: self.network.sample_latency(),
        };
        self.current_level = None;
        self.loading = false;
        self.playing = false;
        self.stalled = false;
        self.current_time = 0.0;
        self.reset_buffer_at(0.0);
        tracing::debug!("Simulated engine loading {}", url);
    }

    pub(crate) fn start_load(&mut self) {
        if self.manifest_ready() {
            self.loading = true;
        }
    }

    pub(crate) fn recover_media_error(&mut self) {
        self.download = None;
        self.start_load();
    }

    pub(crate) fn levels(&self) -> Vec<abrlab_core::media::LevelInfo> {
        if self.manifest_ready() {
            self.content.levels().to_vec()
        } else {
            Vec::new()
        }
    }

    pub(crate) fn current_level(&self) -> Option<usize> {
        self.current_level
    }

    pub(crate) fn set_level_selection(&mut self, selection: LevelSelection) {
        self.selection = selection;
        self.reselect();
    }

    pub(crate) fn bandwidth_estimate(&self) -> u64 {
        self.estimate_bps
    }

    pub(crate) fn set_bandwidth_ceiling(&mut self, ceiling_bps: Option<u64>) {
        self.ceiling = ceiling_bps;
        self.reselect();
    }

    pub(crate) fn set_buffer_config(&mut self, config: BufferConfig) {
        self.buffer_config = config;
    }

    pub(crate) fn destroy(&mut self) {
        self.destroyed = true;
        self.sink = None;
        self.loading = false;
        self.download = None;
        self.playing = false;
    }

    fn native_choice(&self) -> Option<usize> {
        let effective = match self.ceiling {
            Some(cap) => self.estimate_bps.min(cap),
            None => self.estimate_bps,
        };
        let usable = (effective as f64 * ABR_SAFETY_FACTOR) as u64;
        let levels = normalize_levels(self.content.levels());
        highest_level_within(&levels, usable)
            .or_else(|| lowest_bitrate_level(&levels))
            .map(|level| level.index)
    }

    fn reselect(&mut self) {
        if !self.manifest_ready() {
            return;
        }
        let next = match self.selection {
            LevelSelection::Auto => self.native_choice(),
            LevelSelection::Fixed(index) if index < self.content.levels().len() => Some(index),
            LevelSelection::Fixed(_) => self.current_level,
        };
        if next != self.current_level {
            self.current_level = next;
            if let Some(level) = next {
                self.stats.level_switches += 1;
                tracing::debug!("Simulated engine switched to level {}", level);
                self.emit(EngineEvent::LevelSwitched { level });
            }
        }
    }

    // Surface side

    pub(crate) fn play(&mut self) {
        self.playing = true;
    }

    pub(crate) fn pause(&mut self) {
        self.playing = false;
    }

    pub(crate) fn seek(&mut self, time_sec: f64) {
        let duration = self.duration().unwrap_or(0.0);
        let target = time_sec.clamp(0.0, duration);
        self.current_time = target;
        if self.direct_source.is_some() {
            return;
        }
        if target < self.buffered_start || target > self.buffered_end {
            self.reset_buffer_at(target);
        }
    }

    pub(crate) fn set_source(&mut self, url: &str) {
        self.direct_source = Some(url.to_string());
        self.source = None;
        self.manifest = ManifestState::Idle;
        self.loading = false;
        self.download = None;
        self.current_time = 0.0;
        self.buffered_start = 0.0;
        self.buffered_end = self.content.duration();
    }

    pub(crate) fn current_time(&self) -> f64 {
        self.current_time
    }

    pub(crate) fn duration(&self) -> Option<f64> {
        (self.manifest_ready() || self.direct_source.is_some()).then(|| self.content.duration())
    }

    pub(crate) fn buffered_end(&self) -> Option<f64> {
        (self.buffered_end > self.buffered_start).then_some(self.buffered_end)
    }

    pub(crate) fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.playing
    }

    // Driver side

    pub(crate) fn stats(&self) -> SimStats {
        SimStats {
            estimate_bps: self.estimate_bps,
            ..self.stats.clone()
        }
    }

    pub(crate) fn set_network_bandwidth(&mut self, bps: u64) {
        self.network.set_bandwidth(bps);
    }

    /// Emits an engine failure. A fatal fault halts loading until the
    /// session asks the engine to recover.
    pub(crate) fn inject_fault(&mut self, fault: Fault, fatal: bool) {
        let fragment = self
            .download
            .map(|download| download.index)
            .or_else(|| (self.next_fragment < self.content.fragment_count()).then_some(self.next_fragment));
        if fatal {
            self.loading = false;
            self.download = None;
        }
        self.emit(EngineEvent::Error {
            error_type: fault.error_type().to_string(),
            details: fault.details().to_string(),
            fatal,
            fragment,
        });
    }

    /// Advances the simulation by `dt`. Returns false once destroyed.
    pub(crate) fn step(&mut self, dt: Duration) -> bool {
        if self.destroyed {
            return false;
        }
        self.advance_manifest(dt);
        self.advance_download(dt);
        self.advance_playback(dt);
        true
    }

    fn advance_manifest(&mut self, dt: Duration) {
        let ManifestState::Pending { remaining } = self.manifest else {
            return;
        };
        if self.sink.is_none() {
            return;
        }
        let remaining = remaining.saturating_sub(dt);
        if !remaining.is_zero() {
            self.manifest = ManifestState::Pending { remaining };
            return;
        }

        let Some(url) = self.source.clone() else {
            self.manifest = ManifestState::Idle;
            return;
        };
        self.manifest = ManifestState::Ready;
        self.loading = true;
        tracing::debug!(
            "Simulated manifest ready: {} levels, {} fragments",
            self.content.levels().len(),
            self.content.fragment_count()
        );
        self.emit(EngineEvent::ManifestParsed {
            url: url.clone(),
            levels: self.content.levels().to_vec(),
        });
        self.reselect();
        if let Some(level) = self.current_level {
            self.emit(EngineEvent::LevelLoaded {
                level,
                fragments: self.content.playlist(&url, level),
            });
        }
    }

    fn advance_download(&mut self, dt: Duration) {
        if !self.loading || !self.manifest_ready() || self.sink.is_none() {
            return;
        }
        let Some(url) = self.source.clone() else {
            return;
        };

        if self.next_fragment >= self.content.fragment_count() {
            if !self.eos_sent {
                self.eos_sent = true;
                self.emit(EngineEvent::BufferEos);
            }
            return;
        }

        let mut download = match self.download {
            Some(download) => download,
            None => {
                let ahead = self.buffered_end - self.current_time;
                if ahead >= self.buffer_config.max_buffer_length {
                    return;
                }
                self.reselect();
                let Some(level) = self.current_level else {
                    return;
                };
                if self.network.should_fail_request() {
                    self.stats.failed_requests += 1;
                    self.emit(EngineEvent::Error {
                        error_type: Fault::Network.error_type().to_string(),
                        details: Fault::Network.details().to_string(),
                        fatal: false,
                        fragment: Some(self.next_fragment),
                    });
                    return;
                }
                let size_bytes = self.content.fragment_size(level, self.next_fragment);
                Download {
                    index: self.next_fragment,
                    level,
                    size_bytes,
                    remaining_bits: size_bytes as f64 * 8.0,
                    elapsed_sec: 0.0,
                }
            }
        };

        let throughput = self.network.sample_throughput();
        download.remaining_bits -= throughput as f64 * dt.as_secs_f64();
        download.elapsed_sec += dt.as_secs_f64();
        if download.remaining_bits > 0.0 {
            self.download = Some(download);
            return;
        }

        self.download = None;
        let measured = (download.size_bytes as f64 * 8.0 / download.elapsed_sec) as u64;
        self.estimate_bps = ((1.0 - ESTIMATE_SMOOTHING) * self.estimate_bps as f64
            + ESTIMATE_SMOOTHING * measured as f64) as u64;

        let fragment = self.content.fragment(&url, download.level, download.index);
        self.buffered_end = self.buffered_end.max(
            download.index as f64 * self.content.segment_duration() + fragment.duration,
        );
        self.next_fragment = download.index + 1;
        self.stats.fragments_loaded += 1;
        tracing::trace!(
            "Simulated fragment {} loaded at level {} ({} bps measured)",
            download.index,
            download.level,
            measured
        );
        self.emit(EngineEvent::FragLoaded { fragment });
        self.emit(EngineEvent::BufferAppended);
    }

    fn advance_playback(&mut self, dt: Duration) {
        if !self.playing {
            return;
        }
        let Some(duration) = self.duration() else {
            return;
        };
        let target = (self.current_time + dt.as_secs_f64()).min(duration);
        let available = if self.direct_source.is_some() {
            duration
        } else {
            self.buffered_end
        };

        if target <= available {
            self.current_time = target;
            self.stalled = false;
        } else {
            if !self.stalled {
                // A rebuffer drops the frame that was due.
                self.dropped_frames += 1;
            }
            self.stalled = true;
            self.stats.stall_time_sec += target - self.current_time.max(available);
            self.current_time = self.current_time.max(available);
        }

        if self.current_time >= duration {
            self.playing = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abrlab_core::config::SimulationConfig;
    use tokio::sync::mpsc::UnboundedReceiver;

    const STREAM: &str = "https://test-streams.mux.dev/x36xhzz/x36xhzz.m3u8";
    const STEP: Duration = Duration::from_millis(100);

    fn attached_state() -> (SimState, UnboundedReceiver<EngineEvent>) {
        let config = SimulationConfig::deterministic_testing();
        let network = NetworkSimulator::builder()
            .bandwidth(config.network_bandwidth_bps)
            .latency(50..51)
            .seed(Some(1))
            .build();
        let mut state = SimState::new(SimulatedContent::from_config(&config), network);
        let (sink, rx) = EngineEventSink::channel();
        state.attach(sink);
        (state, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<EngineEvent>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_manifest_then_level_then_playlist() {
        let (mut state, mut rx) = attached_state();
        state.load_source(STREAM);
        assert!(state.levels().is_empty());

        state.step(STEP);
        let events = drain(&mut rx);
        assert!(matches!(events[0], EngineEvent::ManifestParsed { .. }));
        assert_eq!(events[1], EngineEvent::LevelSwitched { level: 0 });
        match &events[2] {
            EngineEvent::LevelLoaded { level, fragments } => {
                assert_eq!(*level, 0);
                assert_eq!(fragments.len(), 30);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(state.duration(), Some(120.0));
    }

    #[test]
    fn test_estimate_climbs_to_top_level() {
        let (mut state, mut rx) = attached_state();
        state.load_source(STREAM);
        for _ in 0..20 {
            state.step(STEP);
        }
        let events = drain(&mut rx);
        assert!(events.contains(&EngineEvent::LevelSwitched { level: 2 }));
        assert_eq!(state.current_level(), Some(2));
        assert!(state.bandwidth_estimate() > 3_000_000);
    }

    #[test]
    fn test_ceiling_forces_lowest_level() {
        let (mut state, _rx) = attached_state();
        state.load_source(STREAM);
        for _ in 0..20 {
            state.step(STEP);
        }
        state.set_bandwidth_ceiling(Some(400_000));
        assert_eq!(state.current_level(), Some(0));

        state.set_bandwidth_ceiling(None);
        assert_eq!(state.current_level(), Some(2));
    }

    #[test]
    fn test_buffer_stops_at_max_length() {
        let (mut state, _rx) = attached_state();
        state.set_buffer_config(BufferConfig {
            max_buffer_length: 10.0,
            max_max_buffer_length: 10.0,
        });
        state.load_source(STREAM);
        for _ in 0..100 {
            state.step(STEP);
        }
        assert_eq!(state.buffered_end(), Some(12.0));
    }

    #[test]
    fn test_playback_stalls_without_buffer() {
        let (mut state, _rx) = attached_state();
        state.set_source("https://example.com/clip.mp4");
        state.play();
        state.step(Duration::from_secs(1));
        assert_eq!(state.current_time(), 1.0);

        let (mut state, _rx) = attached_state();
        state.load_source(STREAM);
        state.step(STEP);
        state.detach();
        state.play();
        state.step(Duration::from_secs(1));
        assert_eq!(state.current_time(), 0.0);
        assert_eq!(state.dropped_frames(), 1);
        assert!(state.stats().stall_time_sec > 0.0);
    }

    #[test]
    fn test_fatal_fault_halts_until_recovery() {
        let (mut state, mut rx) = attached_state();
        state.load_source(STREAM);
        state.step(STEP);
        drain(&mut rx);

        state.inject_fault(Fault::Network, true);
        let loaded = state.stats().fragments_loaded;
        for _ in 0..10 {
            state.step(STEP);
        }
        assert_eq!(state.stats().fragments_loaded, loaded);
        assert!(matches!(
            drain(&mut rx)[0],
            EngineEvent::Error { fatal: true, .. }
        ));

        state.start_load();
        for _ in 0..10 {
            state.step(STEP);
        }
        assert!(state.stats().fragments_loaded > loaded);
    }

    #[test]
    fn test_seek_outside_buffer_restarts_there() {
        let (mut state, _rx) = attached_state();
        state.load_source(STREAM);
        for _ in 0..5 {
            state.step(STEP);
        }
        state.seek(100.0);
        assert_eq!(state.current_time(), 100.0);
        assert_eq!(state.buffered_end(), None);

        for _ in 0..20 {
            state.step(STEP);
        }
        assert!(state.buffered_end().is_some_and(|end| end > 100.0));
    }

    #[test]
    fn test_end_of_stream_emitted_once() {
        let (mut state, mut rx) = attached_state();
        state.set_buffer_config(BufferConfig {
            max_buffer_length: 600.0,
            max_max_buffer_length: 600.0,
        });
        state.load_source(STREAM);
        for _ in 0..500 {
            state.step(STEP);
        }
        let eos = drain(&mut rx)
            .into_iter()
            .filter(|event| *event == EngineEvent::BufferEos)
            .count();
        assert_eq!(eos, 1);
        assert_eq!(state.buffered_end(), Some(120.0));
    }

    #[test]
    fn test_destroyed_state_stops_stepping() {
        let (mut state, _rx) = attached_state();
        state.destroy();
        assert!(!state.step(STEP));
        assert!(state.is_destroyed());
    }
}
