//! Mock engine and surface for exercising sessions without a media stack.
//!
//! Each mock comes with a probe sharing its state, so tests can inspect
//! what the session did and inject engine events after the mock has been
//! moved into a session.

use std::sync::Arc;

use parking_lot::Mutex;

use super::engine::{LevelSelection, MediaEngine, MediaSurface};
use super::events::{EngineEvent, EngineEventSink, FragmentMeta};
use super::level::LevelInfo;
use crate::config::BufferConfig;

/// Three-rung ladder used across tests: 400k/360p, 1200k/720p, 3000k/1080p.
pub fn sample_levels() -> Vec<LevelInfo> {
    vec![
        LevelInfo {
            bitrate_bps: 400_000,
            width: 640,
            height: 360,
            codecs: Some("avc1.4d401e".to_string()),
        },
        LevelInfo {
            bitrate_bps: 1_200_000,
            width: 1280,
            height: 720,
            codecs: Some("avc1.4d401f".to_string()),
        },
        LevelInfo {
            bitrate_bps: 3_000_000,
            width: 1920,
            height: 1080,
            codecs: Some("avc1.640028".to_string()),
        },
    ]
}

/// Fragment list of `count` fragments of `duration` seconds each.
pub fn sample_fragments(count: usize, duration: f64) -> Vec<FragmentMeta> {
    (0..count)
        .map(|i| FragmentMeta {
            sequence: i as u64,
            url: format!("https://example.com/seg{i}.ts"),
            duration,
            size_bytes: None,
            bitrate_bps: None,
        })
        .collect()
}

#[derive(Debug)]
struct MockEngineState {
    supports_adaptive: bool,
    levels: Vec<LevelInfo>,
    fragments: Vec<FragmentMeta>,
    native_estimate: u64,
    ceiling: Option<u64>,
    selection: LevelSelection,
    current_level: Option<usize>,
    buffer_config: Option<BufferConfig>,
    loaded_sources: Vec<String>,
    start_load_calls: usize,
    recover_media_calls: usize,
    attached: bool,
    destroyed: bool,
    sink: Option<EngineEventSink>,
}

impl MockEngineState {
    /// Native choice: highest level within the effective estimate, else the lowest.
    fn native_choice(&self) -> Option<usize> {
        let effective = match self.ceiling {
            Some(cap) => self.native_estimate.min(cap),
            None => self.native_estimate,
        };
        let levels = super::level::normalize_levels(&self.levels);
        super::level::highest_level_within(&levels, effective)
            .or_else(|| super::level::lowest_bitrate_level(&levels))
            .map(|level| level.index)
    }

    fn reselect(&mut self) {
        let next = match self.selection {
            LevelSelection::Auto => self.native_choice(),
            LevelSelection::Fixed(index) if index < self.levels.len() => Some(index),
            LevelSelection::Fixed(_) => self.current_level,
        };
        if next != self.current_level {
            self.current_level = next;
            if let (Some(level), Some(sink)) = (next, &self.sink) {
                sink.emit(EngineEvent::LevelSwitched { level });
            }
        }
    }
}

/// Scriptable in-memory media engine.
#[derive(Debug)]
pub struct MockEngine {
    state: Arc<Mutex<MockEngineState>>,
}

/// Inspection and injection side of a `MockEngine`.
#[derive(Debug, Clone)]
pub struct MockEngineProbe {
    state: Arc<Mutex<MockEngineState>>,
}

impl MockEngine {
    /// Creates an engine advertising `levels` with a 5 Mbps native estimate.
    pub fn new(levels: Vec<LevelInfo>) -> (Self, MockEngineProbe) {
        let state = Arc::new(Mutex::new(MockEngineState {
            supports_adaptive: true,
            levels,
            fragments: sample_fragments(10, 4.0),
            native_estimate: 5_000_000,
            ceiling: None,
            selection: LevelSelection::Auto,
            current_level: None,
            buffer_config: None,
            loaded_sources: Vec::new(),
            start_load_calls: 0,
            recover_media_calls: 0,
            attached: false,
            destroyed: false,
            sink: None,
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockEngineProbe { state },
        )
    }

    /// Creates an engine on a platform without adaptive-streaming support.
    pub fn unsupported() -> (Self, MockEngineProbe) {
        let (engine, probe) = Self::new(Vec::new());
        engine.state.lock().supports_adaptive = false;
        (engine, probe)
    }
}

impl MediaEngine for MockEngine {
    fn supports_adaptive_streaming(&self) -> bool {
        self.state.lock().supports_adaptive
    }

    fn attach(&mut self, _surface: &mut dyn MediaSurface, events: EngineEventSink) {
        let mut state = self.state.lock();
        state.attached = true;
        state.sink = Some(events);
    }

    fn detach(&mut self) {
        let mut state = self.state.lock();
        state.attached = false;
        state.sink = None;
    }

    fn load_source(&mut self, url: &str) {
        let mut state = self.state.lock();
        state.loaded_sources.push(url.to_string());
        state.current_level = None;
        if state.levels.is_empty() {
            return;
        }
        if let Some(sink) = state.sink.clone() {
            sink.emit(EngineEvent::ManifestParsed {
                url: url.to_string(),
                levels: state.levels.clone(),
            });
            state.reselect();
            if let Some(level) = state.current_level {
                sink.emit(EngineEvent::LevelLoaded {
                    level,
                    fragments: state.fragments.clone(),
                });
            }
        }
    }

    fn start_load(&mut self) {
        self.state.lock().start_load_calls += 1;
    }

    fn recover_media_error(&mut self) {
        self.state.lock().recover_media_calls += 1;
    }

    fn levels(&self) -> Vec<LevelInfo> {
        self.state.lock().levels.clone()
    }

    fn current_level(&self) -> Option<usize> {
        self.state.lock().current_level
    }

    fn set_level_selection(&mut self, selection: LevelSelection) {
        let mut state = self.state.lock();
        state.selection = selection;
        state.reselect();
    }

    fn bandwidth_estimate(&self) -> u64 {
        self.state.lock().native_estimate
    }

    fn set_bandwidth_ceiling(&mut self, ceiling_bps: Option<u64>) {
        self.state.lock().ceiling = ceiling_bps;
    }

    fn set_buffer_config(&mut self, config: BufferConfig) {
        self.state.lock().buffer_config = Some(config);
    }

    fn destroy(&mut self) {
        let mut state = self.state.lock();
        state.destroyed = true;
        state.attached = false;
        state.sink = None;
    }
}

impl MockEngineProbe {
    pub fn set_native_estimate(&self, bps: u64) {
        self.state.lock().native_estimate = bps;
    }

    pub fn set_fragments(&self, fragments: Vec<FragmentMeta>) {
        self.state.lock().fragments = fragments;
    }

    /// Forces the engine's current level without emitting an event.
    pub fn force_current_level(&self, level: Option<usize>) {
        self.state.lock().current_level = level;
    }

    /// Publishes a raw event as if the engine produced it.
    pub fn emit(&self, event: EngineEvent) {
        let sink = self.state.lock().sink.clone();
        if let Some(sink) = sink {
            sink.emit(event);
        }
    }

    /// Publishes an engine error.
    pub fn emit_error(&self, error_type: &str, details: &str, fatal: bool) {
        self.emit(EngineEvent::Error {
            error_type: error_type.to_string(),
            details: details.to_string(),
            fatal,
            fragment: None,
        });
    }

    pub fn current_level(&self) -> Option<usize> {
        self.state.lock().current_level
    }

    pub fn selection(&self) -> LevelSelection {
        self.state.lock().selection
    }

    pub fn ceiling(&self) -> Option<u64> {
        self.state.lock().ceiling
    }

    pub fn buffer_config(&self) -> Option<BufferConfig> {
        self.state.lock().buffer_config
    }

    pub fn loaded_sources(&self) -> Vec<String> {
        self.state.lock().loaded_sources.clone()
    }

    pub fn start_load_calls(&self) -> usize {
        self.state.lock().start_load_calls
    }

    pub fn recover_media_calls(&self) -> usize {
        self.state.lock().recover_media_calls
    }

    pub fn is_attached(&self) -> bool {
        self.state.lock().attached
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }
}

#[derive(Debug, Default)]
struct MockSurfaceState {
    playing: bool,
    current_time: f64,
    duration: Option<f64>,
    buffered_end: Option<f64>,
    dropped_frames: u64,
    seeks: Vec<f64>,
    sources: Vec<String>,
    play_calls: usize,
    pause_calls: usize,
}

/// In-memory render surface.
#[derive(Debug)]
pub struct MockSurface {
    state: Arc<Mutex<MockSurfaceState>>,
}

/// Inspection side of a `MockSurface`.
#[derive(Debug, Clone)]
pub struct MockSurfaceProbe {
    state: Arc<Mutex<MockSurfaceState>>,
}

impl MockSurface {
    pub fn new() -> (Self, MockSurfaceProbe) {
        let state = Arc::new(Mutex::new(MockSurfaceState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockSurfaceProbe { state },
        )
    }
}

impl MediaSurface for MockSurface {
    fn play(&mut self) {
        let mut state = self.state.lock();
        state.playing = true;
        state.play_calls += 1;
    }

    fn pause(&mut self) {
        let mut state = self.state.lock();
        state.playing = false;
        state.pause_calls += 1;
    }

    fn seek(&mut self, time_sec: f64) {
        let mut state = self.state.lock();
        state.current_time = time_sec;
        state.seeks.push(time_sec);
    }

    fn set_source(&mut self, url: &str) {
        self.state.lock().sources.push(url.to_string());
    }

    fn current_time(&self) -> f64 {
        self.state.lock().current_time
    }

    fn duration(&self) -> Option<f64> {
        self.state.lock().duration
    }

    fn buffered_end(&self) -> Option<f64> {
        self.state.lock().buffered_end
    }

    fn dropped_frames(&self) -> u64 {
        self.state.lock().dropped_frames
    }
}

impl MockSurfaceProbe {
    /// Moves the playhead without recording a seek.
    pub fn set_position(&self, current_time: f64, duration: Option<f64>) {
        let mut state = self.state.lock();
        state.current_time = current_time;
        state.duration = duration;
    }

    pub fn set_buffered_end(&self, buffered_end: Option<f64>) {
        self.state.lock().buffered_end = buffered_end;
    }

    pub fn set_dropped_frames(&self, frames: u64) {
        self.state.lock().dropped_frames = frames;
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.state.lock().seeks.clone()
    }

    pub fn sources(&self) -> Vec<String> {
        self.state.lock().sources.clone()
    }

    pub fn play_calls(&self) -> usize {
        self.state.lock().play_calls
    }

    pub fn pause_calls(&self) -> usize {
        self.state.lock().pause_calls
    }
}
