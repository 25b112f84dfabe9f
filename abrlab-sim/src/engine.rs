//! `MediaEngine` and `MediaSurface` implementations over the simulated state.

use std::sync::Arc;

use abrlab_core::config::BufferConfig;
use abrlab_core::media::{
    EngineEventSink, LevelInfo, LevelSelection, MediaEngine, MediaSurface,
};
use parking_lot::Mutex;

use crate::state::SimState;

/// Simulated adaptive-streaming engine.
///
/// Only drives the `SimulatedSurface` created alongside it; the surface
/// passed to `attach` is assumed to be that one.
#[derive(Debug)]
pub struct SimulatedEngine {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedEngine {
    pub(crate) fn new(state: Arc<Mutex<SimState>>) -> Self {
        Self { state }
    }
}

impl MediaEngine for SimulatedEngine {
    fn supports_adaptive_streaming(&self) -> bool {
        true
    }

    fn attach(&mut self, _surface: &mut dyn MediaSurface, events: EngineEventSink) {
        self.state.lock().attach(events);
    }

    fn detach(&mut self) {
        self.state.lock().detach();
    }

    fn load_source(&mut self, url: &str) {
        self.state.lock().load_source(url);
    }

    fn start_load(&mut self) {
        self.state.lock().start_load();
    }

    fn recover_media_error(&mut self) {
        self.state.lock().recover_media_error();
    }

    fn levels(&self) -> Vec<LevelInfo> {
        self.state.lock().levels()
    }

    fn current_level(&self) -> Option<usize> {
        self.state.lock().current_level()
    }

    fn set_level_selection(&mut self, selection: LevelSelection) {
        self.state.lock().set_level_selection(selection);
    }

    fn bandwidth_estimate(&self) -> u64 {
        self.state.lock().bandwidth_estimate()
    }

    fn set_bandwidth_ceiling(&mut self, ceiling_bps: Option<u64>) {
        self.state.lock().set_bandwidth_ceiling(ceiling_bps);
    }

    fn set_buffer_config(&mut self, config: BufferConfig) {
        self.state.lock().set_buffer_config(config);
    }

    fn destroy(&mut self) {
        self.state.lock().destroy();
    }
}

/// Simulated render surface playing out the engine's buffer.
#[derive(Debug)]
pub struct SimulatedSurface {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedSurface {
    pub(crate) fn new(state: Arc<Mutex<SimState>>) -> Self {
        Self { state }
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().is_playing()
    }
}

impl MediaSurface for SimulatedSurface {
    fn play(&mut self) {
        self.state.lock().play();
    }

    fn pause(&mut self) {
        self.state.lock().pause();
    }

    fn seek(&mut self, time_sec: f64) {
        self.state.lock().seek(time_sec);
    }

    fn set_source(&mut self, url: &str) {
        self.state.lock().set_source(url);
    }

    fn current_time(&self) -> f64 {
        self.state.lock().current_time()
    }

    fn duration(&self) -> Option<f64> {
        self.state.lock().duration()
    }

    fn buffered_end(&self) -> Option<f64> {
        self.state.lock().buffered_end()
    }

    fn dropped_frames(&self) -> u64 {
        self.state.lock().dropped_frames()
    }
}
