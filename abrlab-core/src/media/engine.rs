//! Capabilities the session controller drives.
//!
//! The adaptive-streaming engine and the render surface are external
//! collaborators. These traits are the whole of what the core needs from
//! them, which keeps the core testable without a network or media stack.

use std::fmt;

use super::events::EngineEventSink;
use super::level::LevelInfo;
use crate::config::BufferConfig;

/// Level selection mode requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelSelection {
    /// Engine's native adaptive heuristic picks the level
    Auto,
    /// Pin playback to one level index
    Fixed(usize),
}

impl LevelSelection {
    /// Engine-style integer form, -1 meaning automatic.
    pub fn as_index(self) -> i64 {
        match self {
            LevelSelection::Auto => -1,
            LevelSelection::Fixed(index) => index as i64,
        }
    }
}

/// Render/output target a session plays into (a video surface).
///
/// Exactly one session owns a surface at a time. It is moved into the
/// session on initialize and handed back on destroy.
pub trait MediaSurface: Send + Sync + fmt::Debug + 'static {
    fn play(&mut self);

    fn pause(&mut self);

    /// Moves the playhead to `time_sec`.
    fn seek(&mut self, time_sec: f64);

    /// Assigns a progressive source directly, bypassing the adaptive engine.
    fn set_source(&mut self, url: &str);

    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    /// Media duration in seconds, when known.
    fn duration(&self) -> Option<f64>;

    /// End of the last buffered range, if anything is buffered.
    fn buffered_end(&self) -> Option<f64>;

    fn dropped_frames(&self) -> u64;
}

/// Owned render surface.
pub type RenderSurface = Box<dyn MediaSurface>;

/// External adaptive-streaming engine.
///
/// Results of asynchronous operations (`load_source`, `start_load`) are
/// reported through the `EngineEventSink` given to `attach`.
pub trait MediaEngine: Send + 'static {
    /// Whether the platform supports adaptive streaming playback.
    fn supports_adaptive_streaming(&self) -> bool;

    /// Binds the engine to a surface and an event sink.
    fn attach(&mut self, surface: &mut dyn MediaSurface, events: EngineEventSink);

    fn detach(&mut self);

    /// Starts manifest acquisition for `url`.
    fn load_source(&mut self, url: &str);

    /// Restarts loading of the current source after a network failure.
    fn start_load(&mut self);

    /// Engine-level recovery after a media decode failure.
    fn recover_media_error(&mut self);

    /// Levels discovered by the last manifest load.
    fn levels(&self) -> Vec<LevelInfo>;

    /// Level currently selected for playback, if any.
    fn current_level(&self) -> Option<usize>;

    fn set_level_selection(&mut self, selection: LevelSelection);

    /// Engine's own bandwidth estimate in bits per second.
    fn bandwidth_estimate(&self) -> u64;

    /// Ceiling the engine must apply to its estimate for all future decisions.
    fn set_bandwidth_ceiling(&mut self, ceiling_bps: Option<u64>);

    fn set_buffer_config(&mut self, config: BufferConfig);

    /// Releases every engine resource. No events are emitted afterwards.
    fn destroy(&mut self);
}
