//! Engine adapter: one boundary between the session and the external engine.
//!
//! Owns the engine, holds the bandwidth-estimate override used by the
//! throttle simulator and translates raw engine events into `MediaEvent`s.

use std::fmt;

use tokio::sync::mpsc;

use super::engine::{LevelSelection, MediaEngine, MediaSurface};
use super::events::{EngineEvent, EngineEventSink, FragmentMeta};
use super::level::{QualityLevel, normalize_levels};
use crate::config::BufferConfig;

/// Coarse classification of engine failures driving the recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineErrorKind {
    Network,
    Media,
    Other,
}

impl EngineErrorKind {
    /// Classifies an engine-specific error type string.
    ///
    /// Engines report strings such as `networkError` or `mediaError`;
    /// anything unrecognized is `Other`.
    pub fn classify(error_type: &str) -> Self {
        let lowered = error_type.to_ascii_lowercase();
        if lowered.starts_with("network") {
            EngineErrorKind::Network
        } else if lowered.starts_with("media") {
            EngineErrorKind::Media
        } else {
            EngineErrorKind::Other
        }
    }
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineErrorKind::Network => "network",
            EngineErrorKind::Media => "media",
            EngineErrorKind::Other => "other",
        };
        write!(f, "{name}")
    }
}

/// Engine failure after classification.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineFailure {
    pub kind: EngineErrorKind,
    pub details: String,
    pub fatal: bool,
    pub fragment_index: Option<usize>,
}

/// Uniform internal event model consumed by the session actor.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    ManifestReady {
        url: String,
        levels: Vec<QualityLevel>,
    },
    PlaylistLoaded {
        level: usize,
        fragments: Vec<FragmentMeta>,
    },
    LevelSwitched {
        level: QualityLevel,
    },
    FragmentLoaded {
        fragment: FragmentMeta,
    },
    Error(EngineFailure),
    BufferAppended,
    BufferEndOfStream,
}

impl MediaEvent {
    /// Whether the event shows the engine made forward progress.
    pub fn is_progress(&self) -> bool {
        matches!(
            self,
            MediaEvent::ManifestReady { .. }
                | MediaEvent::FragmentLoaded { .. }
                | MediaEvent::BufferAppended
        )
    }
}

/// Wraps a `MediaEngine` with the bandwidth override and attach bookkeeping.
pub struct EngineAdapter {
    engine: Box<dyn MediaEngine>,
    bandwidth_override: Option<u64>,
    attached: bool,
}

impl fmt::Debug for EngineAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineAdapter")
            .field("bandwidth_override", &self.bandwidth_override)
            .field("attached", &self.attached)
            .finish_non_exhaustive()
    }
}

impl EngineAdapter {
    pub fn new(engine: Box<dyn MediaEngine>) -> Self {
        Self {
            engine,
            bandwidth_override: None,
            attached: false,
        }
    }

    pub fn supports_adaptive_streaming(&self) -> bool {
        self.engine.supports_adaptive_streaming()
    }

    /// Attaches the engine to `surface` and returns the raw event stream.
    pub fn attach(&mut self, surface: &mut dyn MediaSurface) -> mpsc::UnboundedReceiver<EngineEvent> {
        let (sink, receiver) = EngineEventSink::channel();
        self.engine.attach(surface, sink);
        self.attached = true;
        receiver
    }

    pub fn detach(&mut self) {
        if self.attached {
            self.engine.detach();
            self.attached = false;
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn load_source(&mut self, url: &str) {
        self.engine.load_source(url);
    }

    pub fn start_load(&mut self) {
        self.engine.start_load();
    }

    pub fn recover_media_error(&mut self) {
        self.engine.recover_media_error();
    }

    /// Normalized level list from the engine.
    pub fn levels(&self) -> Vec<QualityLevel> {
        normalize_levels(&self.engine.levels())
    }

    /// Currently selected level, ignoring indices the engine cannot resolve.
    pub fn current_level(&self) -> Option<QualityLevel> {
        let index = self.engine.current_level()?;
        self.levels().into_iter().find(|level| level.index == index)
    }

    pub fn set_level_selection(&mut self, selection: LevelSelection) {
        self.engine.set_level_selection(selection);
    }

    /// Engine's own estimate, ignoring any override.
    pub fn native_bandwidth_estimate(&self) -> u64 {
        self.engine.bandwidth_estimate()
    }

    /// Estimate used for all decisions: `min(native, override)`.
    pub fn bandwidth_estimate(&self) -> u64 {
        let native = self.engine.bandwidth_estimate();
        match self.bandwidth_override {
            Some(cap) => native.min(cap),
            None => native,
        }
    }

    pub fn bandwidth_override(&self) -> Option<u64> {
        self.bandwidth_override
    }

    /// Replaces the bandwidth override and forwards it to the engine as a ceiling.
    pub fn set_bandwidth_override(&mut self, cap_bps: Option<u64>) {
        self.bandwidth_override = cap_bps;
        self.engine.set_bandwidth_ceiling(cap_bps);
    }

    pub fn set_buffer_config(&mut self, config: BufferConfig) {
        self.engine.set_buffer_config(config);
    }

    /// Detaches and releases the engine.
    pub fn destroy(&mut self) {
        self.detach();
        self.engine.destroy();
        self.bandwidth_override = None;
    }

    /// Translates a raw engine event into the internal model.
    ///
    /// Returns `None` for level switches the engine cannot resolve to a
    /// known level.
    pub fn translate(&self, event: EngineEvent) -> Option<MediaEvent> {
        let translated = match event {
            EngineEvent::ManifestParsed { url, levels } => MediaEvent::ManifestReady {
                url,
                levels: normalize_levels(&levels),
            },
            EngineEvent::LevelLoaded { level, fragments } => {
                MediaEvent::PlaylistLoaded { level, fragments }
            }
            EngineEvent::LevelSwitched { level } => {
                let Some(level) = self.levels().into_iter().find(|l| l.index == level) else {
                    tracing::debug!("Ignoring switch to unknown level {}", level);
                    return None;
                };
                MediaEvent::LevelSwitched { level }
            }
            EngineEvent::FragLoaded { fragment } => MediaEvent::FragmentLoaded { fragment },
            EngineEvent::Error {
                error_type,
                details,
                fatal,
                fragment,
            } => MediaEvent::Error(EngineFailure {
                kind: EngineErrorKind::classify(&error_type),
                details,
                fatal,
                fragment_index: fragment,
            }),
            EngineEvent::BufferAppended => MediaEvent::BufferAppended,
            EngineEvent::BufferEos => MediaEvent::BufferEndOfStream,
        };
        Some(translated)
    }
}
