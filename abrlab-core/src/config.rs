//! Centralized configuration for abrlab.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Central configuration for all abrlab components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct AbrLabConfig {
    pub session: SessionConfig,
    pub metrics: MetricsConfig,
    pub buffer: BufferProfiles,
    pub tracker: TrackerConfig,
    pub simulation: SimulationConfig,
}

/// Session actor configuration.
///
/// Controls log retention, playback-position polling and the deferred
/// start used to let engine attachment settle.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum number of log entries retained per session
    pub log_capacity: usize,
    /// Interval between playback-position samples
    pub playback_poll_interval: Duration,
    /// Delay before a deferred load is issued
    pub deferred_start_delay: Duration,
    /// Capacity of the command channel
    pub command_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            log_capacity: 100,
            playback_poll_interval: Duration::from_millis(250),
            deferred_start_delay: Duration::from_millis(100),
            command_buffer: 64,
        }
    }
}

/// Metrics polling configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Default polling cadence
    pub default_interval: Duration,
    /// Fastest cadence a caller may request
    pub min_interval: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            default_interval: Duration::from_millis(1000),
            min_interval: Duration::from_millis(250),
        }
    }
}

impl MetricsConfig {
    /// Clamps a requested polling interval to the supported minimum.
    pub fn clamp_interval(&self, requested: Duration) -> Duration {
        requested.max(self.min_interval)
    }
}

/// Engine buffering targets, in seconds of media.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Target forward buffer length
    pub max_buffer_length: f64,
    /// Hard ceiling on forward buffer length
    pub max_max_buffer_length: f64,
}

/// Buffering targets for unconstrained and throttled playback.
///
/// Throttled sessions use a much smaller buffer so a simulated bandwidth
/// constraint shows up promptly instead of being hidden by pre-filled media.
#[derive(Debug, Clone)]
pub struct BufferProfiles {
    pub default: BufferConfig,
    pub throttled: BufferConfig,
}

impl Default for BufferProfiles {
    fn default() -> Self {
        Self {
            default: BufferConfig {
                max_buffer_length: 30.0,
                max_max_buffer_length: 600.0,
            },
            throttled: BufferConfig {
                max_buffer_length: 5.0,
                max_max_buffer_length: 10.0,
            },
        }
    }
}

/// Segment lifecycle tracker configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Interval of the look-ahead loading simulation
    pub lookahead_interval: Duration,
    /// Number of segments, from the current one, the look-ahead may touch
    pub lookahead_window: usize,
    /// Segments after the current one marked loaded on a segment change
    pub loaded_ahead: usize,
    /// Duration drift (seconds) that triggers a timeline correction
    pub duration_drift_tolerance: f64,
    /// Minimum spacing of timeline markers in seconds
    pub min_marker_stride: u64,
    /// Target number of markers across the timeline
    pub marker_count: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            lookahead_interval: Duration::from_secs(1),
            lookahead_window: 5,
            loaded_ahead: 3,
            duration_drift_tolerance: 1.0,
            min_marker_stride: 10,
            marker_count: 10,
        }
    }
}

/// Simulation configuration for the simulated media engine.
///
/// Controls the synthetic content and network used by `abrlab-sim`
/// for deterministic testing and demos.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Deterministic seed for reproducible simulations
    pub deterministic_seed: Option<u64>,
    /// Simulation step interval
    pub tick_interval: Duration,
    /// Native network throughput in bits per second
    pub network_bandwidth_bps: u64,
    /// Throughput jitter as a fraction of the native bandwidth (0.0 to 1.0)
    pub jitter_percent: f64,
    /// Duration of each synthetic segment in seconds
    pub segment_duration: f64,
    /// Total duration of synthetic content in seconds
    pub content_duration: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            deterministic_seed: None,
            tick_interval: Duration::from_millis(100),
            network_bandwidth_bps: 8_000_000, // 8 Mbps
            jitter_percent: 0.1,
            segment_duration: 4.0,
            content_duration: 120.0,
        }
    }
}

impl SimulationConfig {
    /// Creates a configuration for deterministic testing.
    pub fn deterministic_testing() -> Self {
        Self {
            deterministic_seed: Some(42), // Fixed seed for reproducible tests
            jitter_percent: 0.0,
            ..Self::default()
        }
    }
}

impl AbrLabConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("ABRLAB_METRICS_INTERVAL_MS")
            && let Ok(millis) = value.parse::<u64>()
        {
            config.metrics.default_interval =
                config.metrics.clamp_interval(Duration::from_millis(millis));
        }

        if let Ok(value) = std::env::var("ABRLAB_LOG_CAPACITY")
            && let Ok(capacity) = value.parse::<usize>()
        {
            config.session.log_capacity = capacity.max(1);
        }

        if let Ok(value) = std::env::var("ABRLAB_LOOKAHEAD_WINDOW")
            && let Ok(window) = value.parse::<usize>()
        {
            config.tracker.lookahead_window = window;
        }

        if let Ok(value) = std::env::var("ABRLAB_SIMULATION_SEED")
            && let Ok(seed) = value.parse::<u64>()
        {
            config.simulation.deterministic_seed = Some(seed);
        }

        if let Ok(value) = std::env::var("ABRLAB_SIMULATED_BANDWIDTH")
            && let Ok(bps) = value.parse::<u64>()
        {
            config.simulation.network_bandwidth_bps = bps;
        }

        config
    }
}
