//! Network condition simulation for the simulated engine.
//!
//! Throughput is sampled per download step with seeded jitter, so a run
//! with a fixed seed reproduces the same bandwidth trace.

use std::ops::Range;
use std::time::Duration;

use abrlab_core::config::SimulationConfig;

use crate::rng::DeterministicRng;

/// Simulates link throughput, request latency and transient failures.
#[derive(Debug, Clone)]
pub struct NetworkSimulator {
    bandwidth_bps: u64,
    jitter: f64,
    latency_ms: Range<u64>,
    failure_rate: f64,
    rng: DeterministicRng,
}

impl NetworkSimulator {
    /// Creates a network simulator builder.
    pub fn builder() -> NetworkSimulatorBuilder {
        NetworkSimulatorBuilder::new()
    }

    /// Creates a simulator from the simulation section of the config.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::builder()
            .bandwidth(config.network_bandwidth_bps)
            .jitter(config.jitter_percent)
            .seed(config.deterministic_seed)
            .build()
    }

    /// Nominal link bandwidth in bits per second.
    pub fn bandwidth_bps(&self) -> u64 {
        self.bandwidth_bps
    }

    /// Changes the nominal link bandwidth, e.g. to emulate a network drop.
    pub fn set_bandwidth(&mut self, bps: u64) {
        self.bandwidth_bps = bps;
    }

    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }

    /// Samples the throughput available for the next step.
    pub fn sample_throughput(&mut self) -> u64 {
        self.rng.jitter(self.bandwidth_bps, self.jitter)
    }

    /// Samples a request latency within the configured range.
    pub fn sample_latency(&mut self) -> Duration {
        let millis = self.rng.random_range(self.latency_ms.start, self.latency_ms.end);
        Duration::from_millis(millis)
    }

    /// Decides whether the next fragment request fails.
    pub fn should_fail_request(&mut self) -> bool {
        self.failure_rate > 0.0 && self.rng.random_bool(self.failure_rate)
    }

    /// Time needed to move `bytes` at `throughput_bps`.
    pub fn transfer_time(bytes: u64, throughput_bps: u64) -> Duration {
        if throughput_bps == 0 {
            return Duration::MAX;
        }
        Duration::from_secs_f64(bytes as f64 * 8.0 / throughput_bps as f64)
    }
}

/// Builder for configuring network simulation parameters.
pub struct NetworkSimulatorBuilder {
    bandwidth_bps: u64,
    jitter: f64,
    latency_ms: Range<u64>,
    failure_rate: f64,
    seed: Option<u64>,
}

impl NetworkSimulatorBuilder {
    fn new() -> Self {
        Self {
            bandwidth_bps: 8_000_000,
            jitter: 0.0,
            latency_ms: 20..60,
            failure_rate: 0.0,
            seed: None,
        }
    }

    /// Sets link bandwidth in bits per second.
    pub fn bandwidth(mut self, bps: u64) -> Self {
        self.bandwidth_bps = bps;
        self
    }

    /// Sets throughput jitter as a fraction of the bandwidth (0.0-1.0).
    pub fn jitter(mut self, fraction: f64) -> Self {
        self.jitter = fraction.clamp(0.0, 1.0);
        self
    }

    /// Sets request latency range in milliseconds.
    pub fn latency(mut self, range: Range<u64>) -> Self {
        self.latency_ms = range;
        self
    }

    /// Sets the per-request failure probability (0.0-1.0).
    pub fn failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Fixes the RNG seed; `None` draws a fresh one.
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Creates network simulator with configured settings.
    pub fn build(self) -> NetworkSimulator {
        NetworkSimulator {
            bandwidth_bps: self.bandwidth_bps,
            jitter: self.jitter,
            latency_ms: self.latency_ms,
            failure_rate: self.failure_rate,
            rng: DeterministicRng::from_optional_seed(self.seed),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_same_seed_same_trace() {
        let mut a = NetworkSimulator::builder().jitter(0.2).seed(Some(9)).build();
        let mut b = NetworkSimulator::builder().jitter(0.2).seed(Some(9)).build();

        let trace_a: Vec<u64> = (0..20).map(|_| a.sample_throughput()).collect();
        let trace_b: Vec<u64> = (0..20).map(|_| b.sample_throughput()).collect();
        assert_eq!(trace_a, trace_b);
    }

    #[test]
    fn test_deterministic_config_has_flat_throughput() {
        let mut network = NetworkSimulator::from_config(&SimulationConfig::deterministic_testing());
        assert_eq!(network.seed(), 42);
        assert!((0..10).all(|_| network.sample_throughput() == 8_000_000));
    }

    #[test]
    fn test_transfer_time() {
        assert_eq!(
            NetworkSimulator::transfer_time(1_000_000, 8_000_000),
            Duration::from_secs(1)
        );
        assert_eq!(NetworkSimulator::transfer_time(1, 0), Duration::MAX);
    }

    #[test]
    fn test_latency_within_range() {
        let mut network = NetworkSimulator::builder()
            .latency(10..20)
            .seed(Some(1))
            .build();
        for _ in 0..100 {
            let latency = network.sample_latency();
            assert!(latency >= Duration::from_millis(10) && latency < Duration::from_millis(20));
        }
    }

    #[test]
    fn test_failure_rate_zero_never_fails() {
        let mut network = NetworkSimulator::builder().seed(Some(5)).build();
        assert!((0..100).all(|_| !network.should_fail_request()));

        let mut always = NetworkSimulator::builder()
            .failure_rate(1.0)
            .seed(Some(5))
            .build();
        assert!(always.should_fail_request());
    }

    proptest! {
        #[test]
        fn prop_throughput_within_jitter(
            seed in any::<u64>(),
            jitter in 0.0f64..=1.0,
            bps in 1u64..100_000_000,
        ) {
            let mut network = NetworkSimulator::builder()
                .bandwidth(bps)
                .jitter(jitter)
                .seed(Some(seed))
                .build();
            for _ in 0..20 {
                let sample = network.sample_throughput() as f64;
                prop_assert!(sample >= (bps as f64 * (1.0 - jitter)).floor());
                prop_assert!(sample <= (bps as f64 * (1.0 + jitter)).ceil());
            }
        }
    }
}
