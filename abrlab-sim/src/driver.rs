//! Drives simulated time for an engine/surface pair.

use std::sync::Arc;
use std::time::Duration;

use abrlab_core::config::SimulationConfig;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::content::SimulatedContent;
use crate::engine::{SimulatedEngine, SimulatedSurface};
use crate::network::NetworkSimulator;
use crate::state::{Fault, SimState, SimStats};

/// A simulated engine, its surface and the driver advancing them.
#[derive(Debug)]
pub struct SimulatedPlayer {
    pub engine: SimulatedEngine,
    pub surface: SimulatedSurface,
    pub driver: SimulationDriver,
}

impl SimulatedPlayer {
    /// Builds a player over the standard ladder and network from `config`.
    pub fn new(config: &SimulationConfig) -> Self {
        Self::with_parts(
            SimulatedContent::from_config(config),
            NetworkSimulator::from_config(config),
        )
    }

    pub fn with_parts(content: SimulatedContent, network: NetworkSimulator) -> Self {
        let state = Arc::new(Mutex::new(SimState::new(content, network)));
        Self {
            engine: SimulatedEngine::new(Arc::clone(&state)),
            surface: SimulatedSurface::new(Arc::clone(&state)),
            driver: SimulationDriver { state },
        }
    }
}

/// Advances a simulated player and injects faults into it.
///
/// Cloning yields another handle to the same player.
#[derive(Debug, Clone)]
pub struct SimulationDriver {
    state: Arc<Mutex<SimState>>,
}

impl SimulationDriver {
    /// Advances manifest loading, fragment downloads and playback by `dt`.
    ///
    /// Returns false once the engine has been destroyed.
    pub fn step(&self, dt: Duration) -> bool {
        self.state.lock().step(dt)
    }

    /// Steps `total` worth of time in `tick` increments without a runtime.
    pub fn run_for(&self, total: Duration, tick: Duration) {
        if tick.is_zero() {
            return;
        }
        let mut elapsed = Duration::ZERO;
        while elapsed < total {
            if !self.step(tick) {
                break;
            }
            elapsed += tick;
        }
    }

    /// Spawns a task stepping the player every `tick` of tokio time.
    ///
    /// The task ends by itself once the engine is destroyed.
    pub fn spawn(&self, tick: Duration) -> JoinHandle<()> {
        let driver = self.clone();
        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + tick, tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !driver.step(tick) {
                    tracing::debug!("Simulation driver stopped: engine destroyed");
                    break;
                }
            }
        })
    }

    /// Emits an engine failure of class `fault`.
    pub fn inject_error(&self, fault: Fault, fatal: bool) {
        tracing::debug!("Injecting {:?} fault (fatal: {})", fault, fatal);
        self.state.lock().inject_fault(fault, fatal);
    }

    /// Changes the simulated link bandwidth.
    pub fn set_network_bandwidth(&self, bps: u64) {
        self.state.lock().set_network_bandwidth(bps);
    }

    pub fn stats(&self) -> SimStats {
        self.state.lock().stats()
    }
}
