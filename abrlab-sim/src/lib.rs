//! abrlab simulation - deterministic media engine for testing and demos.
//!
//! Provides a simulated adaptive-streaming engine and render surface that
//! implement the core's `MediaEngine` / `MediaSurface` boundary. Content is
//! a synthetic bitrate ladder, the network is a seeded throughput model and
//! time only moves when the `SimulationDriver` steps it, so the same seed
//! always yields the same session.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use abrlab_core::config::AbrLabConfig;
//! use abrlab_core::session::{StreamTarget, spawn_session};
//! use abrlab_sim::SimulatedPlayer;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AbrLabConfig::default();
//! let player = SimulatedPlayer::new(&config.simulation);
//! let ticker = player.driver.spawn(config.simulation.tick_interval);
//!
//! let session = spawn_session(player.engine, config, "A");
//! session.initialize(Box::new(player.surface)).await?;
//! session
//!     .load(StreamTarget::adaptive("https://test-streams.mux.dev/x36xhzz/x36xhzz.m3u8", "bbb")?)
//!     .await?;
//! session.play().await?;
//!
//! tokio::time::sleep(Duration::from_secs(10)).await;
//! println!("{:?}", session.metrics().await?);
//!
//! session.destroy().await?;
//! ticker.await?;
//! # Ok(())
//! # }
//! ```

pub mod content;
pub mod driver;
pub mod engine;
pub mod network;
pub mod rng;
mod state;

pub use content::{DEMO_STREAMS, DemoStream, SimulatedContent, standard_ladder};
pub use driver::{SimulatedPlayer, SimulationDriver};
pub use engine::{SimulatedEngine, SimulatedSurface};
pub use network::{NetworkSimulator, NetworkSimulatorBuilder};
pub use rng::DeterministicRng;
pub use state::{ABR_SAFETY_FACTOR, Fault, INITIAL_ESTIMATE_BPS, SimStats};
