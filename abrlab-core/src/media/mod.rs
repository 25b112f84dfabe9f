//! Media engine boundary.
//!
//! The external adaptive-streaming engine and render surface are reached only
//! through the `MediaEngine` and `MediaSurface` traits. Raw engine events are
//! translated by `EngineAdapter` into the typed `MediaEvent` model the session
//! actor consumes.

pub mod adapter;
pub mod engine;
pub mod events;
pub mod level;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_mocks;

pub use adapter::{EngineAdapter, EngineErrorKind, EngineFailure, MediaEvent};
pub use engine::{LevelSelection, MediaEngine, MediaSurface, RenderSurface};
pub use events::{EngineEvent, EngineEventSink, FragmentMeta};
pub use level::{LevelInfo, QualityLevel};
