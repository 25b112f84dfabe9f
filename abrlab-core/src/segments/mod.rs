//! Segment lifecycle tracking.
//!
//! Keeps an ordered timeline of media segments with per-segment status and
//! progress, advanced by playback-position polling and a look-ahead loading
//! simulation.

pub mod timeline;

use serde::{Deserialize, Serialize};

pub use timeline::SegmentTimeline;

/// Lifecycle status of a single segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentStatus {
    Pending,
    Loading,
    Loaded,
    Playing,
    Buffered,
    Error,
}

impl SegmentStatus {
    /// Position along the forward-only chain. `Error` sits outside it.
    pub fn rank(self) -> Option<u8> {
        match self {
            SegmentStatus::Pending => Some(0),
            SegmentStatus::Loading => Some(1),
            SegmentStatus::Loaded => Some(2),
            SegmentStatus::Playing => Some(3),
            SegmentStatus::Buffered => Some(4),
            SegmentStatus::Error => None,
        }
    }

    /// Whether the segment counts towards the buffered total.
    pub fn is_buffered(self) -> bool {
        matches!(self, SegmentStatus::Loaded | SegmentStatus::Buffered)
    }
}

/// One time-bounded chunk of media on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub index: usize,
    pub source_url: String,
    pub duration_sec: f64,
    pub size_bytes: u64,
    pub bitrate_bps: u64,
    pub status: SegmentStatus,
    pub progress_pct: f64,
    pub start_time_sec: f64,
    pub end_time_sec: f64,
}

impl Segment {
    pub fn contains(&self, time_sec: f64) -> bool {
        time_sec >= self.start_time_sec && time_sec < self.end_time_sec
    }
}

/// Timeline display marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeMarker {
    pub time_sec: u64,
    /// `m:ss`
    pub label: String,
    /// Position along the timeline in percent
    pub position_pct: f64,
}

/// Read-only view of a timeline handed to observers and queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineSnapshot {
    pub segments: Vec<Segment>,
    pub total_duration: f64,
    pub current_index: Option<usize>,
    pub buffered_segments_count: usize,
    pub markers: Vec<TimeMarker>,
}
