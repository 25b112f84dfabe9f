//! Metrics aggregation from session and engine state.

use serde::{Deserialize, Serialize};

use crate::media::QualityLevel;

/// Normalized playback metrics, recomputed on every poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Bitrate of the selected level in kbps, 0 when no level is selected
    pub bitrate_kbps: u64,
    /// Seconds of media buffered ahead of the playhead, one decimal place
    pub buffer_health_sec: f64,
    pub dropped_frames: u64,
    /// `"{height}p ({kbps}kbps)"` for a concrete level, otherwise `"Auto"`
    pub quality_label: String,
    /// Selected level index, -1 for automatic or unknown
    pub current_level_index: i32,
    pub available_levels: Vec<QualityLevel>,
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self {
            bitrate_kbps: 0,
            buffer_health_sec: 0.0,
            dropped_frames: 0,
            quality_label: AUTO_LABEL.to_string(),
            current_level_index: -1,
            available_levels: Vec::new(),
        }
    }
}

const AUTO_LABEL: &str = "Auto";

/// Surface readings taken at poll time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlaybackSample {
    pub current_time: f64,
    pub duration: Option<f64>,
    pub buffered_end: Option<f64>,
    pub dropped_frames: u64,
}

impl PlaybackSample {
    /// Buffered media ahead of the playhead, clamped at zero.
    pub fn buffer_health(&self) -> f64 {
        match self.buffered_end {
            Some(end) => round_tenths((end - self.current_time).max(0.0)),
            None => 0.0,
        }
    }
}

/// Computes a snapshot from the level list, the selected level and a surface sample.
///
/// An index outside `levels` is reported as -1 with the automatic label.
pub fn compute(
    levels: &[QualityLevel],
    current_level: Option<usize>,
    sample: &PlaybackSample,
) -> MetricsSnapshot {
    let selected = current_level.and_then(|index| levels.iter().find(|l| l.index == index));

    let (bitrate_kbps, quality_label, current_level_index) = match selected {
        Some(level) => (level.bitrate_kbps(), level.label(), level.index as i32),
        None => (0, AUTO_LABEL.to_string(), -1),
    };

    MetricsSnapshot {
        bitrate_kbps,
        buffer_health_sec: sample.buffer_health(),
        dropped_frames: sample.dropped_frames,
        quality_label,
        current_level_index,
        available_levels: levels.to_vec(),
    }
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::level::normalize_levels;
    use crate::media::test_mocks::sample_levels;

    #[test]
    fn test_default_snapshot_is_auto() {
        let snapshot = MetricsSnapshot::default();
        assert_eq!(snapshot.quality_label, "Auto");
        assert_eq!(snapshot.current_level_index, -1);
        assert_eq!(snapshot.bitrate_kbps, 0);
    }

    #[test]
    fn test_selected_level_fills_label_and_bitrate() {
        let levels = normalize_levels(&sample_levels());
        let sample = PlaybackSample {
            current_time: 10.0,
            duration: Some(120.0),
            buffered_end: Some(22.46),
            dropped_frames: 3,
        };

        let snapshot = compute(&levels, Some(1), &sample);
        assert_eq!(snapshot.bitrate_kbps, 1200);
        assert_eq!(snapshot.quality_label, "720p (1200kbps)");
        assert_eq!(snapshot.current_level_index, 1);
        assert_eq!(snapshot.buffer_health_sec, 12.5);
        assert_eq!(snapshot.dropped_frames, 3);
        assert_eq!(snapshot.available_levels.len(), 3);
    }

    #[test]
    fn test_invalid_index_reports_auto() {
        let levels = normalize_levels(&sample_levels());
        let snapshot = compute(&levels, Some(9), &PlaybackSample::default());
        assert_eq!(snapshot.current_level_index, -1);
        assert_eq!(snapshot.quality_label, "Auto");
    }

    #[test]
    fn test_buffer_health_never_negative() {
        let sample = PlaybackSample {
            current_time: 30.0,
            buffered_end: Some(12.0),
            ..PlaybackSample::default()
        };
        assert_eq!(sample.buffer_health(), 0.0);

        let nothing_buffered = PlaybackSample {
            current_time: 30.0,
            ..PlaybackSample::default()
        };
        assert_eq!(nothing_buffered.buffer_health(), 0.0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(MetricsSnapshot::default()).unwrap();
        assert_eq!(json["quality_label"], "Auto");
        assert_eq!(json["current_level_index"], -1);
    }
}
