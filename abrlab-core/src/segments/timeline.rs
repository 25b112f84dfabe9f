//! Ordered segment timeline and its advancement rules.

use std::ops::Range;

use super::{Segment, SegmentStatus, TimeMarker, TimelineSnapshot};
use crate::config::TrackerConfig;
use crate::media::FragmentMeta;

/// Segment timeline for one loaded stream.
///
/// Segments partition `[0, end)` contiguously: each segment starts exactly
/// where the previous one ends. Statuses only move forward along
/// `pending -> loading -> loaded -> playing -> buffered`; a seek backwards
/// re-derives the whole timeline from the new position. `Error` segments are
/// left alone until the next ingest.
#[derive(Debug, Clone)]
pub struct SegmentTimeline {
    segments: Vec<Segment>,
    total_duration: f64,
    markers: Vec<TimeMarker>,
    current: Option<usize>,
    config: TrackerConfig,
}

impl SegmentTimeline {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            segments: Vec::new(),
            total_duration: 0.0,
            markers: Vec::new(),
            current: None,
            config,
        }
    }

    /// Replaces the whole timeline from an engine fragment list.
    ///
    /// Fragments with a non-positive duration are skipped. Missing bitrate
    /// falls back to `default_bitrate_bps`; missing size is derived from
    /// bitrate and duration.
    pub fn ingest(&mut self, fragments: &[FragmentMeta], default_bitrate_bps: u64) {
        self.segments.clear();
        self.current = None;

        let mut start = 0.0;
        for fragment in fragments.iter().filter(|f| f.duration > 0.0) {
            let bitrate_bps = fragment.bitrate_bps.unwrap_or(default_bitrate_bps);
            let size_bytes = fragment
                .size_bytes
                .unwrap_or_else(|| (bitrate_bps as f64 * fragment.duration / 8.0).round() as u64);
            let end = start + fragment.duration;

            self.segments.push(Segment {
                index: self.segments.len(),
                source_url: fragment.url.clone(),
                duration_sec: fragment.duration,
                size_bytes,
                bitrate_bps,
                status: SegmentStatus::Pending,
                progress_pct: 0.0,
                start_time_sec: start,
                end_time_sec: end,
            });
            start = end;
        }

        self.total_duration = start;
        self.regenerate_markers();
        tracing::debug!(
            "Timeline rebuilt: {} segments, {:.1}s",
            self.segments.len(),
            self.total_duration
        );
    }

    /// Drops every segment.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.markers.clear();
        self.total_duration = 0.0;
        self.current = None;
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn markers(&self) -> &[TimeMarker] {
        &self.markers
    }

    /// Advances the timeline to a playback position.
    ///
    /// Returns true when anything observable changed. A position outside
    /// the timeline clears the current segment and leaves statuses alone.
    pub fn advance(&mut self, current_time: f64, reported_duration: Option<f64>) -> bool {
        if self.segments.is_empty() {
            return false;
        }

        let mut changed = false;
        if let Some(duration) = reported_duration
            && duration.is_finite()
            && duration > 0.0
            && (duration - self.total_duration).abs() > self.config.duration_drift_tolerance
        {
            tracing::debug!(
                "Correcting timeline duration {:.1}s -> {:.1}s",
                self.total_duration,
                duration
            );
            self.total_duration = duration;
            self.regenerate_markers();
            changed = true;
        }

        let Some(matched) = self.segments.iter().position(|s| s.contains(current_time)) else {
            if self.current.take().is_some() {
                changed = true;
            }
            return changed;
        };

        let segment = &mut self.segments[matched];
        let progress = ((current_time - segment.start_time_sec) / segment.duration_sec * 100.0)
            .clamp(0.0, 100.0);

        if self.current == Some(matched) {
            if segment.progress_pct != progress {
                segment.progress_pct = progress;
                changed = true;
            }
            return changed;
        }

        let rewind = self.segments[matched..].iter().any(|s| {
            matches!(s.status, SegmentStatus::Playing | SegmentStatus::Buffered)
        });
        self.derive_statuses(matched, rewind);
        self.segments[matched].progress_pct = progress;
        self.current = Some(matched);
        true
    }

    fn derive_statuses(&mut self, matched: usize, rewind: bool) {
        let loaded_ahead = self.config.loaded_ahead;
        for segment in &mut self.segments {
            let derived = if segment.index < matched {
                SegmentStatus::Buffered
            } else if segment.index == matched {
                SegmentStatus::Playing
            } else if segment.index <= matched + loaded_ahead {
                SegmentStatus::Loaded
            } else {
                SegmentStatus::Pending
            };
            if segment.index != matched {
                segment.progress_pct = if derived == SegmentStatus::Buffered { 100.0 } else { 0.0 };
            }
            apply_status(segment, derived, rewind);
        }
    }

    /// One look-ahead tick: promotes the first pending segment in the window
    /// starting at the current segment to `loaded`.
    pub fn advance_lookahead(&mut self) -> Option<usize> {
        let window = self.lookahead_range();
        let segment = self.segments[window]
            .iter_mut()
            .find(|s| s.status == SegmentStatus::Pending)?;
        segment.status = SegmentStatus::Loaded;
        Some(segment.index)
    }

    /// Whether a pending segment remains in the look-ahead window.
    pub fn has_pending_in_window(&self) -> bool {
        self.segments[self.lookahead_range()]
            .iter()
            .any(|s| s.status == SegmentStatus::Pending)
    }

    fn lookahead_range(&self) -> Range<usize> {
        let start = self.current.unwrap_or(0);
        let end = start
            .saturating_add(self.config.lookahead_window)
            .min(self.segments.len());
        start.min(end)..end
    }

    /// Number of segments that are `loaded` or `buffered`.
    pub fn buffered_segments_count(&self) -> usize {
        self.segments.iter().filter(|s| s.status.is_buffered()).count()
    }

    /// Marks a segment as failed. Returns false for unknown indices.
    pub fn mark_error(&mut self, index: usize) -> bool {
        match self.segments.get_mut(index) {
            Some(segment) => {
                segment.status = SegmentStatus::Error;
                true
            }
            None => false,
        }
    }

    /// Records a completed fragment download.
    ///
    /// The segment is matched by URL; its real size replaces the estimate and
    /// a pending or loading segment becomes `loaded`.
    pub fn mark_fragment_loaded(&mut self, fragment: &FragmentMeta) -> Option<usize> {
        let segment = self
            .segments
            .iter_mut()
            .find(|s| s.source_url == fragment.url)?;
        if let Some(size) = fragment.size_bytes {
            segment.size_bytes = size;
        }
        apply_status(segment, SegmentStatus::Loaded, false);
        Some(segment.index)
    }

    pub fn snapshot(&self) -> TimelineSnapshot {
        TimelineSnapshot {
            segments: self.segments.clone(),
            total_duration: self.total_duration,
            current_index: self.current,
            buffered_segments_count: self.buffered_segments_count(),
            markers: self.markers.clone(),
        }
    }

    fn regenerate_markers(&mut self) {
        self.markers.clear();
        if self.total_duration <= 0.0 {
            return;
        }
        let total = self.total_duration;
        let stride = (total / self.config.marker_count.max(1) as f64)
            .floor()
            .max(self.config.min_marker_stride as f64)
            .max(1.0) as u64;

        let mut time = 0u64;
        while (time as f64) <= total {
            self.markers.push(TimeMarker {
                time_sec: time,
                label: format_timestamp(time),
                position_pct: time as f64 / total * 100.0,
            });
            let Some(next) = time.checked_add(stride) else {
                break;
            };
            time = next;
        }
    }
}

fn apply_status(segment: &mut Segment, derived: SegmentStatus, force: bool) {
    if segment.status == SegmentStatus::Error {
        return;
    }
    if force {
        segment.status = derived;
        return;
    }
    match (segment.status.rank(), derived.rank()) {
        (Some(current), Some(next)) if next >= current => segment.status = derived,
        _ => {}
    }
}

/// Formats whole seconds as `m:ss`.
pub fn format_timestamp(total_secs: u64) -> String {
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::media::test_mocks::sample_fragments;

    fn timeline_with(count: usize, duration: f64) -> SegmentTimeline {
        let mut timeline = SegmentTimeline::new(TrackerConfig::default());
        timeline.ingest(&sample_fragments(count, duration), 1_200_000);
        timeline
    }

    fn statuses(timeline: &SegmentTimeline) -> Vec<SegmentStatus> {
        timeline.segments().iter().map(|s| s.status).collect()
    }

    #[test]
    fn test_ingest_builds_contiguous_timeline() {
        let timeline = timeline_with(10, 4.0);
        assert_eq!(timeline.len(), 10);
        assert_eq!(timeline.total_duration(), 40.0);

        let segments = timeline.segments();
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end_time_sec, pair[1].start_time_sec);
        }
        assert_eq!(segments[0].size_bytes, 600_000);
        assert!(segments.iter().all(|s| s.status == SegmentStatus::Pending));
    }

    #[test]
    fn test_ingest_skips_empty_fragments() {
        let mut fragments = sample_fragments(3, 4.0);
        fragments[1].duration = 0.0;
        let mut timeline = SegmentTimeline::new(TrackerConfig::default());
        timeline.ingest(&fragments, 400_000);

        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.segments()[1].index, 1);
        assert_eq!(timeline.segments()[1].start_time_sec, 4.0);
    }

    #[test]
    fn test_markers_use_minimum_stride() {
        let timeline = timeline_with(10, 4.0);
        let labels: Vec<_> = timeline.markers().iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["0:00", "0:10", "0:20", "0:30", "0:40"]);

        let long = timeline_with(60, 10.0);
        assert_eq!(long.markers()[1].time_sec, 60);
        assert_eq!(long.markers()[1].label, "1:00");
    }

    #[test]
    fn test_advance_derives_statuses() {
        let mut timeline = timeline_with(10, 4.0);
        assert!(timeline.advance(9.0, Some(40.0)));

        use SegmentStatus::*;
        assert_eq!(
            statuses(&timeline),
            vec![Buffered, Buffered, Playing, Loaded, Loaded, Loaded, Pending, Pending, Pending, Pending]
        );
        assert_eq!(timeline.current_index(), Some(2));
        assert_eq!(timeline.segments()[2].progress_pct, 25.0);
        assert_eq!(timeline.buffered_segments_count(), 5);
    }

    #[test]
    fn test_same_segment_refreshes_progress_only() {
        let mut timeline = timeline_with(4, 4.0);
        timeline.advance(4.0, None);
        let before = statuses(&timeline);

        assert!(timeline.advance(6.0, None));
        assert_eq!(statuses(&timeline), before);
        assert_eq!(timeline.segments()[1].progress_pct, 50.0);

        assert!(!timeline.advance(6.0, None));
    }

    #[test]
    fn test_out_of_range_leaves_statuses() {
        let mut timeline = timeline_with(4, 4.0);
        timeline.advance(5.0, None);
        let before = statuses(&timeline);

        assert!(timeline.advance(99.0, None));
        assert_eq!(timeline.current_index(), None);
        assert_eq!(statuses(&timeline), before);
    }

    #[test]
    fn test_backward_seek_rederives_timeline() {
        let mut timeline = timeline_with(8, 4.0);
        timeline.advance(20.0, None);
        timeline.advance(1.0, None);

        use SegmentStatus::*;
        assert_eq!(
            statuses(&timeline),
            vec![Playing, Loaded, Loaded, Loaded, Pending, Pending, Pending, Pending]
        );
    }

    #[test]
    fn test_error_survives_advancement() {
        let mut timeline = timeline_with(6, 4.0);
        assert!(timeline.mark_error(3));
        timeline.advance(1.0, None);
        timeline.advance(17.0, None);
        assert_eq!(timeline.segments()[3].status, SegmentStatus::Error);
        assert!(!timeline.mark_error(42));
    }

    #[test]
    fn test_duration_drift_regenerates_markers() {
        let mut timeline = timeline_with(10, 4.0);
        timeline.advance(0.5, Some(40.5));
        assert_eq!(timeline.total_duration(), 40.0);

        timeline.advance(0.6, Some(120.0));
        assert_eq!(timeline.total_duration(), 120.0);
        assert_eq!(timeline.markers().last().unwrap().label, "2:00");
    }

    #[test]
    fn test_lookahead_promotes_one_pending_per_tick() {
        let mut timeline = timeline_with(8, 4.0);
        assert_eq!(timeline.advance_lookahead(), Some(0));
        assert_eq!(timeline.advance_lookahead(), Some(1));
        assert_eq!(timeline.buffered_segments_count(), 2);

        timeline.advance(0.5, None);
        // Window is segments 0..5; 0 playing, 1..=3 loaded.
        assert_eq!(timeline.advance_lookahead(), Some(4));
        assert!(!timeline.has_pending_in_window());
        assert_eq!(timeline.advance_lookahead(), None);
        assert_eq!(timeline.segments()[5].status, SegmentStatus::Pending);
    }

    #[test]
    fn test_backward_seek_reopens_lookahead_window() {
        let mut timeline = timeline_with(10, 4.0);
        timeline.advance(30.0, None);
        assert!(!timeline.has_pending_in_window());

        timeline.advance(1.0, None);
        assert!(timeline.has_pending_in_window());
        assert_eq!(timeline.advance_lookahead(), Some(4));
        assert!(!timeline.has_pending_in_window());
    }

    #[test]
    fn test_huge_duration_markers_terminate() {
        let mut timeline = timeline_with(2, 4.0);
        timeline.advance(1.0, Some(f64::MAX));
        let markers = timeline.markers();
        assert_eq!(markers[0].time_sec, 0);
        assert!(markers.len() <= 2);
    }

    #[test]
    fn test_empty_timeline_is_inert() {
        let mut timeline = SegmentTimeline::new(TrackerConfig::default());
        timeline.ingest(&[], 0);
        assert!(!timeline.advance(3.0, Some(10.0)));
        assert_eq!(timeline.advance_lookahead(), None);
        assert!(!timeline.has_pending_in_window());
        assert!(timeline.markers().is_empty());
    }

    #[test]
    fn test_fragment_loaded_updates_size() {
        let mut timeline = timeline_with(3, 4.0);
        let mut fragment = sample_fragments(3, 4.0).remove(2);
        fragment.size_bytes = Some(1234);

        assert_eq!(timeline.mark_fragment_loaded(&fragment), Some(2));
        assert_eq!(timeline.segments()[2].size_bytes, 1234);
        assert_eq!(timeline.segments()[2].status, SegmentStatus::Loaded);
    }

    proptest! {
        #[test]
        fn prop_sweep_plays_every_segment_once_in_order(
            durations in prop::collection::vec(0.1f64..12.0, 1..40),
            substeps in 1usize..4,
        ) {
            let fragments: Vec<FragmentMeta> = durations
                .iter()
                .enumerate()
                .map(|(i, d)| FragmentMeta {
                    sequence: i as u64,
                    url: format!("seg{i}"),
                    duration: *d,
                    size_bytes: None,
                    bitrate_bps: Some(800_000),
                })
                .collect();
            let mut timeline = SegmentTimeline::new(TrackerConfig::default());
            timeline.ingest(&fragments, 0);

            let mut played = Vec::new();
            let starts: Vec<(f64, f64)> = timeline
                .segments()
                .iter()
                .map(|s| (s.start_time_sec, s.duration_sec))
                .collect();
            for (start, duration) in starts {
                for step in 0..substeps {
                    let t = start + duration * step as f64 / substeps as f64;
                    timeline.advance(t, None);
                    let current = timeline.current_index().unwrap();
                    prop_assert_eq!(timeline.segments()[current].status, SegmentStatus::Playing);
                    if played.last() != Some(&current) {
                        played.push(current);
                    }
                }
            }

            let expected: Vec<usize> = (0..durations.len()).collect();
            prop_assert_eq!(played, expected);
            prop_assert_eq!(timeline.buffered_segments_count(),
                timeline.segments().iter().filter(|s| s.status.is_buffered()).count());
        }
    }
}
