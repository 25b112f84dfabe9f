//! Synthetic stream content served by the simulated engine.

use abrlab_core::config::SimulationConfig;
use abrlab_core::media::{FragmentMeta, LevelInfo};
use serde::Serialize;

/// A well-known public test stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DemoStream {
    pub name: &'static str,
    pub url: &'static str,
}

/// Public HLS test streams offered as defaults by the CLI.
pub const DEMO_STREAMS: &[DemoStream] = &[
    DemoStream {
        name: "Big Buck Bunny",
        url: "https://test-streams.mux.dev/x36xhzz/x36xhzz.m3u8",
    },
    DemoStream {
        name: "Sintel 4K",
        url: "https://bitdash-a.akamaihd.net/content/sintel/hls/playlist.m3u8",
    },
    DemoStream {
        name: "Tears of Steel",
        url: "https://demo.unified-streaming.com/k8s/features/stable/video/tears-of-steel/tears-of-steel.ism/.m3u8",
    },
];

/// Bitrate ladder and fragment layout of a simulated stream.
///
/// Every level shares the same fragment boundaries and URLs, so a fragment
/// is identified by its position regardless of the level it was fetched at.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedContent {
    levels: Vec<LevelInfo>,
    segment_duration: f64,
    duration: f64,
}

impl SimulatedContent {
    pub fn new(levels: Vec<LevelInfo>, segment_duration: f64, duration: f64) -> Self {
        Self {
            levels,
            segment_duration: segment_duration.max(0.1),
            duration: duration.max(0.0),
        }
    }

    /// Three-rung ladder (360p, 720p, 1080p) shaped by the simulation config.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(
            standard_ladder(),
            config.segment_duration,
            config.content_duration,
        )
    }

    pub fn levels(&self) -> &[LevelInfo] {
        &self.levels
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn segment_duration(&self) -> f64 {
        self.segment_duration
    }

    /// Number of fragments; the last one may be shorter than the others.
    pub fn fragment_count(&self) -> usize {
        (self.duration / self.segment_duration).ceil() as usize
    }

    /// Duration of fragment `index`, or zero past the end.
    pub fn fragment_duration(&self, index: usize) -> f64 {
        let start = index as f64 * self.segment_duration;
        (self.duration - start).clamp(0.0, self.segment_duration)
    }

    /// Encoded size of fragment `index` at `level`.
    pub fn fragment_size(&self, level: usize, index: usize) -> u64 {
        let bitrate = self.levels.get(level).map_or(0, |info| info.bitrate_bps);
        (bitrate as f64 * self.fragment_duration(index) / 8.0).round() as u64
    }

    /// Fragment metadata for one fragment, as a playlist or download reports it.
    pub fn fragment(&self, base_url: &str, level: usize, index: usize) -> FragmentMeta {
        FragmentMeta {
            sequence: index as u64,
            url: fragment_url(base_url, index),
            duration: self.fragment_duration(index),
            size_bytes: Some(self.fragment_size(level, index)),
            bitrate_bps: self.levels.get(level).map(|info| info.bitrate_bps),
        }
    }

    /// Full media playlist for `level`.
    pub fn playlist(&self, base_url: &str, level: usize) -> Vec<FragmentMeta> {
        (0..self.fragment_count())
            .map(|index| self.fragment(base_url, level, index))
            .collect()
    }
}

/// Ladder used by the simulated engine and the CLI demos.
pub fn standard_ladder() -> Vec<LevelInfo> {
    [
        (400_000, 640, 360, "avc1.4d401e"),
        (1_200_000, 1280, 720, "avc1.4d401f"),
        (3_000_000, 1920, 1080, "avc1.640028"),
    ]
    .into_iter()
    .map(|(bitrate_bps, width, height, codecs)| LevelInfo {
        bitrate_bps,
        width,
        height,
        codecs: Some(codecs.to_string()),
    })
    .collect()
}

fn fragment_url(base_url: &str, index: usize) -> String {
    let base = base_url
        .rsplit_once('/')
        .map_or(base_url, |(directory, _)| directory);
    format!("{base}/segment{index:05}.ts")
}
