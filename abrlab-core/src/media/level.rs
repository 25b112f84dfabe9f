//! Quality levels reported by the media engine.

use serde::{Deserialize, Serialize};

/// Raw rendition description as reported by the engine after manifest load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelInfo {
    /// Advertised bitrate in bits per second
    pub bitrate_bps: u64,
    pub width: u32,
    pub height: u32,
    /// Codec string, when the manifest declares one
    pub codecs: Option<String>,
}

/// One rendition of the stream, indexed by its position in the engine's level list.
///
/// Levels are not assumed to be sorted by bitrate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityLevel {
    pub index: usize,
    pub bitrate_bps: u64,
    pub width: u32,
    pub height: u32,
    pub codec: String,
}

impl QualityLevel {
    /// Builds the normalized level for position `index` of the engine's list.
    pub fn from_info(index: usize, info: &LevelInfo) -> Self {
        Self {
            index,
            bitrate_bps: info.bitrate_bps,
            width: info.width,
            height: info.height,
            codec: info
                .codecs
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }

    /// Bitrate rounded to whole kilobits per second.
    pub fn bitrate_kbps(&self) -> u64 {
        (self.bitrate_bps + 500) / 1000
    }

    /// Human-readable label, e.g. `720p (1200kbps)`.
    pub fn label(&self) -> String {
        format!("{}p ({}kbps)", self.height, self.bitrate_kbps())
    }
}

/// Normalizes a raw level list into indexed quality levels.
pub fn normalize_levels(infos: &[LevelInfo]) -> Vec<QualityLevel> {
    infos
        .iter()
        .enumerate()
        .map(|(index, info)| QualityLevel::from_info(index, info))
        .collect()
}

/// Returns the lowest-bitrate level, preferring the lowest index on ties.
pub fn lowest_bitrate_level(levels: &[QualityLevel]) -> Option<&QualityLevel> {
    levels
        .iter()
        .min_by(|a, b| a.bitrate_bps.cmp(&b.bitrate_bps).then(a.index.cmp(&b.index)))
}

/// Returns the highest-bitrate level at or below `cap_bps`, preferring the
/// lowest index on ties.
pub fn highest_level_within(levels: &[QualityLevel], cap_bps: u64) -> Option<&QualityLevel> {
    levels
        .iter()
        .filter(|level| level.bitrate_bps <= cap_bps)
        .max_by(|a, b| a.bitrate_bps.cmp(&b.bitrate_bps).then(b.index.cmp(&a.index)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(index: usize, bitrate_bps: u64) -> QualityLevel {
        QualityLevel {
            index,
            bitrate_bps,
            width: 0,
            height: 0,
            codec: "avc1".to_string(),
        }
    }

    #[test]
    fn test_label_rounds_kbps() {
        let level = QualityLevel {
            index: 0,
            bitrate_bps: 1_199_600,
            width: 1280,
            height: 720,
            codec: "avc1".to_string(),
        };
        assert_eq!(level.label(), "720p (1200kbps)");
    }

    #[test]
    fn test_missing_codec_defaults_to_unknown() {
        let info = LevelInfo {
            bitrate_bps: 400_000,
            width: 640,
            height: 360,
            codecs: None,
        };
        assert_eq!(QualityLevel::from_info(3, &info).codec, "unknown");
    }

    #[test]
    fn test_highest_within_ignores_list_order() {
        let levels = vec![level(0, 3_000_000), level(1, 400_000), level(2, 1_200_000)];
        let picked = highest_level_within(&levels, 2_000_000).unwrap();
        assert_eq!(picked.index, 2);
    }

    #[test]
    fn test_ties_prefer_lowest_index() {
        let levels = vec![level(0, 800_000), level(1, 800_000), level(2, 200_000)];
        assert_eq!(highest_level_within(&levels, 1_000_000).unwrap().index, 0);

        let levels = vec![level(0, 900_000), level(1, 500_000), level(2, 500_000)];
        assert_eq!(lowest_bitrate_level(&levels).unwrap().index, 1);
    }

    #[test]
    fn test_nothing_within_cap() {
        let levels = vec![level(0, 800_000)];
        assert!(highest_level_within(&levels, 100_000).is_none());
    }
}
