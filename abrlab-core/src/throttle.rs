//! Bandwidth throttle simulator.
//!
//! Simulates constrained networks by clamping the engine's bandwidth
//! estimate, shrinking its buffer targets and forcing an immediate
//! quality demotion when the selected level no longer fits the cap.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::BufferProfiles;
use crate::media::level::{highest_level_within, lowest_bitrate_level};
use crate::media::{EngineAdapter, LevelSelection, QualityLevel};

/// Errors produced while resolving throttle profiles.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ThrottleError {
    #[error("Unknown throttle profile: {name}")]
    InvalidProfile { name: String },
}

/// Named network profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProfileName {
    Unlimited,
    Slow3g,
    Fast3g,
    FourG,
    Wifi,
    Custom,
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProfileName::Unlimited => "unlimited",
            ProfileName::Slow3g => "slow3g",
            ProfileName::Fast3g => "fast3g",
            ProfileName::FourG => "fourG",
            ProfileName::Wifi => "wifi",
            ProfileName::Custom => "custom",
        };
        write!(f, "{name}")
    }
}

/// Simulated network profile. A cap of 0 means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleProfile {
    pub name: ProfileName,
    pub download_bps_cap: u64,
    pub simulated_latency_ms: u64,
}

impl Default for ThrottleProfile {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl ThrottleProfile {
    pub const fn unlimited() -> Self {
        Self {
            name: ProfileName::Unlimited,
            download_bps_cap: 0,
            simulated_latency_ms: 0,
        }
    }

    pub const fn slow_3g() -> Self {
        Self {
            name: ProfileName::Slow3g,
            download_bps_cap: 400_000,
            simulated_latency_ms: 400,
        }
    }

    pub const fn fast_3g() -> Self {
        Self {
            name: ProfileName::Fast3g,
            download_bps_cap: 1_600_000,
            simulated_latency_ms: 150,
        }
    }

    pub const fn four_g() -> Self {
        Self {
            name: ProfileName::FourG,
            download_bps_cap: 9_000_000,
            simulated_latency_ms: 60,
        }
    }

    pub const fn wifi() -> Self {
        Self {
            name: ProfileName::Wifi,
            download_bps_cap: 30_000_000,
            simulated_latency_ms: 10,
        }
    }

    pub const fn custom(download_bps_cap: u64, simulated_latency_ms: u64) -> Self {
        Self {
            name: ProfileName::Custom,
            download_bps_cap,
            simulated_latency_ms,
        }
    }

    /// All named presets, slowest capped profile first after `unlimited`.
    pub fn presets() -> Vec<ThrottleProfile> {
        vec![
            Self::unlimited(),
            Self::slow_3g(),
            Self::fast_3g(),
            Self::four_g(),
            Self::wifi(),
        ]
    }

    pub fn is_unlimited(&self) -> bool {
        self.download_bps_cap == 0
    }

    /// Cap in whole kilobits per second.
    pub fn cap_kbps(&self) -> u64 {
        self.download_bps_cap / 1000
    }
}

impl FromStr for ThrottleProfile {
    type Err = ThrottleError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "unlimited" | "none" => Ok(Self::unlimited()),
            "slow3g" | "slow" => Ok(Self::slow_3g()),
            "fast3g" | "fast" => Ok(Self::fast_3g()),
            "4g" | "fourg" => Ok(Self::four_g()),
            "wifi" => Ok(Self::wifi()),
            "2g" => Ok(Self::custom(250_000, 800)),
            _ => Err(ThrottleError::InvalidProfile {
                name: name.to_string(),
            }),
        }
    }
}

/// Picks the level a cap forces playback onto, if a switch is needed.
///
/// Returns `None` when the current level already fits, or when no levels
/// are known. With no concrete current level, any known ladder is treated
/// as exceeding the cap so playback starts within it.
pub fn select_capped_level(
    levels: &[QualityLevel],
    current: Option<&QualityLevel>,
    cap_bps: u64,
) -> Option<QualityLevel> {
    if cap_bps == 0 || levels.is_empty() {
        return None;
    }
    if let Some(current) = current
        && current.bitrate_bps <= cap_bps
    {
        return None;
    }

    let target = highest_level_within(levels, cap_bps).or_else(|| lowest_bitrate_level(levels))?;
    match current {
        Some(current) if current.index == target.index => None,
        _ => Some(target.clone()),
    }
}

/// What applying a profile changed on the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThrottleOutcome {
    /// Level playback was forced onto
    pub demoted_to: Option<QualityLevel>,
    /// Level selection was handed back to the engine's heuristic
    pub restored_auto: bool,
}

/// Per-session throttle state: the active profile and whether it pinned a level.
#[derive(Debug, Clone, Default)]
pub struct ThrottleSimulator {
    active: ThrottleProfile,
    pinned: bool,
}

impl ThrottleSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> ThrottleProfile {
        self.active
    }

    /// Whether the active throttle forced a fixed level.
    pub fn has_pinned_level(&self) -> bool {
        self.pinned
    }

    /// Applies `profile`, fully replacing the previous one.
    pub fn apply(
        &mut self,
        adapter: &mut EngineAdapter,
        profile: ThrottleProfile,
        buffers: &BufferProfiles,
    ) -> ThrottleOutcome {
        let mut outcome = ThrottleOutcome::default();
        self.active = profile;

        if profile.is_unlimited() {
            adapter.set_buffer_config(buffers.default);
            adapter.set_bandwidth_override(None);
            if self.pinned {
                adapter.set_level_selection(LevelSelection::Auto);
                self.pinned = false;
                outcome.restored_auto = true;
            }
            tracing::debug!("Throttle removed");
            return outcome;
        }

        adapter.set_bandwidth_override(Some(profile.download_bps_cap));
        adapter.set_buffer_config(buffers.throttled);

        // A pin from an earlier profile is released so the engine chooses
        // again under the new ceiling before re-evaluation.
        if self.pinned {
            adapter.set_level_selection(LevelSelection::Auto);
            self.pinned = false;
        }

        outcome.demoted_to = self.reevaluate(adapter);
        tracing::debug!(
            "Throttle {} applied with cap {} bps",
            profile.name,
            profile.download_bps_cap
        );
        outcome
    }

    /// Re-checks the selected level against the active cap.
    ///
    /// Called after applying a profile and again once the manifest's
    /// levels are known. Returns the level playback was demoted to.
    pub fn reevaluate(&mut self, adapter: &mut EngineAdapter) -> Option<QualityLevel> {
        if self.active.is_unlimited() {
            return None;
        }
        let levels = adapter.levels();
        let current = adapter.current_level();
        let target = select_capped_level(&levels, current.as_ref(), self.active.download_bps_cap)?;

        adapter.set_level_selection(LevelSelection::Fixed(target.index));
        self.pinned = true;
        Some(target)
    }

    /// Forgets the active profile without touching the engine.
    pub fn reset(&mut self) {
        self.active = ThrottleProfile::unlimited();
        self.pinned = false;
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::media::LevelInfo;
    use crate::media::level::normalize_levels;
    use crate::media::test_mocks::{MockEngine, MockEngineProbe, sample_levels};

    fn adapter_with(levels: Vec<LevelInfo>) -> (EngineAdapter, MockEngineProbe) {
        let (engine, probe) = MockEngine::new(levels);
        (EngineAdapter::new(Box::new(engine)), probe)
    }

    #[test]
    fn test_profile_names_resolve() {
        assert_eq!("slow".parse::<ThrottleProfile>().unwrap(), ThrottleProfile::slow_3g());
        assert_eq!("FAST3G".parse::<ThrottleProfile>().unwrap(), ThrottleProfile::fast_3g());
        assert_eq!("none".parse::<ThrottleProfile>().unwrap(), ThrottleProfile::unlimited());
        assert_eq!("4g".parse::<ThrottleProfile>().unwrap().download_bps_cap, 9_000_000);

        let two_g = "2g".parse::<ThrottleProfile>().unwrap();
        assert_eq!(two_g.name, ProfileName::Custom);
        assert_eq!(two_g.download_bps_cap, 250_000);

        assert_eq!(
            "dialup".parse::<ThrottleProfile>(),
            Err(ThrottleError::InvalidProfile {
                name: "dialup".to_string()
            })
        );
    }

    #[test]
    fn test_cap_demotes_to_highest_fitting_level() {
        let (mut adapter, probe) = adapter_with(sample_levels());
        probe.force_current_level(Some(2));
        let mut throttle = ThrottleSimulator::new();

        let outcome = throttle.apply(
            &mut adapter,
            ThrottleProfile::custom(1_000_000, 0),
            &BufferProfiles::default(),
        );

        let demoted = outcome.demoted_to.unwrap();
        assert_eq!(demoted.bitrate_bps, 400_000);
        assert_eq!(probe.current_level(), Some(0));
        assert_eq!(probe.selection(), LevelSelection::Fixed(0));
        assert_eq!(probe.ceiling(), Some(1_000_000));
        assert_eq!(probe.buffer_config(), Some(BufferProfiles::default().throttled));
        assert!(throttle.has_pinned_level());
    }

    #[test]
    fn test_unlimited_changes_nothing_without_pin() {
        let (mut adapter, probe) = adapter_with(sample_levels());
        probe.force_current_level(Some(2));
        let mut throttle = ThrottleSimulator::new();

        let outcome = throttle.apply(
            &mut adapter,
            ThrottleProfile::unlimited(),
            &BufferProfiles::default(),
        );

        assert_eq!(outcome, ThrottleOutcome::default());
        assert_eq!(probe.current_level(), Some(2));
        assert_eq!(probe.selection(), LevelSelection::Auto);
        assert_eq!(probe.buffer_config(), Some(BufferProfiles::default().default));
    }

    #[test]
    fn test_unlimited_after_throttle_restores_native_choice() {
        let (mut adapter, probe) = adapter_with(sample_levels());
        adapter.set_level_selection(LevelSelection::Auto);
        let native = probe.current_level();
        assert_eq!(native, Some(2));

        let mut throttle = ThrottleSimulator::new();
        let buffers = BufferProfiles::default();
        throttle.apply(&mut adapter, ThrottleProfile::slow_3g(), &buffers);
        assert_eq!(probe.current_level(), Some(0));

        let outcome = throttle.apply(&mut adapter, ThrottleProfile::unlimited(), &buffers);
        assert!(outcome.restored_auto);
        assert_eq!(probe.current_level(), native);
        assert_eq!(adapter.bandwidth_override(), None);
    }

    #[test]
    fn test_nothing_fits_picks_lowest_bitrate() {
        let levels = normalize_levels(&sample_levels());
        let target = select_capped_level(&levels, levels.get(1), 100_000).unwrap();
        assert_eq!(target.index, 0);

        // Already on the lowest level: no switch.
        assert!(select_capped_level(&levels, levels.first(), 100_000).is_none());
    }

    #[test]
    fn test_throttle_before_levels_is_deferred() {
        let (mut adapter, probe) = adapter_with(Vec::new());
        let mut throttle = ThrottleSimulator::new();

        let outcome = throttle.apply(
            &mut adapter,
            ThrottleProfile::slow_3g(),
            &BufferProfiles::default(),
        );
        assert!(outcome.demoted_to.is_none());
        assert_eq!(probe.selection(), LevelSelection::Auto);
        assert_eq!(throttle.active(), ThrottleProfile::slow_3g());
    }

    fn ladder() -> impl Strategy<Value = Vec<LevelInfo>> {
        prop::collection::vec(100_000u64..10_000_000, 1..8).prop_map(|bitrates| {
            bitrates
                .into_iter()
                .map(|bitrate_bps| LevelInfo {
                    bitrate_bps,
                    width: 0,
                    height: 0,
                    codecs: None,
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_capped_selection_fits_or_is_lowest(
            levels in ladder(),
            cap in 1u64..12_000_000,
            start in 0usize..8,
        ) {
            let (mut adapter, probe) = adapter_with(levels.clone());
            probe.force_current_level(Some(start % levels.len()));
            let mut throttle = ThrottleSimulator::new();

            throttle.apply(&mut adapter, ThrottleProfile::custom(cap, 0), &BufferProfiles::default());

            let selected = adapter.current_level().unwrap();
            let lowest = levels.iter().map(|l| l.bitrate_bps).min().unwrap();
            prop_assert!(selected.bitrate_bps <= cap || selected.bitrate_bps == lowest);
        }
    }
}
