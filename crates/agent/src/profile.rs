//! Model profiles.
//!
//! Smaller models lose track of long transcripts sooner and need a few more
//! turns of slack before they are judged stuck, so each profile carries its
//! own trim bands and stuck thresholds.

use asklab_config::ProfileSetting;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelProfile {
    Standard,
    Constrained,
}

impl ModelProfile {
    /// Resolve the profile for a model name, honoring an explicit setting.
    pub fn detect(model: &str, setting: ProfileSetting) -> Self {
        match setting {
            ProfileSetting::Standard => Self::Standard,
            ProfileSetting::Constrained => Self::Constrained,
            ProfileSetting::Auto if model.to_lowercase().contains("llama") => Self::Constrained,
            ProfileSetting::Auto => Self::Standard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Constrained => "constrained",
        }
    }

    pub fn is_constrained(&self) -> bool {
        matches!(self, Self::Constrained)
    }

    pub fn stuck_thresholds(&self) -> StuckThresholds {
        match self {
            Self::Standard => StuckThresholds::default(),
            Self::Constrained => StuckThresholds {
                repeated_planning: 4,
                no_progress: 4,
                high_water_mark: 8,
                ..StuckThresholds::default()
            },
        }
    }

    pub fn trim_bands(&self) -> TrimBands {
        match self {
            Self::Standard => TrimBands::default(),
            Self::Constrained => TrimBands {
                light: 5,
                moderate: 7,
                aggressive: 10,
                emergency: 14,
            },
        }
    }
}

/// Limits the stuck detector compares loop state against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StuckThresholds {
    /// Consecutive turns without a tool call
    pub repeated_planning: u32,
    /// Checks in a row with no new tool results
    pub no_progress: u32,
    /// First iteration at which progress is tracked
    pub no_progress_min_iteration: u32,
    /// Iteration after which enough research forces an answer
    pub high_water_mark: u32,
    /// Tool results that count as enough research
    pub min_research_results: usize,
}

impl Default for StuckThresholds {
    fn default() -> Self {
        Self {
            repeated_planning: 3,
            no_progress: 5,
            no_progress_min_iteration: 6,
            high_water_mark: 12,
            min_research_results: 4,
        }
    }
}

/// First iteration of each trim level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimBands {
    pub light: u32,
    pub moderate: u32,
    pub aggressive: u32,
    pub emergency: u32,
}

impl Default for TrimBands {
    fn default() -> Self {
        Self {
            light: 7,
            moderate: 9,
            aggressive: 13,
            emergency: 18,
        }
    }
}
