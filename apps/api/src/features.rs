//! Feature Normalizer — derives the fixed feature set from raw student input.

use serde::{Deserialize, Serialize};

use crate::kb::CompetitivenessLabel;

/// Program track. Determines which core subjects feed `core_avg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    Saintek,
    Soshum,
}

impl Track {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "saintek" => Some(Track::Saintek),
            "soshum" => Some(Track::Soshum),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AchievementTier {
    #[default]
    None,
    School,
    Prov,
    National,
}

impl AchievementTier {
    pub fn bonus(self) -> i32 {
        match self {
            AchievementTier::None => 0,
            AchievementTier::School => 1,
            AchievementTier::Prov => 3,
            AchievementTier::National => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccreditationTier {
    A,
    #[default]
    B,
    C,
}

impl AccreditationTier {
    pub fn adjustment(self) -> i32 {
        match self {
            AccreditationTier::A => 1,
            AccreditationTier::B => 0,
            AccreditationTier::C => -1,
        }
    }
}

/// Raw per-subject scores. Any subject may be missing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SubjectScores {
    #[serde(default)]
    pub math: Option<f64>,
    #[serde(default)]
    pub language: Option<f64>,
    #[serde(default)]
    pub physics: Option<f64>,
    #[serde(default)]
    pub chemistry: Option<f64>,
    #[serde(default)]
    pub biology: Option<f64>,
    #[serde(default)]
    pub economics: Option<f64>,
    #[serde(default)]
    pub geography: Option<f64>,
    #[serde(default)]
    pub history: Option<f64>,
}

impl SubjectScores {
    /// Track-specific core subjects, in a fixed order.
    fn core_for(&self, track: Track) -> [Option<f64>; 5] {
        match track {
            Track::Saintek => [
                self.math,
                self.language,
                self.physics,
                self.chemistry,
                self.biology,
            ],
            Track::Soshum => [
                self.math,
                self.language,
                self.economics,
                self.geography,
                self.history,
            ],
        }
    }
}

/// Arithmetic mean of the present values. None when all are absent.
pub fn average(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<f64>() / present.len() as f64)
}

/// Normalized student features. Constructed once per request, immutable after.
#[derive(Debug, Clone, Serialize)]
pub struct StudentFeatures {
    pub track: Track,
    pub rapor_avg: f64,
    pub core_avg: f64,
    /// 0–100; 100 means unknown/worst.
    pub rank_percentile: u8,
    pub achievement: AchievementTier,
    pub accreditation: AccreditationTier,
    /// Request-level fallback, used only when the record carries no
    /// competitiveness of its own.
    pub competitiveness: Option<CompetitivenessLabel>,
}

impl StudentFeatures {
    /// Diminishing marginal value of class rank: 3 at top-10%, 2 at top-20%,
    /// 1 at top-40%, else 0.
    pub fn rank_bonus(&self) -> i32 {
        match self.rank_percentile {
            0..=10 => 3,
            11..=20 => 2,
            21..=40 => 1,
            _ => 0,
        }
    }
}

/// Pure transformation from raw inputs to normalized features.
///
/// `rapor_avg` averages the five general-subject scores, ignoring absent
/// values and defaulting to 0.0 when all are absent. `core_avg` averages the
/// track-specific core subjects and falls back to `rapor_avg` when none are
/// present.
#[allow(clippy::too_many_arguments)]
pub fn normalize(
    track: Track,
    general: &[Option<f64>; 5],
    subjects: &SubjectScores,
    rank_percentile: Option<u8>,
    achievement: Option<AchievementTier>,
    accreditation: Option<AccreditationTier>,
    competitiveness: Option<CompetitivenessLabel>,
) -> StudentFeatures {
    let rapor_avg = average(general).unwrap_or(0.0);
    let core_avg = average(&subjects.core_for(track)).unwrap_or(rapor_avg);

    StudentFeatures {
        track,
        rapor_avg,
        core_avg,
        rank_percentile: rank_percentile.unwrap_or(100).min(100),
        achievement: achievement.unwrap_or_default(),
        accreditation: accreditation.unwrap_or_default(),
        competitiveness,
    }
}
