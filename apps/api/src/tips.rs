//! Tips — human-readable advice strings derived from the probability and
//! the same feature signals the scorer saw. Purely explanatory; nothing
//! here feeds back into the score.

use crate::features::{AchievementTier, StudentFeatures};
use crate::kb::ProgramRecord;
use crate::scoring::competitiveness_penalty;

pub fn recommendations(
    probability: f64,
    features: &StudentFeatures,
    record: Option<&ProgramRecord>,
) -> Vec<String> {
    let penalty = competitiveness_penalty(features, record);
    let mut tips = Vec::new();

    if probability < 0.40 {
        tips.push(
            "Admission odds are low for this pick. Add one or two less competitive backup programs."
                .to_string(),
        );
    } else if probability >= 0.70 {
        tips.push(
            "Strong position. Keep semester grades stable through the final report.".to_string(),
        );
    }

    if penalty >= 5 {
        tips.push(
            "This program is very selective. National-level achievements or a better class rank move the needle most."
                .to_string(),
        );
    }

    if features.rank_percentile > 40 {
        tips.push(
            "Class rank is outside the top 40%. Reaching the top 20% adds a meaningful bonus."
                .to_string(),
        );
    }

    if features.achievement == AchievementTier::None {
        tips.push(
            "No recorded achievements. Even a school-level award improves the profile.".to_string(),
        );
    }

    tips
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{AccreditationTier, Track};

    fn features(rank: u8, achievement: AchievementTier) -> StudentFeatures {
        StudentFeatures {
            track: Track::Soshum,
            rapor_avg: 75.0,
            core_avg: 75.0,
            rank_percentile: rank,
            achievement,
            accreditation: AccreditationTier::B,
            competitiveness: None,
        }
    }

    #[test]
    fn test_low_probability_suggests_backups() {
        let tips = recommendations(0.2, &features(50, AchievementTier::Prov), None);
        assert!(tips.iter().any(|t| t.contains("backup")));
    }

    #[test]
    fn test_high_probability_encourages_stability() {
        let tips = recommendations(0.9, &features(5, AchievementTier::National), None);
        assert!(tips.iter().any(|t| t.contains("Strong position")));
    }

    #[test]
    fn test_weak_profile_collects_multiple_tips() {
        let tips = recommendations(0.3, &features(90, AchievementTier::None), None);
        assert!(tips.len() >= 3);
    }
}
