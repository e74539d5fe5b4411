//! Scorer — converts student features and a program record into a
//! calibrated admission probability with an explainable breakdown.
//!
//! Default: `HeuristicScorer` (pure, deterministic, fully testable).
//! Optional: `RemoteScorer` (external scoring service with silent fallback).
//!
//! `AppState` holds an `Arc<dyn AdmissionScorer>`, swapped at startup via
//! config.

pub mod remote;

use async_trait::async_trait;
use serde::Serialize;

use crate::errors::AppError;
use crate::features::StudentFeatures;
use crate::kb::{ProgramRecord, Selectivity};

/// Sigmoid center: scores near the typical passing threshold map to ≈0.5.
const LOGISTIC_CENTER: f64 = 75.0;
/// Sigmoid slope: ~4 score points shift probability meaningfully.
const LOGISTIC_SLOPE: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bonuses {
    pub rank_bonus: i32,
    pub achievement_bonus: i32,
    pub accreditation_adj: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Penalties {
    pub competitiveness: i32,
}

/// Full score breakdown. `base` and `score` are rounded to 2 decimals for
/// display; the probability is always computed from the un-rounded score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreComponents {
    pub base: f64,
    pub bonuses: Bonuses,
    pub penalties: Penalties,
    pub score: f64,
}

/// Coarse admission-likelihood category derived from probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Safe,
    Target,
    Reach,
}

/// Deterministic step function of probability: ≥0.70 safe, ≥0.40 target,
/// else reach. Pure and stateless, applied per item at render time.
pub fn bucket_from_prob(p: f64) -> Bucket {
    if p >= 0.70 {
        Bucket::Safe
    } else if p >= 0.40 {
        Bucket::Target
    } else {
        Bucket::Reach
    }
}

/// Human decision label, aligned with the bucket thresholds.
pub fn decision_label(p: f64) -> &'static str {
    if p >= 0.70 {
        "High admission chance"
    } else if p >= 0.40 {
        "Moderate admission chance"
    } else {
        "Low admission chance"
    }
}

/// Competitiveness penalty for a (features, record) pair.
///
/// A continuous index wins: round(5 × ci). Otherwise the record's label,
/// then the request-level fallback, then "high" (= 3).
pub fn competitiveness_penalty(
    features: &StudentFeatures,
    record: Option<&ProgramRecord>,
) -> i32 {
    match record.and_then(|r| r.selectivity) {
        Some(Selectivity::Index(ci)) => (5.0 * ci).round() as i32,
        Some(Selectivity::Label(label)) => label.penalty(),
        None => features.competitiveness.map_or(3, |l| l.penalty()),
    }
}

/// Pure scoring function: (features, record) → (probability, components,
/// tags). Identical inputs always yield identical outputs; no side effects.
pub fn score_components(
    features: &StudentFeatures,
    record: Option<&ProgramRecord>,
) -> (f64, ScoreComponents, Vec<String>) {
    let rank_bonus = features.rank_bonus();
    let achievement_bonus = features.achievement.bonus();
    let accreditation_adj = features.accreditation.adjustment();
    let competitiveness = competitiveness_penalty(features, record);

    let base = 0.6 * features.rapor_avg + 0.4 * features.core_avg;
    let score = base
        + f64::from(rank_bonus + achievement_bonus + accreditation_adj - competitiveness);
    let probability = logistic(score);

    let mut tags = Vec::new();
    if features.rank_percentile <= 10 {
        tags.push("Top-10% rank".to_string());
    } else if features.rank_percentile <= 20 {
        tags.push("Top-20% rank".to_string());
    }
    if achievement_bonus >= 3 {
        tags.push("Strong achievements".to_string());
    }
    if accreditation_adj == 1 {
        tags.push("School A".to_string());
    }
    if competitiveness <= 1 {
        tags.push("Low competition".to_string());
    } else if competitiveness >= 5 {
        tags.push("Very competitive".to_string());
    }

    let components = ScoreComponents {
        base: round2(base),
        bonuses: Bonuses {
            rank_bonus,
            achievement_bonus,
            accreditation_adj,
        },
        penalties: Penalties { competitiveness },
        score: round2(score),
    };

    (probability, components, tags)
}

/// Logistic transform. Never reaches 0 or 1 exactly.
fn logistic(score: f64) -> f64 {
    1.0 / (1.0 + (-LOGISTIC_SLOPE * (score - LOGISTIC_CENTER)).exp())
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Outcome of a scoring call, independent of backend.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreOutcome {
    pub probability: f64,
    /// Uncalibrated probability, when the backend distinguishes one.
    pub probability_raw: Option<f64>,
    /// Program label the backend actually scored against.
    pub program_match: Option<String>,
    pub components: Option<ScoreComponents>,
    pub tags: Vec<String>,
    pub weights: Option<serde_json::Value>,
    pub explanation: Option<String>,
    pub backend: &'static str,
    /// True when a remote backend failed and the local heuristic answered.
    pub degraded: bool,
}

/// The admission scorer capability. Implement this to swap backends without
/// touching handler or caller code.
///
/// Carried in `AppState` as `Arc<dyn AdmissionScorer>`.
#[async_trait]
pub trait AdmissionScorer: Send + Sync {
    async fn score(
        &self,
        features: &StudentFeatures,
        record: Option<&ProgramRecord>,
        program_label: &str,
    ) -> Result<ScoreOutcome, AppError>;
}

/// Local heuristic backend wrapping the pure scoring function.
pub struct HeuristicScorer;

#[async_trait]
impl AdmissionScorer for HeuristicScorer {
    async fn score(
        &self,
        features: &StudentFeatures,
        record: Option<&ProgramRecord>,
        program_label: &str,
    ) -> Result<ScoreOutcome, AppError> {
        let (probability, components, tags) = score_components(features, record);
        Ok(ScoreOutcome {
            probability,
            probability_raw: None,
            program_match: Some(program_label.to_string()),
            components: Some(components),
            tags,
            weights: None,
            explanation: None,
            backend: "heuristic",
            degraded: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{AccreditationTier, AchievementTier, Track};
    use crate::kb::{CompetitivenessLabel, KnowledgeBase};

    fn features(
        rapor: f64,
        core: f64,
        rank: u8,
        achievement: AchievementTier,
        accreditation: AccreditationTier,
    ) -> StudentFeatures {
        StudentFeatures {
            track: Track::Saintek,
            rapor_avg: rapor,
            core_avg: core,
            rank_percentile: rank,
            achievement,
            accreditation,
            competitiveness: None,
        }
    }

    fn record_with(json: &str) -> ProgramRecord {
        KnowledgeBase::from_json_str(json)
            .unwrap()
            .records()
            .next()
            .unwrap()
            .clone()
    }

    fn low_competition_record() -> ProgramRecord {
        record_with(r#"{"k": {"university": "U", "major": "M", "competitiveness": "low"}}"#)
    }

    #[test]
    fn test_end_to_end_low_competition_example() {
        let f = features(85.0, 88.0, 5, AchievementTier::National, AccreditationTier::A);
        let record = low_competition_record();
        let (prob, comps, tags) = score_components(&f, Some(&record));

        assert_eq!(comps.bonuses.rank_bonus, 3);
        assert_eq!(comps.bonuses.achievement_bonus, 5);
        assert_eq!(comps.bonuses.accreditation_adj, 1);
        assert_eq!(comps.penalties.competitiveness, 0);
        assert!((comps.base - 86.2).abs() < 1e-9);
        assert!((comps.score - 95.2).abs() < 1e-9);
        assert!((prob - 0.9936).abs() < 1e-3, "prob was {prob}");
        assert_eq!(bucket_from_prob(prob), Bucket::Safe);
        assert!(tags.contains(&"Top-10% rank".to_string()));
        assert!(tags.contains(&"Strong achievements".to_string()));
        assert!(tags.contains(&"School A".to_string()));
        assert!(tags.contains(&"Low competition".to_string()));
    }

    #[test]
    fn test_end_to_end_very_competitive_example() {
        let f = features(85.0, 88.0, 5, AchievementTier::National, AccreditationTier::A);
        let record =
            record_with(r#"{"k": {"university": "U", "major": "M", "competitiveness": "very"}}"#);
        let (prob, comps, tags) = score_components(&f, Some(&record));

        assert_eq!(comps.penalties.competitiveness, 5);
        assert!((comps.score - 85.2).abs() < 1e-9);
        assert!((prob - 0.9276).abs() < 1e-3, "prob was {prob}");
        assert_eq!(bucket_from_prob(prob), Bucket::Safe);
        assert!(tags.contains(&"Very competitive".to_string()));
    }

    #[test]
    fn test_probability_strictly_between_zero_and_one() {
        for (rapor, core, rank) in [(0.0, 0.0, 100), (100.0, 100.0, 0), (50.0, 50.0, 50)] {
            let f = features(rapor, core, rank, AchievementTier::None, AccreditationTier::C);
            let (prob, _, _) = score_components(&f, None);
            assert!(prob > 0.0 && prob < 1.0, "prob was {prob}");
        }
    }

    #[test]
    fn test_monotonic_in_rapor_avg() {
        let record = low_competition_record();
        let mut last = 0.0;
        for rapor in [40.0, 60.0, 75.0, 90.0] {
            let f = features(rapor, 70.0, 50, AchievementTier::None, AccreditationTier::B);
            let (prob, _, _) = score_components(&f, Some(&record));
            assert!(prob >= last);
            last = prob;
        }
    }

    #[test]
    fn test_monotonic_in_rank() {
        let record = low_competition_record();
        let mut last = 0.0;
        for rank in [100, 40, 20, 10, 1] {
            let f = features(75.0, 75.0, rank, AchievementTier::None, AccreditationTier::B);
            let (prob, _, _) = score_components(&f, Some(&record));
            assert!(prob >= last, "rank {rank} decreased probability");
            last = prob;
        }
    }

    #[test]
    fn test_monotonic_in_achievement() {
        let record = low_competition_record();
        let mut last = 0.0;
        for tier in [
            AchievementTier::None,
            AchievementTier::School,
            AchievementTier::Prov,
            AchievementTier::National,
        ] {
            let f = features(75.0, 75.0, 50, tier, AccreditationTier::B);
            let (prob, _, _) = score_components(&f, Some(&record));
            assert!(prob >= last);
            last = prob;
        }
    }

    #[test]
    fn test_monotonic_in_accreditation() {
        let record = low_competition_record();
        let mut last = 0.0;
        for tier in [AccreditationTier::C, AccreditationTier::B, AccreditationTier::A] {
            let f = features(75.0, 75.0, 50, AchievementTier::None, tier);
            let (prob, _, _) = score_components(&f, Some(&record));
            assert!(prob >= last);
            last = prob;
        }
    }

    #[test]
    fn test_monotonic_in_competitiveness() {
        let f = features(75.0, 75.0, 50, AchievementTier::None, AccreditationTier::B);
        let mut last = 1.0;
        for label in ["low", "mid", "high", "very"] {
            let record = record_with(&format!(
                r#"{{"k": {{"university": "U", "major": "M", "competitiveness": "{label}"}}}}"#
            ));
            let (prob, _, _) = score_components(&f, Some(&record));
            assert!(prob <= last);
            last = prob;
        }
    }

    #[test]
    fn test_ci_penalty_rounds() {
        let f = features(75.0, 75.0, 50, AchievementTier::None, AccreditationTier::B);
        let record = record_with(r#"{"k": {"university": "U", "major": "M", "ci": 0.5}}"#);
        assert_eq!(competitiveness_penalty(&f, Some(&record)), 3); // round(2.5) = 3
        let record = record_with(r#"{"k": {"university": "U", "major": "M", "ci": 0.2}}"#);
        assert_eq!(competitiveness_penalty(&f, Some(&record)), 1);
    }

    #[test]
    fn test_penalty_defaults_to_high_without_record() {
        let f = features(75.0, 75.0, 50, AchievementTier::None, AccreditationTier::B);
        assert_eq!(competitiveness_penalty(&f, None), 3);
    }

    #[test]
    fn test_penalty_uses_request_fallback() {
        let mut f = features(75.0, 75.0, 50, AchievementTier::None, AccreditationTier::B);
        f.competitiveness = Some(CompetitivenessLabel::Low);
        assert_eq!(competitiveness_penalty(&f, None), 0);
        // A record with its own selectivity overrides the fallback.
        let record = low_competition_record();
        f.competitiveness = Some(CompetitivenessLabel::Very);
        assert_eq!(competitiveness_penalty(&f, Some(&record)), 0);
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(bucket_from_prob(0.70), Bucket::Safe);
        assert_eq!(bucket_from_prob(0.6999), Bucket::Target);
        assert_eq!(bucket_from_prob(0.40), Bucket::Target);
        assert_eq!(bucket_from_prob(0.3999), Bucket::Reach);
    }

    #[test]
    fn test_decision_label_aligns_with_buckets() {
        assert_eq!(decision_label(0.70), "High admission chance");
        assert_eq!(decision_label(0.40), "Moderate admission chance");
        assert_eq!(decision_label(0.39), "Low admission chance");
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let f = features(82.5, 79.0, 15, AchievementTier::Prov, AccreditationTier::A);
        let record = low_competition_record();
        let first = score_components(&f, Some(&record));
        let second = score_components(&f, Some(&record));
        assert_eq!(first.0.to_bits(), second.0.to_bits());
        assert_eq!(first.1, second.1);
        assert_eq!(first.2, second.2);
    }

    #[test]
    fn test_top_20_rank_tag() {
        let f = features(75.0, 75.0, 15, AchievementTier::None, AccreditationTier::B);
        let (_, _, tags) = score_components(&f, None);
        assert!(tags.contains(&"Top-20% rank".to_string()));
        assert!(!tags.contains(&"Top-10% rank".to_string()));
    }

    #[tokio::test]
    async fn test_heuristic_scorer_outcome() {
        let f = features(85.0, 88.0, 5, AchievementTier::National, AccreditationTier::A);
        let record = low_competition_record();
        let outcome = HeuristicScorer
            .score(&f, Some(&record), "U - M")
            .await
            .unwrap();
        assert_eq!(outcome.backend, "heuristic");
        assert!(!outcome.degraded);
        assert!(outcome.components.is_some());
        assert_eq!(outcome.program_match.as_deref(), Some("U - M"));
    }
}
