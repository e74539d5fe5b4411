use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::features::{
    self, AccreditationTier, AchievementTier, StudentFeatures, SubjectScores, Track,
};
use crate::kb::{self, CompetitivenessLabel, ProgramRecord};
use crate::ranking::{self, RankParams, Recommendation};
use crate::resolver;
use crate::scoring::{decision_label, ScoreComponents};
use crate::state::AppState;
use crate::tips;

/// Scoring request payload. Accepts both the current shape (parallel
/// `target_universities` / `target_majors` lists) and the legacy fields
/// (`target_university_1`/`target_major_1`, single `target_major`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictRequest {
    pub program: String,
    #[serde(default)]
    pub s1: Option<f64>,
    #[serde(default)]
    pub s2: Option<f64>,
    #[serde(default)]
    pub s3: Option<f64>,
    #[serde(default)]
    pub s4: Option<f64>,
    #[serde(default)]
    pub s5: Option<f64>,
    #[serde(flatten)]
    pub subjects: SubjectScores,
    #[serde(default)]
    pub rank_percentile: Option<u8>,
    #[serde(default)]
    pub achievement: Option<AchievementTier>,
    #[serde(default)]
    pub accreditation: Option<AccreditationTier>,
    #[serde(default)]
    pub competitiveness: Option<CompetitivenessLabel>,
    #[serde(default)]
    pub target_university: Option<String>,
    #[serde(default)]
    pub target_major: Option<String>,
    #[serde(default)]
    pub target_universities: Vec<String>,
    #[serde(default)]
    pub target_majors: Vec<String>,
    #[serde(default)]
    pub target_university_1: Option<String>,
    #[serde(default)]
    pub target_major_1: Option<String>,
}

impl PredictRequest {
    /// Folds the legacy payload shapes into the canonical fields.
    /// Priority: `target_university_1` + `target_major_1`, then the first
    /// entry of `target_majors`. `target_universities` is never folded into
    /// the singular field: without a matching major it cannot form a pair,
    /// so predict falls back to major-only scoring.
    pub fn canonicalize(&mut self) {
        self.target_universities = take_trimmed(&mut self.target_universities);
        self.target_majors = take_trimmed(&mut self.target_majors);

        if let (Some(u), Some(m)) = (&self.target_university_1, &self.target_major_1) {
            if !u.trim().is_empty() && !m.trim().is_empty() {
                self.target_university = Some(u.trim().to_string());
                self.target_major = Some(m.trim().to_string());
                return;
            }
        }
        if self.target_major.is_none() {
            self.target_major = self.target_majors.first().cloned();
        }
    }

    /// Validates the track and normalizes all academic inputs.
    pub fn features(&self) -> Result<StudentFeatures, AppError> {
        let track = Track::parse(&self.program).ok_or_else(|| {
            AppError::Validation(format!(
                "program must be 'saintek' or 'soshum', got '{}'",
                self.program
            ))
        })?;
        Ok(features::normalize(
            track,
            &[self.s1, self.s2, self.s3, self.s4, self.s5],
            &self.subjects,
            self.rank_percentile,
            self.achievement,
            self.accreditation,
            self.competitiveness,
        ))
    }
}

fn take_trimmed(values: &mut Vec<String>) -> Vec<String> {
    std::mem::take(values)
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Debug, Serialize)]
pub struct PredictDetails {
    #[serde(flatten)]
    pub features: StudentFeatures,
    pub target_university: Option<String>,
    pub target_major: Option<String>,
    /// "University - Major" of the resolved KB record, when one matched.
    pub matched_university_major: Option<String>,
    pub probability_raw: Option<f64>,
    pub program_match: Option<String>,
    pub components: Option<ScoreComponents>,
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub probability: f64,
    pub label: &'static str,
    pub details: PredictDetails,
    pub tips: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub scorer_backend: &'static str,
    pub degraded: bool,
}

/// POST /api/predict
/// Single-target admission probability through the configured scorer
/// backend. Resolver misses are not errors: scoring proceeds against the
/// major text or "Unknown".
pub async fn handle_predict(
    State(state): State<AppState>,
    Json(mut req): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, AppError> {
    req.canonicalize();
    let features = req.features()?;

    let kb = state.kb.snapshot();
    let records: Vec<&ProgramRecord> = kb.records().collect();

    let matched = match (req.target_university.as_deref(), req.target_major.as_deref()) {
        (Some(u), Some(m)) => {
            resolver::resolve_pair(&records, u, m, state.config.pair_match_threshold)
        }
        _ => None,
    };
    let matched_label = matched.map(|r| format!("{} - {}", r.university, r.major));
    let program_label = matched_label
        .clone()
        .or_else(|| req.target_major.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    let outcome = state.scorer.score(&features, matched, &program_label).await?;
    let tips = tips::recommendations(outcome.probability, &features, matched);

    Ok(Json(PredictResponse {
        probability: outcome.probability,
        label: decision_label(outcome.probability),
        details: PredictDetails {
            features,
            target_university: req.target_university.clone(),
            target_major: req.target_major.clone(),
            matched_university_major: matched_label,
            probability_raw: outcome.probability_raw,
            program_match: outcome.program_match,
            components: outcome.components,
            tags: outcome.tags,
        },
        tips,
        weights: outcome.weights,
        explanation: outcome.explanation,
        scorer_backend: outcome.backend,
        degraded: outcome.degraded,
    }))
}

fn default_pref_n() -> usize {
    10
}
fn default_alt_n() -> usize {
    10
}
fn default_per_uni() -> usize {
    2
}

#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    #[serde(default = "default_pref_n")]
    pub pref_n: usize,
    #[serde(default = "default_alt_n")]
    pub alt_n: usize,
    #[serde(default = "default_per_uni")]
    pub per_uni: usize,
}

impl Default for RecommendQuery {
    fn default() -> Self {
        Self {
            pref_n: default_pref_n(),
            alt_n: default_alt_n(),
            per_uni: default_per_uni(),
        }
    }
}

/// POST /api/recommend
/// Scores the whole candidate pool with the local heuristic, surfaces the
/// explicitly requested programs as the preferred set, and diversifies both
/// lists under the per-university cap.
pub async fn handle_recommend(
    State(state): State<AppState>,
    Query(params): Query<RecommendQuery>,
    Json(mut req): Json<PredictRequest>,
) -> Result<Json<Recommendation>, AppError> {
    req.canonicalize();
    let features = req.features()?;

    let kb = state.kb.snapshot();
    if kb.is_empty() {
        return Err(AppError::KbUnavailable(
            "Knowledge base not found or empty. Build the KB first.".to_string(),
        ));
    }

    // Coarse pool filter by track guess; unknown majors stay in.
    let pool: Vec<&ProgramRecord> = kb
        .records()
        .filter(|r| kb::guess_track(&r.major).map_or(true, |t| t == features.track))
        .collect();

    // Preferred set: positional (university, major) pairs first.
    let mut preferred_keys = std::collections::BTreeSet::new();
    for (university, major) in req
        .target_universities
        .iter()
        .zip(req.target_majors.iter())
    {
        if let Some(record) =
            resolver::resolve_pair(&pool, university, major, state.config.pair_match_threshold)
        {
            preferred_keys.insert(record.key.clone());
        }
    }

    // Fallback to major-only matching when no pair resolved.
    if preferred_keys.is_empty() && !req.target_majors.is_empty() {
        preferred_keys = resolver::matching_major_keys(
            &pool,
            &req.target_majors,
            state.config.major_match_threshold,
            state.config.major_match_limit,
        );
    }

    let rank_params = RankParams {
        pref_n: params.pref_n,
        alt_n: params.alt_n,
        per_uni: params.per_uni,
    };
    Ok(Json(ranking::rank(
        &pool,
        &preferred_keys,
        &features,
        rank_params,
    )))
}
