//! Ranker / Diversifier — sorts scored candidates, splits preferred from
//! alternatives, and caps results per university.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::features::StudentFeatures;
use crate::kb::ProgramRecord;
use crate::scoring::{bucket_from_prob, decision_label, score_components, Bucket, ScoreComponents};

/// One scored candidate, ready for serialization.
#[derive(Debug, Clone, Serialize)]
pub struct RankedItem {
    pub key: String,
    pub university: String,
    pub major: String,
    pub level: Option<String>,
    pub sheet: Option<String>,
    pub ci: Option<f64>,
    pub competitiveness: Option<&'static str>,
    pub probability: f64,
    pub bucket: Bucket,
    pub tags: Vec<String>,
    pub components: ScoreComponents,
    pub label: &'static str,
}

impl RankedItem {
    pub fn build(features: &StudentFeatures, record: &ProgramRecord) -> Self {
        let (probability, components, tags) = score_components(features, Some(record));
        RankedItem {
            key: record.key.clone(),
            university: record.university.clone(),
            major: record.major.clone(),
            level: record.level.clone(),
            sheet: record.sheet.clone(),
            ci: record.ci(),
            competitiveness: record.competitiveness(),
            probability,
            bucket: bucket_from_prob(probability),
            tags,
            components,
            label: decision_label(probability),
        }
    }
}

/// Result-size limits for one recommendation request.
#[derive(Debug, Clone, Copy)]
pub struct RankParams {
    pub pref_n: usize,
    pub alt_n: usize,
    pub per_uni: usize,
}

impl Default for RankParams {
    fn default() -> Self {
        Self {
            pref_n: 10,
            alt_n: 10,
            per_uni: 2,
        }
    }
}

/// Response shape of the recommendation engine.
#[derive(Debug, Serialize)]
pub struct Recommendation {
    pub preferred: Vec<RankedItem>,
    pub alternatives: Vec<RankedItem>,
    pub total_considered: usize,
}

/// Probability descending; record key ascending breaks ties so the order is
/// deterministic across KB reloads.
fn sort_by_probability(items: &mut [RankedItem]) {
    items.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });
}

/// Keeps at most `per_uni` items per university, preserving the incoming
/// (sorted) order. With the input sorted by probability, each university
/// keeps its top-`per_uni` entries and the global ordering survives.
fn top_per_university(items: Vec<RankedItem>, per_uni: usize) -> Vec<RankedItem> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    items
        .into_iter()
        .filter(|item| {
            let seen = counts.entry(item.university.to_lowercase()).or_insert(0);
            *seen += 1;
            *seen <= per_uni
        })
        .collect()
}

/// Full ranking pass: score the pool, partition by the preferred key set,
/// sort both partitions, diversify, truncate.
pub fn rank(
    pool: &[&ProgramRecord],
    preferred_keys: &BTreeSet<String>,
    features: &StudentFeatures,
    params: RankParams,
) -> Recommendation {
    let mut preferred = Vec::new();
    let mut alternatives = Vec::new();

    for record in pool {
        let item = RankedItem::build(features, record);
        if preferred_keys.contains(&record.key) {
            preferred.push(item);
        } else {
            alternatives.push(item);
        }
    }

    sort_by_probability(&mut preferred);
    sort_by_probability(&mut alternatives);

    let mut preferred = top_per_university(preferred, params.per_uni);
    let mut alternatives = top_per_university(alternatives, params.per_uni);

    preferred.truncate(params.pref_n);
    alternatives.truncate(params.alt_n);

    Recommendation {
        preferred,
        alternatives,
        total_considered: pool.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{AccreditationTier, AchievementTier, Track};
    use crate::kb::KnowledgeBase;

    fn features() -> StudentFeatures {
        StudentFeatures {
            track: Track::Saintek,
            rapor_avg: 80.0,
            core_avg: 80.0,
            rank_percentile: 15,
            achievement: AchievementTier::School,
            accreditation: AccreditationTier::A,
            competitiveness: None,
        }
    }

    fn kb_with_many_programs() -> KnowledgeBase {
        // Three universities, three programs each, mixed competitiveness.
        let mut records = String::from("{");
        let unis = [
            ("uni-a", "Universitas A"),
            ("uni-b", "Universitas B"),
            ("uni-c", "Universitas C"),
        ];
        let majors = [
            ("informatika", "Teknik Informatika", "very"),
            ("statistika", "Statistika", "mid"),
            ("farmasi", "Farmasi", "low"),
        ];
        let mut first = true;
        for (uk, un) in unis {
            for (mk, mn, comp) in majors {
                if !first {
                    records.push(',');
                }
                first = false;
                records.push_str(&format!(
                    r#""{uk}-{mk}": {{"university": "{un}", "major": "{mn}", "competitiveness": "{comp}"}}"#
                ));
            }
        }
        records.push('}');
        KnowledgeBase::from_json_str(&records).unwrap()
    }

    #[test]
    fn test_per_university_cap_holds() {
        let kb = kb_with_many_programs();
        let pool: Vec<_> = kb.records().collect();
        let rec = rank(&pool, &BTreeSet::new(), &features(), RankParams::default());

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for item in &rec.alternatives {
            *counts.entry(item.university.as_str()).or_insert(0) += 1;
        }
        assert!(counts.values().all(|&c| c <= 2), "cap violated: {counts:?}");
    }

    #[test]
    fn test_sorted_descending_with_key_tiebreak() {
        let kb = kb_with_many_programs();
        let pool: Vec<_> = kb.records().collect();
        let rec = rank(&pool, &BTreeSet::new(), &features(), RankParams::default());

        for pair in rec.alternatives.windows(2) {
            assert!(pair[0].probability >= pair[1].probability);
            if pair[0].probability == pair[1].probability {
                assert!(pair[0].key < pair[1].key);
            }
        }
    }

    #[test]
    fn test_preferred_partition_excludes_from_alternatives() {
        let kb = kb_with_many_programs();
        let pool: Vec<_> = kb.records().collect();
        let preferred_keys: BTreeSet<String> =
            ["uni-a-informatika".to_string(), "uni-b-farmasi".to_string()]
                .into_iter()
                .collect();
        let rec = rank(&pool, &preferred_keys, &features(), RankParams::default());

        assert_eq!(rec.preferred.len(), 2);
        for item in &rec.alternatives {
            assert!(!preferred_keys.contains(&item.key));
        }
        assert_eq!(rec.total_considered, 9);
    }

    #[test]
    fn test_truncation_limits_apply() {
        let kb = kb_with_many_programs();
        let pool: Vec<_> = kb.records().collect();
        let params = RankParams {
            pref_n: 10,
            alt_n: 3,
            per_uni: 2,
        };
        let rec = rank(&pool, &BTreeSet::new(), &features(), params);
        assert!(rec.alternatives.len() <= 3);
    }

    #[test]
    fn test_per_uni_one_keeps_best_per_university() {
        let kb = kb_with_many_programs();
        let pool: Vec<_> = kb.records().collect();
        let params = RankParams {
            pref_n: 10,
            alt_n: 10,
            per_uni: 1,
        };
        let rec = rank(&pool, &BTreeSet::new(), &features(), params);
        assert_eq!(rec.alternatives.len(), 3);
        // Farmasi is "low" competitiveness, so it is each university's best.
        assert!(rec.alternatives.iter().all(|i| i.major == "Farmasi"));
    }

    #[test]
    fn test_ranked_item_carries_record_fields() {
        let kb = kb_with_many_programs();
        let record = kb.get("uni-a-informatika").unwrap();
        let item = RankedItem::build(&features(), record);
        assert_eq!(item.university, "Universitas A");
        assert_eq!(item.major, "Teknik Informatika");
        assert_eq!(item.competitiveness, Some("very"));
        assert_eq!(item.bucket, bucket_from_prob(item.probability));
        assert_eq!(item.label, decision_label(item.probability));
    }
}
