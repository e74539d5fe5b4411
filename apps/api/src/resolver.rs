//! Entity Resolver — maps free-text (university, major) queries onto
//! canonical KB records, tolerating spelling and phrasing variation.
//!
//! Pair resolution is exact-match first, then two-stage fuzzy: the
//! university is matched against all distinct university names, and the
//! major only against majors *within* the matched university. The narrowing
//! avoids false positives where a generic major name matches the wrong
//! university, and bounds the second-stage search space.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::kb::ProgramRecord;

/// Weighted-ratio string similarity on a 0–100 scale.
///
/// Takes the best of an indel ratio (2·LCS / total length, the shape of
/// rapidfuzz's `ratio`), normalized Levenshtein, the token-sorted indel
/// ratio, and a 0.9-scaled best-window ratio, over lowercased
/// punctuation-stripped strings. The window term lets a bare major name
/// ("Informatika") score highly against its fully-qualified form. No
/// prefix-boosted term (e.g. Jaro-Winkler): nearly every university name
/// shares the "Universitas" prefix, which would pull two different
/// universities over the acceptance threshold.
pub fn weighted_ratio(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 100.0;
    }

    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    let full = indel_ratio(&a_chars, &b_chars);
    let lev = strsim::normalized_levenshtein(&a, &b);
    let ts = {
        let sa: Vec<char> = token_sort(&a).chars().collect();
        let sb: Vec<char> = token_sort(&b).chars().collect();
        indel_ratio(&sa, &sb)
    };
    let partial = 0.9 * partial_ratio(&a_chars, &b_chars);

    100.0 * full.max(lev).max(ts).max(partial)
}

/// Lowercase, strip punctuation, collapse whitespace.
fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_space = true;
    for c in s.to_lowercase().chars() {
        if c.is_alphanumeric() {
            out.push(c);
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim_end().to_string()
}

fn token_sort(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Length of the longest common subsequence. Two-row DP; inputs are short
/// names, never documents.
fn lcs_length(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Insert/delete similarity in [0, 1]: 2·LCS / (|a| + |b|).
fn indel_ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 0.0;
    }
    (2 * lcs_length(a, b)) as f64 / total as f64
}

/// Best indel score of the shorter string against any equal-length window
/// of the longer one.
fn partial_ratio(a: &[char], b: &[char]) -> f64 {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return 0.0;
    }

    let mut best = 0.0_f64;
    for start in 0..=(long.len() - short.len()) {
        let score = indel_ratio(short, &long[start..start + short.len()]);
        if score > best {
            best = score;
            if best >= 1.0 {
                break;
            }
        }
    }
    best
}

/// Highest-scoring candidate, accepted only at or above `threshold`.
/// Ties keep the earliest candidate in iteration order.
fn best_match<'a, I>(query: &str, candidates: I, threshold: f64) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&str, f64)> = None;
    for cand in candidates {
        let score = weighted_ratio(query, cand);
        if best.map_or(true, |(_, bs)| score > bs) {
            best = Some((cand, score));
        }
    }
    best.filter(|&(_, score)| score >= threshold).map(|(c, _)| c)
}

/// Distinct names preserving first-seen casing and order.
fn distinct<'a, I>(names: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for name in names {
        if seen.insert(name.to_lowercase()) {
            out.push(name);
        }
    }
    out
}

/// Resolves a free-text (university, major) pair to the single best record.
///
/// Exact case-insensitive equality on both fields wins outright and can
/// never be overridden by a fuzzy candidate. Otherwise both fuzzy stages
/// must clear `threshold` (0–100) or resolution fails — callers fall back
/// to major-only matching.
pub fn resolve_pair<'a>(
    records: &[&'a ProgramRecord],
    university: &str,
    major: &str,
    threshold: f64,
) -> Option<&'a ProgramRecord> {
    if university.trim().is_empty() || major.trim().is_empty() {
        return None;
    }

    let uni_query = university.to_lowercase();
    let major_query = major.to_lowercase();

    if let Some(exact) = records
        .iter()
        .find(|r| r.university.to_lowercase() == uni_query && r.major.to_lowercase() == major_query)
        .copied()
    {
        return Some(exact);
    }

    let universities = distinct(records.iter().map(|r| r.university.as_str()));
    let matched_uni = best_match(university, universities, threshold)?;
    let matched_uni_lower = matched_uni.to_lowercase();

    let majors = distinct(
        records
            .iter()
            .filter(|r| r.university.to_lowercase() == matched_uni_lower)
            .map(|r| r.major.as_str()),
    );
    let matched_major = best_match(major, majors, threshold)?;
    let matched_major_lower = matched_major.to_lowercase();

    records
        .iter()
        .find(|r| {
            r.university.to_lowercase() == matched_uni_lower
                && r.major.to_lowercase() == matched_major_lower
        })
        .copied()
}

/// Batch major-only matching for preferred-set semantics: each query is
/// fuzzed against the distinct major names in the pool, and the keys of
/// every record whose major cleared `threshold` are collected. At most
/// `limit` candidate names are considered per query, best-first.
pub fn matching_major_keys(
    pool: &[&ProgramRecord],
    queries: &[String],
    threshold: f64,
    limit: usize,
) -> BTreeSet<String> {
    let majors = distinct(pool.iter().map(|r| r.major.as_str()));
    let mut keep = BTreeSet::new();

    for query in queries {
        let mut scored: Vec<(&str, f64)> = majors
            .iter()
            .map(|name| (*name, weighted_ratio(query, name)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        for (name, score) in scored.into_iter().take(limit) {
            if score < threshold {
                break; // sorted descending, nothing below can pass
            }
            let name_lower = name.to_lowercase();
            for record in pool {
                if record.major.to_lowercase() == name_lower {
                    keep.insert(record.key.clone());
                }
            }
        }
    }
    keep
}
