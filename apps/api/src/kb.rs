//! Knowledge Base — the static catalog of university-major program records.
//!
//! Loaded once from a JSON file (`{key: {university, major, level, ...}}`),
//! resolved into strongly-typed records, and published as an immutable
//! snapshot. Hot reload swaps in a whole new snapshot atomically; in-flight
//! requests keep the one they started with.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::features::Track;

/// Categorical competitiveness of a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetitivenessLabel {
    Low,
    Mid,
    High,
    Very,
}

impl CompetitivenessLabel {
    pub fn penalty(self) -> i32 {
        match self {
            CompetitivenessLabel::Low => 0,
            CompetitivenessLabel::Mid => 1,
            CompetitivenessLabel::High => 3,
            CompetitivenessLabel::Very => 5,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(CompetitivenessLabel::Low),
            "mid" => Some(CompetitivenessLabel::Mid),
            "high" => Some(CompetitivenessLabel::High),
            "very" => Some(CompetitivenessLabel::Very),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompetitivenessLabel::Low => "low",
            CompetitivenessLabel::Mid => "mid",
            CompetitivenessLabel::High => "high",
            CompetitivenessLabel::Very => "very",
        }
    }
}

/// How selective a program is, resolved once at load time: either a
/// continuous index in [0,1] or a categorical label. Records may carry
/// neither, in which case scoring applies its documented defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selectivity {
    Index(f64),
    Label(CompetitivenessLabel),
}

/// A single program record. Immutable for the lifetime of its KB snapshot.
#[derive(Debug, Clone)]
pub struct ProgramRecord {
    pub key: String,
    pub university: String,
    pub major: String,
    pub level: Option<String>,
    /// Source worksheet tag carried through from the KB build.
    pub sheet: Option<String>,
    pub selectivity: Option<Selectivity>,
}

impl ProgramRecord {
    pub fn ci(&self) -> Option<f64> {
        match self.selectivity {
            Some(Selectivity::Index(v)) => Some(v),
            _ => None,
        }
    }

    pub fn competitiveness(&self) -> Option<&'static str> {
        match self.selectivity {
            Some(Selectivity::Label(l)) => Some(l.as_str()),
            _ => None,
        }
    }

    pub fn detail(&self) -> RecordDetail<'_> {
        RecordDetail {
            university: &self.university,
            major: &self.major,
            level: self.level.as_deref(),
            sheet: self.sheet.as_deref(),
            ci: self.ci(),
            competitiveness: self.competitiveness(),
        }
    }
}

/// Serialized view of a record, mirroring the KB file shape.
#[derive(Debug, Serialize)]
pub struct RecordDetail<'a> {
    pub university: &'a str,
    pub major: &'a str,
    pub level: Option<&'a str>,
    pub sheet: Option<&'a str>,
    pub ci: Option<f64>,
    pub competitiveness: Option<&'a str>,
}

/// On-disk record shape. Tolerates missing fields; records without a
/// university or major are skipped at load with a warning.
#[derive(Debug, Deserialize)]
struct RawRecord {
    university: Option<String>,
    major: Option<String>,
    level: Option<String>,
    sheet: Option<String>,
    competitiveness: Option<String>,
    ci: Option<f64>,
}

impl RawRecord {
    fn selectivity(&self) -> Option<Selectivity> {
        if let Some(ci) = self.ci.filter(|v| v.is_finite()) {
            return Some(Selectivity::Index(ci.clamp(0.0, 1.0)));
        }
        self.competitiveness
            .as_deref()
            .and_then(CompetitivenessLabel::parse)
            .map(Selectivity::Label)
    }
}

/// Immutable KB snapshot. Records are keyed in a `BTreeMap` so iteration
/// order is deterministic across loads.
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    records: BTreeMap<String, ProgramRecord>,
}

impl KnowledgeBase {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let parsed: BTreeMap<String, RawRecord> =
            serde_json::from_str(raw).context("KB file is not a valid record map")?;

        let mut records = BTreeMap::new();
        for (key, raw) in parsed {
            let (Some(university), Some(major)) = (raw.university.clone(), raw.major.clone())
            else {
                warn!("Skipping KB record '{key}': missing university or major");
                continue;
            };
            let selectivity = raw.selectivity();
            records.insert(
                key.clone(),
                ProgramRecord {
                    key,
                    university,
                    major,
                    level: raw.level,
                    sheet: raw.sheet,
                    selectivity,
                },
            );
        }
        Ok(Self { records })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read KB file at {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ProgramRecord> {
        self.records.get(key)
    }

    /// Records in key order.
    pub fn records(&self) -> impl Iterator<Item = &ProgramRecord> {
        self.records.values()
    }

    /// Sorted distinct university names.
    pub fn universities(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self
            .records
            .values()
            .map(|r| r.university.trim())
            .filter(|u| !u.is_empty())
            .collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// Sorted distinct major names.
    pub fn majors(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self
            .records
            .values()
            .map(|r| r.major.trim())
            .filter(|m| !m.is_empty())
            .collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// Sorted distinct majors offered at one university (case-insensitive).
    pub fn majors_at(&self, university: &str) -> Vec<String> {
        let wanted = university.to_lowercase();
        let set: BTreeSet<&str> = self
            .records
            .values()
            .filter(|r| r.university.to_lowercase() == wanted)
            .map(|r| r.major.as_str())
            .collect();
        set.into_iter().map(str::to_string).collect()
    }
}

/// Shared handle over the current KB snapshot. Reads clone the inner `Arc`;
/// reload swaps in a fully-built replacement so readers never observe a
/// partially-updated KB.
#[derive(Clone)]
pub struct KbHandle {
    path: PathBuf,
    current: Arc<RwLock<Arc<KnowledgeBase>>>,
}

impl KbHandle {
    /// Loads the KB at `path`. A missing or unreadable file starts the
    /// service with an empty KB (recommend requests will report it).
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kb = match KnowledgeBase::load(&path) {
            Ok(kb) => kb,
            Err(e) => {
                warn!("KB not loaded from {}: {e:#}", path.display());
                KnowledgeBase::default()
            }
        };
        Self {
            path,
            current: Arc::new(RwLock::new(Arc::new(kb))),
        }
    }

    pub fn snapshot(&self) -> Arc<KnowledgeBase> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Re-reads the KB file and atomically publishes the new snapshot.
    /// Returns the new record count. On failure the old snapshot stays live.
    pub fn reload(&self) -> Result<usize> {
        let kb = KnowledgeBase::load(&self.path)?;
        let count = kb.len();
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(kb);
        info!("KB reloaded: {count} programs");
        Ok(count)
    }

    #[cfg(test)]
    pub fn from_kb(kb: KnowledgeBase) -> Self {
        Self {
            path: PathBuf::new(),
            current: Arc::new(RwLock::new(Arc::new(kb))),
        }
    }
}

const SAINTEK_KEYWORDS: &[&str] = &[
    "fisika",
    "kimia",
    "biologi",
    "kedokteran",
    "informatika",
    "statistika",
    "elektro",
    "mesin",
    "teknik",
    "matematika",
    "farmasi",
    "geologi",
    "perikanan",
    "arsitektur",
    "kehutanan",
    "pertanian",
];

const SOSHUM_KEYWORDS: &[&str] = &[
    "hukum",
    "ekonomi",
    "manajemen",
    "akuntansi",
    "psikologi",
    "sosiologi",
    "sejarah",
    "ilmu",
    "komunikasi",
    "bahasa",
    "pendidikan",
    "administrasi",
    "hubungan",
    "politik",
    "pariwisata",
    "bisnis",
];

/// Guesses the track from keywords in the major name. None = unknown, which
/// keeps the record in every candidate pool.
pub fn guess_track(major: &str) -> Option<Track> {
    let s = major.to_lowercase();
    if SAINTEK_KEYWORDS.iter().any(|k| s.contains(k)) {
        return Some(Track::Saintek);
    }
    if SOSHUM_KEYWORDS.iter().any(|k| s.contains(k)) {
        return Some(Track::Soshum);
    }
    None
}
